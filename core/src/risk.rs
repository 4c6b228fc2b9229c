use ferrochain_common::transaction::Transaction;

/// Advisory annotation a [`RiskAdvisor`] may attach to a transaction. Carries
/// no verdict field on purpose: the pipeline's admission decision at step 7
/// cannot be influenced by anything this type can express (§6 "annotations
/// only, cannot veto a valid transaction").
#[derive(Debug, Clone)]
pub struct RiskAnnotation {
    pub note: String,
}

/// Step 6 of the transaction pipeline. A stand-in for the fraud-scoring
/// collaborator named out of scope (§1); the default implementation never
/// flags anything.
pub trait RiskAdvisor: Send + Sync {
    fn annotate(&self, tx: &Transaction) -> Option<RiskAnnotation>;
}

/// Always returns `None`. Ships as the engine's default advisor so the seam
/// exists without pulling the scoring surface into this crate.
pub struct NoOpRiskAdvisor;

impl RiskAdvisor for NoOpRiskAdvisor {
    fn annotate(&self, _tx: &Transaction) -> Option<RiskAnnotation> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_common::crypto::Address;
    use ferrochain_common::transaction::TxPayload;
    use rust_decimal::Decimal;

    #[test]
    fn no_op_advisor_never_annotates() {
        let advisor = NoOpRiskAdvisor;
        let tx = Transaction {
            from: None,
            to: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse::<Address>().unwrap(),
            amount: Decimal::from(1),
            timestamp: 0,
            data: TxPayload::Transfer,
            signature: None,
            id: None,
        };
        assert!(advisor.annotate(&tx).is_none());
    }
}

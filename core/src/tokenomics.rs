use ferrochain_common::config::{TokenomicsConfig, MAX_HALVINGS};
use rust_decimal::Decimal;

/// Deterministic mining-reward schedule with halving and a hard cap (§4.5).
#[derive(Debug, Clone)]
pub struct Tokenomics {
    config: TokenomicsConfig,
}

impl Tokenomics {
    pub fn new(config: TokenomicsConfig) -> Self {
        Tokenomics { config }
    }

    pub fn max_supply(&self) -> Decimal {
        Decimal::from(self.config.max_supply)
    }

    /// `calculateReward(height) = floor(initialReward / 2^halvings * 1e8) / 1e8`,
    /// zero after [`MAX_HALVINGS`] halvings (§4.5).
    pub fn reward_at_height(&self, height: u64) -> Decimal {
        let halvings = (height / self.config.halving_interval) as u32;
        if halvings >= MAX_HALVINGS {
            return Decimal::ZERO;
        }
        let initial = Decimal::from(self.config.initial_reward);
        let divisor = Decimal::from(1u64 << halvings);
        (initial / divisor).round_dp(8)
    }

    pub fn halving_era(&self, height: u64) -> u32 {
        (height / self.config.halving_interval) as u32
    }

    /// The reward clamped so `totalMined` never exceeds `maxSupply` (§4.5
    /// step 5). Returns `Decimal::ZERO` once the cap is reached.
    pub fn clamped_reward(&self, height: u64, total_mined: Decimal) -> Decimal {
        let remaining = self.max_supply() - total_mined;
        if remaining <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.reward_at_height(height).min(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenomics() -> Tokenomics {
        Tokenomics::new(TokenomicsConfig {
            initial_reward: 100,
            halving_interval: 210_000,
            max_supply: 21_000_000,
        })
    }

    #[test]
    fn reward_before_first_halving() {
        assert_eq!(tokenomics().reward_at_height(0), Decimal::from(100));
        assert_eq!(tokenomics().reward_at_height(209_999), Decimal::from(100));
    }

    #[test]
    fn reward_at_halving_boundary() {
        assert_eq!(tokenomics().reward_at_height(210_000), Decimal::from(50));
    }

    #[test]
    fn reward_is_zero_after_32_halvings() {
        let t = Tokenomics::new(TokenomicsConfig {
            initial_reward: 100,
            halving_interval: 2,
            max_supply: 21_000_000,
        });
        assert_eq!(t.reward_at_height(2 * 32), Decimal::ZERO);
    }

    #[test]
    fn small_halving_interval_matches_scenario() {
        let t = Tokenomics::new(TokenomicsConfig {
            initial_reward: 100,
            halving_interval: 2,
            max_supply: 21_000_000,
        });
        assert_eq!(t.reward_at_height(2), Decimal::from(50));
        assert_eq!(t.reward_at_height(4), Decimal::from(25));
    }

    #[test]
    fn clamped_reward_caps_at_remaining_supply() {
        let t = tokenomics();
        let total_mined = t.max_supply() - Decimal::new(5, 1); // 0.5 remaining
        assert_eq!(t.clamped_reward(0, total_mined), Decimal::new(5, 1));
    }

    #[test]
    fn clamped_reward_is_zero_once_capped() {
        let t = tokenomics();
        assert_eq!(t.clamped_reward(0, t.max_supply()), Decimal::ZERO);
    }
}

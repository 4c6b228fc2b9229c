//! Thin HTTP client for the node's `/api/*` surface (§6). No retry logic —
//! a reference wallet surfaces the node's own error body to the operator
//! rather than guessing at recovery.

use anyhow::{bail, Result};
use reqwest::Client;
use serde_json::Value;

pub struct NodeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NodeClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        NodeClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn submit_transaction(&self, body: Value) -> Result<Value> {
        self.post("/api/transaction", body).await
    }

    pub async fn mine(&self, miner_address: &str) -> Result<Value> {
        self.post("/api/mine", serde_json::json!({ "minerAddress": miner_address })).await
    }

    pub async fn balance(&self, address: &str) -> Result<Value> {
        self.get(&format!("/api/balance/{address}")).await
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self.client.get(format!("{}/api/health", self.base_url)).send().await?;
        Ok(response.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            bail!("node returned {status}: {body}");
        }
        Ok(body)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            bail!("node returned {status}: {body}");
        }
        Ok(body)
    }
}

pub mod error;
pub mod types;

pub use error::{BrightDataError, Result};
pub use types::{decode_snapshot, partition_items, SnapshotBody, TriggerResponse};

use serde_json::Value;

const BASE_URL: &str = "https://api.brightdata.com/datasets/v3";

/// Dataset ID for Amazon product discovery.
pub const AMAZON_PRODUCTS_DATASET: &str = "gd_l7q7dkf244hwjntr0";

/// Dataset ID for Amazon product reviews.
pub const AMAZON_REVIEWS_DATASET: &str = "gd_le8e811kzy4ggddlq";

pub struct BrightDataClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl BrightDataClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Trigger a keyword-discovery collection (e.g. Amazon product search).
    /// Returns the snapshot id used to poll for results.
    pub async fn trigger_discovery(
        &self,
        dataset_id: &str,
        keywords: &[String],
        limit_per_input: u32,
    ) -> Result<String> {
        let inputs: Vec<Value> = keywords
            .iter()
            .map(|k| serde_json::json!({ "keyword": k }))
            .collect();
        let limit = limit_per_input.to_string();
        let params = [
            ("dataset_id", dataset_id),
            ("format", "json"),
            ("include_errors", "true"),
            ("type", "discover_new"),
            ("discover_by", "keyword"),
            ("limit_per_input", limit.as_str()),
        ];
        self.post_trigger(&params, &inputs).await
    }

    /// Trigger a plain collection over explicit input parameter maps
    /// (e.g. review scrapes keyed by product URL).
    pub async fn trigger_collection(&self, dataset_id: &str, inputs: &[Value]) -> Result<String> {
        let params = [
            ("dataset_id", dataset_id),
            ("format", "json"),
            ("include_errors", "true"),
        ];
        self.post_trigger(&params, inputs).await
    }

    async fn post_trigger(&self, params: &[(&str, &str)], inputs: &[Value]) -> Result<String> {
        let url = format!("{}/trigger", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .query(params)
            .json(&serde_json::json!({ "input": inputs }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let trigger: TriggerResponse = serde_json::from_str(&body)?;
        trigger
            .snapshot_id
            .ok_or(BrightDataError::MissingSnapshot(body))
    }

    /// Fetch one snapshot poll. The body is decoded tolerantly: a JSON array
    /// or NDJSON body is terminal, a status object keeps the poll alive.
    pub async fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotBody> {
        let url = format!("{}/snapshot/{}", self.base_url, snapshot_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("format", "json")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(decode_snapshot(&body))
    }
}

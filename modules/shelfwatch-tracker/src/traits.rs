// Trait abstraction over the Bright Data dataset API.
//
// SnapshotApi is the collector's only dependency on the outside world; the
// real client and the scripted MockSnapshotApi both implement it, so the job
// state machine is tested without network access.

use async_trait::async_trait;
use serde_json::Value;

use brightdata_client::{BrightDataClient, Result, SnapshotBody};

#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Start a keyword-discovery collection. Returns the snapshot id.
    async fn trigger_discovery(
        &self,
        dataset_id: &str,
        keywords: &[String],
        limit_per_input: u32,
    ) -> Result<String>;

    /// Start a plain collection over explicit input maps.
    async fn trigger_collection(&self, dataset_id: &str, inputs: &[Value]) -> Result<String>;

    /// Fetch one decoded snapshot poll.
    async fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotBody>;
}

#[async_trait]
impl SnapshotApi for BrightDataClient {
    async fn trigger_discovery(
        &self,
        dataset_id: &str,
        keywords: &[String],
        limit_per_input: u32,
    ) -> Result<String> {
        BrightDataClient::trigger_discovery(self, dataset_id, keywords, limit_per_input).await
    }

    async fn trigger_collection(&self, dataset_id: &str, inputs: &[Value]) -> Result<String> {
        BrightDataClient::trigger_collection(self, dataset_id, inputs).await
    }

    async fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotBody> {
        BrightDataClient::snapshot(self, snapshot_id).await
    }
}

//! Artifact queue producer: hands analysis-run requests to the worker pool.
//!
//! Delivery is at-least-once; workers dedup on `request_id`. The producer is
//! deliberately stateless across requests — it holds only a `redis::Client`
//! and opens a connection per enqueue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which aspects a run should produce. Runs currently always request both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "BOTH")]
    Both,
}

/// Message handed to the analysis worker pool.
///
/// `request_id` is a fresh token minted per enqueue attempt, for worker-side
/// dedup and idempotency logging; it is never read back by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub job_id: Uuid,
    pub analysis_run_id: Uuid,
    pub task_type: TaskType,
    pub request_id: Uuid,
    pub force: bool,
}

#[async_trait]
pub trait AnalysisQueue: Send + Sync {
    /// A returned error means the message may not have been accepted; the
    /// caller surfaces that as a dispatch failure rather than retrying here.
    async fn enqueue(&self, task: &AnalysisTask) -> anyhow::Result<()>;
}

/// Redis Streams producer: one XADD per run request.
pub struct RedisQueue {
    client: redis::Client,
    stream: String,
}

impl RedisQueue {
    pub fn new(client: redis::Client, stream: impl Into<String>) -> Self {
        Self {
            client,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl AnalysisQueue for RedisQueue {
    async fn enqueue(&self, task: &AnalysisTask) -> anyhow::Result<()> {
        let payload = serde_json::to_string(task)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}

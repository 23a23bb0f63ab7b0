use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use serde_json::Value;

/// Fire-and-forget job submission. Delivery is at-least-once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(
        &self,
        job_type: &str,
        tenant_id: &str,
        payload: Value,
        max_attempts: i32,
    ) -> DomainResult<String>;
}

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entities::JobStatus;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::time_service::TimeService;
use crate::infrastructure::persistence::{format_ts, Database};

/// SQL implementation of the TaskQueue. Jobs land in the shared `jobs`
/// table that the worker fleet drains.
#[derive(Clone)]
pub struct SqlTaskQueue {
    db: Database,
    time: Arc<dyn TimeService>,
}

impl SqlTaskQueue {
    pub fn new(db: Database, time: Arc<dyn TimeService>) -> Self {
        Self { db, time }
    }
}

#[async_trait]
impl TaskQueue for SqlTaskQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        tenant_id: &str,
        payload: Value,
        max_attempts: i32,
    ) -> DomainResult<String> {
        let id = Uuid::new_v4().to_string();
        let now = format_ts(&self.time.now());
        let payload_str = serde_json::to_string(&payload)
            .map_err(|e| DomainError::Internal(format!("Failed to encode job payload: {}", e)))?;

        sqlx::query(
            "INSERT INTO jobs (id, tenant_id, job_type, payload, status, run_at, created_at, updated_at, max_attempts)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(job_type)
        .bind(&payload_str)
        .bind(JobStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(max_attempts)
        .execute(self.db.pool())
        .await?;

        tracing::debug!("Enqueued job {} ({}) for tenant {}", id, job_type, tenant_id);
        Ok(id)
    }
}

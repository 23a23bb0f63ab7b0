use crate::domain::entities::{JobCounts, PollingJobRecord};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait PollingJobRepository: Send + Sync {
    /// Jobs created at or after `since`, newest first, at most `limit`
    async fn recent_jobs(
        &self,
        tenant_id: &str,
        job_type: &str,
        since: DateTime<Utc>,
        limit: u32,
    ) -> DomainResult<Vec<PollingJobRecord>>;

    async fn job_counts(
        &self,
        tenant_id: &str,
        job_type: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<JobCounts>;
}

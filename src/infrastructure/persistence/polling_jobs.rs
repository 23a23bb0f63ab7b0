use crate::domain::entities::{JobCounts, JobStatus, PollingJobRecord};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::polling_job_repository::PollingJobRepository;
use crate::infrastructure::persistence::{format_ts, nullable_text, parse_ts, Database};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

fn add_count(counter: &mut u32, total: i64) -> DomainResult<()> {
    let total = u32::try_from(total)
        .map_err(|_| DomainError::Internal(format!("Job count out of range: {}", total)))?;
    *counter = counter
        .checked_add(total)
        .ok_or_else(|| DomainError::Internal("Job count overflow".to_string()))?;
    Ok(())
}

#[async_trait]
impl PollingJobRepository for Database {
    async fn recent_jobs(
        &self,
        tenant_id: &str,
        job_type: &str,
        since: DateTime<Utc>,
        limit: u32,
    ) -> DomainResult<Vec<PollingJobRecord>> {
        let rows = sqlx::query(
            "SELECT id, status, created_at, updated_at, last_error
             FROM jobs
             WHERE tenant_id = ? AND job_type = ? AND created_at >= ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(tenant_id)
        .bind(job_type)
        .bind(format_ts(&since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let created_at: String = row.try_get("created_at")?;
            let updated_at: String = row.try_get("updated_at")?;
            jobs.push(PollingJobRecord {
                id: row.try_get("id")?,
                status: JobStatus::from(status.as_str()),
                created_at: parse_ts(&created_at)?,
                updated_at: parse_ts(&updated_at)?,
                last_error: nullable_text(&row, "last_error"),
            });
        }
        Ok(jobs)
    }

    async fn job_counts(
        &self,
        tenant_id: &str,
        job_type: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<JobCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total
             FROM jobs
             WHERE tenant_id = ? AND job_type = ? AND created_at >= ?
             GROUP BY status",
        )
        .bind(tenant_id)
        .bind(job_type)
        .bind(format_ts(&since))
        .fetch_all(&self.pool)
        .await?;

        let mut counts = JobCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let total: i64 = row.try_get("total")?;
            match JobStatus::from(status.as_str()) {
                JobStatus::Done => add_count(&mut counts.done, total)?,
                JobStatus::Failed => add_count(&mut counts.failed, total)?,
                JobStatus::Pending | JobStatus::Running => {}
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_count_accumulates() {
        let mut counter = 3;
        add_count(&mut counter, 4).unwrap();
        assert_eq!(counter, 7);
    }

    #[test]
    fn test_add_count_rejects_values_outside_u32() {
        let mut counter = 0;
        assert!(add_count(&mut counter, i64::from(u32::MAX) + 1).is_err());
        assert!(add_count(&mut counter, -1).is_err());
        assert_eq!(counter, 0);

        let mut counter = u32::MAX;
        assert!(add_count(&mut counter, 1).is_err());
        assert_eq!(counter, u32::MAX);
    }
}

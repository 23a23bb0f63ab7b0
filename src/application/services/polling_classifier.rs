use crate::domain::entities::{
    AmazonPollingHealth, HealthReason, HealthStatus, JobCounts, JobStatus, Marketplace,
    MarketplaceOAuth, PollingJobRecord,
};
use crate::domain::errors::DomainResult;
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::oauth_repository::OAuthRepository;
use crate::domain::ports::polling_job_repository::PollingJobRepository;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const POLLING_WINDOW_HOURS: i64 = 24;
pub const FRESH_SUCCESS_MINUTES: i64 = 15;
pub const RECENT_JOBS_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
pub struct PollingClassifierConfig {
    /// Job type the polling worker records its runs under
    pub job_type: String,
    /// Polling results are synthetic; never report them as OK
    pub mock_mode: bool,
}

/// Everything the decision needs, gathered up front
#[derive(Debug, Clone)]
pub struct PollingEvidence {
    pub connection_found: bool,
    pub oauth: Option<MarketplaceOAuth>,
    /// Newest first, trailing window only
    pub recent_jobs: Vec<PollingJobRecord>,
    pub counts: JobCounts,
}

/// Decision order is significant: the first matching branch wins.
pub fn classify_polling(
    evidence: &PollingEvidence,
    mock_mode: bool,
    now: DateTime<Utc>,
) -> AmazonPollingHealth {
    let latest = evidence.recent_jobs.first();
    let last_run_at = latest.map(|j| j.created_at);
    let last_success_at = evidence
        .recent_jobs
        .iter()
        .find(|j| j.status == JobStatus::Done)
        .map(|j| j.updated_at);
    let last_error = evidence
        .recent_jobs
        .iter()
        .find(|j| j.status == JobStatus::Failed)
        .and_then(|j| j.last_error.clone())
        .or_else(|| evidence.oauth.as_ref().and_then(|o| o.last_error.clone()));

    let verdict = |status: HealthStatus, reason: HealthReason, message: String| {
        AmazonPollingHealth {
            status,
            message,
            reason,
            oauth_connected: evidence.oauth.as_ref().map_or(false, |o| o.is_connected()),
            last_run_at,
            last_success_at,
            last_error: last_error.clone(),
            jobs_last_24h: evidence.counts,
            is_mock_mode: mock_mode,
        }
    };

    if !evidence.connection_found {
        return verdict(
            HealthStatus::Na,
            HealthReason::ConnectionNotFound,
            "Inbound connection not found".to_string(),
        );
    }

    let oauth = match &evidence.oauth {
        None => {
            return verdict(
                HealthStatus::Na,
                HealthReason::OauthNotConnected,
                "Amazon account is not connected".to_string(),
            )
        }
        Some(oauth) => oauth,
    };

    if !oauth.is_connected() {
        return verdict(
            HealthStatus::Na,
            HealthReason::OauthNotConnected,
            format!("Amazon account connection is {}", oauth.status),
        );
    }

    let Some(latest) = latest else {
        return verdict(
            HealthStatus::Warning,
            HealthReason::NoRuns,
            format!(
                "No Amazon polling job ran in the last {}h",
                POLLING_WINDOW_HOURS
            ),
        );
    };

    if mock_mode {
        return verdict(
            HealthStatus::Warning,
            HealthReason::MockMode,
            "Amazon polling runs in mock mode; results are synthetic".to_string(),
        );
    }

    match latest.status {
        JobStatus::Failed => {
            let error = latest
                .last_error
                .clone()
                .or_else(|| oauth.last_error.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            verdict(
                HealthStatus::Error,
                HealthReason::Failed,
                format!("Last Amazon polling job failed: {}", error),
            )
        }
        JobStatus::Done => {
            let age = now.signed_duration_since(latest.updated_at);
            if age < Duration::minutes(FRESH_SUCCESS_MINUTES) {
                verdict(
                    HealthStatus::Ok,
                    HealthReason::Success,
                    format!(
                        "Last Amazon polling job succeeded {} min ago",
                        age.num_minutes().max(0)
                    ),
                )
            } else {
                verdict(
                    HealthStatus::Warning,
                    HealthReason::Stale,
                    format!(
                        "Last successful Amazon polling job is {} min old",
                        age.num_minutes()
                    ),
                )
            }
        }
        JobStatus::Pending | JobStatus::Running => verdict(
            HealthStatus::Warning,
            HealthReason::Pending,
            format!("Amazon polling job is {}", latest.status),
        ),
    }
}

/// Placeholder used when the classification did not finish in time
pub fn polling_timeout_placeholder(mock_mode: bool) -> AmazonPollingHealth {
    AmazonPollingHealth {
        status: HealthStatus::Warning,
        message: "Amazon polling status did not resolve in time".to_string(),
        reason: HealthReason::Timeout,
        oauth_connected: false,
        last_run_at: None,
        last_success_at: None,
        last_error: None,
        jobs_last_24h: JobCounts::default(),
        is_mock_mode: mock_mode,
    }
}

#[derive(Clone)]
pub struct AmazonPollingClassifier {
    inbound_repo: Arc<dyn InboundRepository>,
    oauth_repo: Arc<dyn OAuthRepository>,
    jobs_repo: Arc<dyn PollingJobRepository>,
    time: Arc<dyn TimeService>,
    config: PollingClassifierConfig,
}

impl AmazonPollingClassifier {
    pub fn new(
        inbound_repo: Arc<dyn InboundRepository>,
        oauth_repo: Arc<dyn OAuthRepository>,
        jobs_repo: Arc<dyn PollingJobRepository>,
        time: Arc<dyn TimeService>,
        config: PollingClassifierConfig,
    ) -> Self {
        Self {
            inbound_repo,
            oauth_repo,
            jobs_repo,
            time,
            config,
        }
    }

    pub fn mock_mode(&self) -> bool {
        self.config.mock_mode
    }

    /// Only storage failures are returned as errors; every business outcome
    /// is a verdict.
    pub async fn classify(&self, connection_id: &str) -> DomainResult<AmazonPollingHealth> {
        let now = self.time.now();
        let evidence = self.gather(connection_id, now).await?;
        let health = classify_polling(&evidence, self.config.mock_mode, now);

        tracing::debug!(
            "Amazon polling for connection {} -> {} ({}), done={} failed={}",
            connection_id,
            health.status.as_str(),
            health.reason.as_str(),
            health.jobs_last_24h.done,
            health.jobs_last_24h.failed
        );
        Ok(health)
    }

    async fn gather(&self, connection_id: &str, now: DateTime<Utc>) -> DomainResult<PollingEvidence> {
        let Some(connection) = self.inbound_repo.get_connection(connection_id).await? else {
            return Ok(PollingEvidence {
                connection_found: false,
                oauth: None,
                recent_jobs: Vec::new(),
                counts: JobCounts::default(),
            });
        };

        let since = now - Duration::hours(POLLING_WINDOW_HOURS);
        let tenant_id = connection.tenant_id.as_str();

        let (oauth, recent_jobs, counts) = tokio::try_join!(
            self.oauth_repo
                .get_marketplace_oauth(tenant_id, Marketplace::Amazon),
            self.jobs_repo
                .recent_jobs(tenant_id, &self.config.job_type, since, RECENT_JOBS_LIMIT),
            self.jobs_repo
                .job_counts(tenant_id, &self.config.job_type, since),
        )?;

        Ok(PollingEvidence {
            connection_found: true,
            oauth,
            recent_jobs,
            counts,
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::JobCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
    Na,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "OK",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Error => "ERROR",
            HealthStatus::Na => "NA",
        }
    }
}

/// Machine-readable explanation attached to every status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthReason {
    // DNS / HTTPS probes
    RecordFound,
    RecordMalformed,
    RecordMissing,
    DocumentFound,
    DocumentInvalid,
    HttpStatus,
    RateLimited,
    Timeout,
    Unreachable,

    // Last inbound message
    NeverReceived,
    Recent,
    Quiet,
    Silent,

    // Storage
    Reachable,

    // Amazon polling
    ConnectionNotFound,
    OauthNotConnected,
    NoRuns,
    MockMode,
    Failed,
    Success,
    Stale,
    Pending,

    // Overall verdict
    PollingError,
    PollingWarning,
    AddressesUnknown,
    AddressesPending,
    Healthy,
}

impl HealthReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthReason::RecordFound => "record_found",
            HealthReason::RecordMalformed => "record_malformed",
            HealthReason::RecordMissing => "record_missing",
            HealthReason::DocumentFound => "document_found",
            HealthReason::DocumentInvalid => "document_invalid",
            HealthReason::HttpStatus => "http_status",
            HealthReason::RateLimited => "rate_limited",
            HealthReason::Timeout => "timeout",
            HealthReason::Unreachable => "unreachable",
            HealthReason::NeverReceived => "never_received",
            HealthReason::Recent => "recent",
            HealthReason::Quiet => "quiet",
            HealthReason::Silent => "silent",
            HealthReason::Reachable => "reachable",
            HealthReason::ConnectionNotFound => "connection_not_found",
            HealthReason::OauthNotConnected => "oauth_not_connected",
            HealthReason::NoRuns => "no_runs",
            HealthReason::MockMode => "mock_mode",
            HealthReason::Failed => "failed",
            HealthReason::Success => "success",
            HealthReason::Stale => "stale",
            HealthReason::Pending => "pending",
            HealthReason::PollingError => "polling_error",
            HealthReason::PollingWarning => "polling_warning",
            HealthReason::AddressesUnknown => "addresses_unknown",
            HealthReason::AddressesPending => "addresses_pending",
            HealthReason::Healthy => "healthy",
        }
    }
}

/// Output of a single probe. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub reason: HealthReason,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HealthCheckResult {
    pub fn new(
        name: impl Into<String>,
        status: HealthStatus,
        reason: HealthReason,
        message: impl Into<String>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            reason,
            checked_at,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmazonPollingHealth {
    pub status: HealthStatus,
    pub message: String,
    pub reason: HealthReason,
    pub oauth_connected: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub jobs_last_24h: JobCounts,
    pub is_mock_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValidationSummary {
    pub validated: usize,
    pub total: usize,
}

impl AddressValidationSummary {
    pub fn all_validated(&self) -> bool {
        self.validated >= self.total
    }
}

/// Connection-level verdict with every contributing signal attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallHealth {
    pub connection_id: String,
    pub status: HealthStatus,
    pub reason: HealthReason,
    pub message: String,
    pub checks: Vec<HealthCheckResult>,
    pub amazon_polling: AmazonPollingHealth,
    /// `None` when the address lookup did not finish before the deadline
    pub addresses: Option<AddressValidationSummary>,
    pub checked_at: DateTime<Utc>,
}

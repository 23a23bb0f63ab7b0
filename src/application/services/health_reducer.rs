use crate::application::services::polling_classifier::{
    polling_timeout_placeholder, AmazonPollingClassifier,
};
use crate::application::services::signal_probes::{
    timeout_status, SignalProbes, DATABASE_CHECK, DKIM_CHECK, LAST_INBOUND_CHECK,
    MTA_STS_POLICY_CHECK, MTA_STS_RECORD_CHECK,
};
use crate::domain::entities::{
    AddressValidationSummary, AmazonPollingHealth, HealthCheckResult, HealthReason, HealthStatus,
    OverallHealth,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::time_service::TimeService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-check outcomes, labelled `check` and `status`
pub const CHECKS_COUNTER: &str = "inbound_health_checks_total";
/// Overall verdicts, labelled `status`
pub const OVERALL_COUNTER: &str = "inbound_health_overall_total";

/// Signals a rule looks at
pub struct ReductionInput<'a> {
    pub polling: &'a AmazonPollingHealth,
    /// `None` when the address lookup was cut off
    pub addresses: Option<AddressValidationSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: HealthStatus,
    pub reason: HealthReason,
    pub message: String,
}

pub type Rule = fn(&ReductionInput<'_>) -> Option<Verdict>;

fn polling_error(input: &ReductionInput<'_>) -> Option<Verdict> {
    (input.polling.status == HealthStatus::Error).then(|| Verdict {
        status: HealthStatus::Error,
        reason: HealthReason::PollingError,
        message: format!("Amazon polling is failing: {}", input.polling.message),
    })
}

fn polling_warning(input: &ReductionInput<'_>) -> Option<Verdict> {
    (input.polling.status == HealthStatus::Warning).then(|| Verdict {
        status: HealthStatus::Warning,
        reason: HealthReason::PollingWarning,
        message: format!("Amazon polling needs attention: {}", input.polling.message),
    })
}

fn addresses_unknown(input: &ReductionInput<'_>) -> Option<Verdict> {
    input.addresses.is_none().then(|| Verdict {
        status: HealthStatus::Warning,
        reason: HealthReason::AddressesUnknown,
        message: "Inbound address state could not be read before the deadline".to_string(),
    })
}

fn addresses_pending(input: &ReductionInput<'_>) -> Option<Verdict> {
    let addresses = input.addresses?;
    (!addresses.all_validated()).then(|| Verdict {
        status: HealthStatus::Warning,
        reason: HealthReason::AddressesPending,
        message: format!(
            "{} of {} inbound addresses validated",
            addresses.validated, addresses.total
        ),
    })
}

/// Evaluated top to bottom; the first rule that matches decides.
pub const RULES: &[Rule] = &[
    polling_error,
    polling_warning,
    addresses_unknown,
    addresses_pending,
];

pub fn reduce_signals(input: &ReductionInput<'_>) -> Verdict {
    RULES
        .iter()
        .find_map(|rule| rule(input))
        .unwrap_or_else(|| Verdict {
            status: HealthStatus::Ok,
            reason: HealthReason::Healthy,
            message: "Inbound pipeline is healthy".to_string(),
        })
}

/// Resolve `fut` unless the deadline passes or the caller cancels first
async fn within<F: Future>(
    fut: F,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Option<F::Output> {
    tokio::select! {
        out = fut => Some(out),
        _ = tokio::time::sleep_until(deadline) => None,
        _ = cancel.cancelled() => None,
    }
}

#[derive(Clone)]
pub struct HealthReducer {
    probes: SignalProbes,
    classifier: AmazonPollingClassifier,
    repo: Arc<dyn InboundRepository>,
    time: Arc<dyn TimeService>,
    default_timeout: Duration,
}

impl HealthReducer {
    pub fn new(
        probes: SignalProbes,
        classifier: AmazonPollingClassifier,
        repo: Arc<dyn InboundRepository>,
        time: Arc<dyn TimeService>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            probes,
            classifier,
            repo,
            time,
            default_timeout,
        }
    }

    pub async fn reduce(&self, connection_id: &str) -> DomainResult<OverallHealth> {
        self.reduce_with(connection_id, self.default_timeout, CancellationToken::new())
            .await
    }

    /// Fan out the address lookup, every probe and the polling
    /// classification under one deadline, then fold them. Anything still
    /// outstanding at the deadline or on cancellation is replaced by a
    /// placeholder instead of failing the request. An unknown connection is
    /// `NotFound` only when the lookup got far enough to tell.
    pub async fn reduce_with(
        &self,
        connection_id: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> DomainResult<OverallHealth> {
        let deadline = Instant::now() + timeout;

        let (addresses, dkim, mta_sts_record, mta_sts_policy, last_inbound, database, polling) =
            tokio::join!(
                within(self.address_summary(connection_id), deadline, &cancel),
                within(self.probes.check_dkim(), deadline, &cancel),
                within(self.probes.check_mta_sts_record(), deadline, &cancel),
                within(self.probes.check_mta_sts_policy(), deadline, &cancel),
                within(self.probes.check_last_inbound(connection_id), deadline, &cancel),
                within(self.probes.check_database(), deadline, &cancel),
                within(self.classifier.classify(connection_id), deadline, &cancel),
            );

        let summary = match addresses {
            Some(result) => Some(result?),
            None => {
                tracing::warn!(
                    "Address lookup for connection {} did not finish in time",
                    connection_id
                );
                None
            }
        };

        let now = self.time.now();
        let placeholder = |name: &str| {
            HealthCheckResult::new(
                name,
                timeout_status(name),
                HealthReason::Timeout,
                format!("{} check did not complete before the deadline", name),
                now,
            )
        };

        let checks = vec![
            dkim.unwrap_or_else(|| placeholder(DKIM_CHECK)),
            mta_sts_record.unwrap_or_else(|| placeholder(MTA_STS_RECORD_CHECK)),
            mta_sts_policy.unwrap_or_else(|| placeholder(MTA_STS_POLICY_CHECK)),
            last_inbound.unwrap_or_else(|| placeholder(LAST_INBOUND_CHECK)),
            database.unwrap_or_else(|| placeholder(DATABASE_CHECK)),
        ];

        let amazon_polling = match polling {
            Some(result) => result?,
            None => {
                tracing::warn!(
                    "Amazon polling classification for {} did not finish in time",
                    connection_id
                );
                polling_timeout_placeholder(self.classifier.mock_mode())
            }
        };

        let verdict = reduce_signals(&ReductionInput {
            polling: &amazon_polling,
            addresses: summary,
        });

        for check in &checks {
            metrics::counter!(
                CHECKS_COUNTER,
                "check" => check.name.clone(),
                "status" => check.status.as_str()
            )
            .increment(1);
        }
        metrics::counter!(OVERALL_COUNTER, "status" => verdict.status.as_str()).increment(1);

        tracing::info!(
            "Health for connection {}: {} ({})",
            connection_id,
            verdict.status.as_str(),
            verdict.reason.as_str()
        );

        Ok(OverallHealth {
            connection_id: connection_id.to_string(),
            status: verdict.status,
            reason: verdict.reason,
            message: verdict.message,
            checks,
            amazon_polling,
            addresses: summary,
            checked_at: now,
        })
    }

    async fn address_summary(&self, connection_id: &str) -> DomainResult<AddressValidationSummary> {
        let connection = self
            .repo
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Connection {}", connection_id)))?;
        let addresses = self.repo.list_addresses(&connection.id).await?;
        Ok(AddressValidationSummary {
            validated: addresses.iter().filter(|a| a.is_validated()).count(),
            total: addresses.len(),
        })
    }
}

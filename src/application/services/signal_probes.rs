use crate::domain::entities::{HealthCheckResult, HealthReason, HealthStatus};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::dns_resolver::TxtResolver;
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::policy_fetcher::{FetchedDocument, PolicyFetcher};
use crate::domain::ports::store_health::StoreHealth;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DKIM_CHECK: &str = "dkim_record";
pub const MTA_STS_RECORD_CHECK: &str = "mta_sts_record";
pub const MTA_STS_POLICY_CHECK: &str = "mta_sts_policy";
pub const LAST_INBOUND_CHECK: &str = "last_inbound_message";
pub const DATABASE_CHECK: &str = "database";

const DKIM_VERSION: &str = "v=DKIM1";
const MTA_STS_VERSION: &str = "v=STSv1";
const MTA_STS_POLICY_MARKER: &str = "version: STSv1";

const QUIET_AFTER_HOURS: i64 = 24;
const SILENT_AFTER_HOURS: i64 = 72;

/// Severity of a check that did not answer in time, whether its own probe
/// timer or the overall deadline cut it off. DKIM and the store are
/// mandatory; everything else only warns.
pub fn timeout_status(check: &str) -> HealthStatus {
    match check {
        DKIM_CHECK | DATABASE_CHECK => HealthStatus::Error,
        _ => HealthStatus::Warning,
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub inbound_domain: String,
    pub dkim_selector: String,
    pub timeout: Duration,
}

impl ProbeConfig {
    pub fn dkim_name(&self) -> String {
        format!("{}._domainkey.{}", self.dkim_selector, self.inbound_domain)
    }

    pub fn mta_sts_name(&self) -> String {
        format!("_mta-sts.{}", self.inbound_domain)
    }

    pub fn mta_sts_policy_url(&self) -> String {
        format!(
            "https://mta-sts.{}/.well-known/mta-sts.txt",
            self.inbound_domain
        )
    }
}

/// `tag=value` pairs of a DNS key record
fn record_tags(record: &str) -> Vec<(String, String)> {
    record
        .split(';')
        .filter_map(|part| {
            let (tag, value) = part.split_once('=')?;
            Some((tag.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn tag_value<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(tag, _)| tag == name)
        .map(|(_, value)| value.as_str())
}

fn compact(record: &str) -> String {
    record.chars().filter(|c| !c.is_whitespace()).collect()
}

/// DKIM is mandatory for inbound trust: every failure to find a record is ERROR.
pub fn classify_dkim(
    name: &str,
    lookup: DomainResult<Vec<String>>,
    now: DateTime<Utc>,
) -> HealthCheckResult {
    let records = match lookup {
        Ok(records) => records,
        Err(DomainError::Timeout(_)) => {
            return HealthCheckResult::new(
                DKIM_CHECK,
                timeout_status(DKIM_CHECK),
                HealthReason::Timeout,
                format!("DKIM lookup for {} timed out", name),
                now,
            )
        }
        Err(DomainError::NotFound(_)) => {
            return HealthCheckResult::new(
                DKIM_CHECK,
                HealthStatus::Error,
                HealthReason::RecordMissing,
                format!("No DKIM record published at {}", name),
                now,
            )
        }
        Err(e) => {
            return HealthCheckResult::new(
                DKIM_CHECK,
                HealthStatus::Error,
                HealthReason::Unreachable,
                format!("DKIM lookup for {} failed: {}", name, e),
                now,
            )
        }
    };

    if records.is_empty() {
        return HealthCheckResult::new(
            DKIM_CHECK,
            HealthStatus::Error,
            HealthReason::RecordMissing,
            format!("No DKIM record published at {}", name),
            now,
        );
    }

    let versioned = records
        .iter()
        .find(|r| compact(r).contains(DKIM_VERSION));

    match versioned {
        Some(record) => {
            let tags = record_tags(&compact(record));
            let has_key = tag_value(&tags, "p").map_or(false, |p| !p.is_empty());
            if has_key {
                HealthCheckResult::new(
                    DKIM_CHECK,
                    HealthStatus::Ok,
                    HealthReason::RecordFound,
                    format!("DKIM record found at {}", name),
                    now,
                )
            } else {
                HealthCheckResult::new(
                    DKIM_CHECK,
                    HealthStatus::Warning,
                    HealthReason::RecordMalformed,
                    format!("DKIM record at {} has no public key", name),
                    now,
                )
                .with_details(json!({ "record": record }))
            }
        }
        None => HealthCheckResult::new(
            DKIM_CHECK,
            HealthStatus::Warning,
            HealthReason::RecordMalformed,
            format!("TXT record at {} is missing {}", name, DKIM_VERSION),
            now,
        )
        .with_details(json!({ "records": records })),
    }
}

/// MTA-STS is optional: never worse than WARNING.
pub fn classify_mta_sts_record(
    name: &str,
    lookup: DomainResult<Vec<String>>,
    now: DateTime<Utc>,
) -> HealthCheckResult {
    let warn = |reason: HealthReason, message: String| {
        HealthCheckResult::new(
            MTA_STS_RECORD_CHECK,
            HealthStatus::Warning,
            reason,
            message,
            now,
        )
    };

    let records = match lookup {
        Ok(records) if !records.is_empty() => records,
        Ok(_) | Err(DomainError::NotFound(_)) => {
            return warn(
                HealthReason::RecordMissing,
                format!("No MTA-STS record published at {}", name),
            )
        }
        Err(DomainError::Timeout(_)) => {
            return warn(
                HealthReason::Timeout,
                format!("MTA-STS lookup for {} timed out", name),
            )
        }
        Err(e) => {
            return warn(
                HealthReason::Unreachable,
                format!("MTA-STS lookup for {} failed: {}", name, e),
            )
        }
    };

    let valid = records.iter().find(|r| {
        let compacted = compact(r);
        compacted.starts_with(MTA_STS_VERSION)
            && tag_value(&record_tags(&compacted), "id").map_or(false, |id| !id.is_empty())
    });

    match valid {
        Some(_) => HealthCheckResult::new(
            MTA_STS_RECORD_CHECK,
            HealthStatus::Ok,
            HealthReason::RecordFound,
            format!("MTA-STS record found at {}", name),
            now,
        ),
        None => warn(
            HealthReason::RecordMalformed,
            format!("MTA-STS record at {} is malformed", name),
        )
        .with_details(json!({ "records": records })),
    }
}

/// The policy document is optional: never worse than WARNING.
pub fn classify_mta_sts_policy(
    url: &str,
    fetched: DomainResult<FetchedDocument>,
    now: DateTime<Utc>,
) -> HealthCheckResult {
    let warn = |reason: HealthReason, message: String| {
        HealthCheckResult::new(
            MTA_STS_POLICY_CHECK,
            HealthStatus::Warning,
            reason,
            message,
            now,
        )
    };

    match fetched {
        Ok(doc) if doc.status == 200 && doc.body.contains(MTA_STS_POLICY_MARKER) => {
            HealthCheckResult::new(
                MTA_STS_POLICY_CHECK,
                HealthStatus::Ok,
                HealthReason::DocumentFound,
                format!("MTA-STS policy served at {}", url),
                now,
            )
        }
        Ok(doc) if doc.status == 200 => warn(
            HealthReason::DocumentInvalid,
            format!("MTA-STS policy at {} does not declare {}", url, MTA_STS_POLICY_MARKER),
        ),
        Ok(doc) if doc.status == 429 => warn(
            HealthReason::RateLimited,
            format!("MTA-STS policy host {} is rate limiting requests", url),
        )
        .with_details(json!({ "http_status": doc.status })),
        Ok(doc) => warn(
            HealthReason::HttpStatus,
            format!("MTA-STS policy at {} returned HTTP {}", url, doc.status),
        )
        .with_details(json!({ "http_status": doc.status })),
        Err(DomainError::Timeout(_)) => warn(
            HealthReason::Timeout,
            format!("MTA-STS policy fetch from {} timed out", url),
        ),
        Err(DomainError::RateLimited(msg)) => warn(
            HealthReason::RateLimited,
            format!("MTA-STS policy fetch from {} rate limited: {}", url, msg),
        ),
        Err(e) => warn(
            HealthReason::Unreachable,
            format!("MTA-STS policy fetch from {} failed: {}", url, e),
        ),
    }
}

/// Age policy for the newest inbound message. `None` means nothing has ever
/// arrived, which is reported apart from a long silence.
pub fn classify_inbound_age(
    last_inbound_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> HealthCheckResult {
    let Some(last) = last_inbound_at else {
        return HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            HealthStatus::Warning,
            HealthReason::NeverReceived,
            "No inbound message has ever been received on this connection",
            now,
        );
    };

    let age = now.signed_duration_since(last);
    let hours = age.num_hours();
    let details = json!({ "last_inbound_at": last, "age_hours": hours });

    if age < ChronoDuration::hours(QUIET_AFTER_HOURS) {
        HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            HealthStatus::Ok,
            HealthReason::Recent,
            format!("Last inbound message received {}h ago", hours.max(0)),
            now,
        )
        .with_details(details)
    } else if age < ChronoDuration::hours(SILENT_AFTER_HOURS) {
        HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            HealthStatus::Warning,
            HealthReason::Quiet,
            format!("No inbound message for {}h", hours),
            now,
        )
        .with_details(details)
    } else {
        HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            HealthStatus::Error,
            HealthReason::Silent,
            format!(
                "No inbound message for {}h (threshold {}h)",
                hours, SILENT_AFTER_HOURS
            ),
            now,
        )
        .with_details(details)
    }
}

/// A store that cannot answer is ERROR; one that answers slowly is only WARNING.
pub fn classify_last_inbound(
    lookup: DomainResult<Option<DateTime<Utc>>>,
    now: DateTime<Utc>,
) -> HealthCheckResult {
    match lookup {
        Ok(last_inbound_at) => classify_inbound_age(last_inbound_at, now),
        Err(DomainError::Timeout(msg)) => HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            timeout_status(LAST_INBOUND_CHECK),
            HealthReason::Timeout,
            format!("Last inbound lookup timed out: {}", msg),
            now,
        ),
        Err(e) => HealthCheckResult::new(
            LAST_INBOUND_CHECK,
            HealthStatus::Error,
            HealthReason::Unreachable,
            format!("Last inbound lookup failed: {}", e),
            now,
        ),
    }
}

/// The five independent probes. None of them fail; every collaborator
/// error is folded into the returned result.
#[derive(Clone)]
pub struct SignalProbes {
    resolver: Arc<dyn TxtResolver>,
    fetcher: Arc<dyn PolicyFetcher>,
    repo: Arc<dyn InboundRepository>,
    store: Arc<dyn StoreHealth>,
    time: Arc<dyn TimeService>,
    config: ProbeConfig,
}

impl SignalProbes {
    pub fn new(
        resolver: Arc<dyn TxtResolver>,
        fetcher: Arc<dyn PolicyFetcher>,
        repo: Arc<dyn InboundRepository>,
        store: Arc<dyn StoreHealth>,
        time: Arc<dyn TimeService>,
        config: ProbeConfig,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            repo,
            store,
            time,
            config,
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout(format!(
                "{} exceeded {:?}",
                what, self.config.timeout
            ))),
        }
    }

    fn log(result: &HealthCheckResult) {
        match result.status {
            HealthStatus::Ok | HealthStatus::Na => tracing::debug!(
                "Probe {} -> {} ({})",
                result.name,
                result.status.as_str(),
                result.reason.as_str()
            ),
            HealthStatus::Warning | HealthStatus::Error => tracing::warn!(
                "Probe {} -> {} ({}): {}",
                result.name,
                result.status.as_str(),
                result.reason.as_str(),
                result.message
            ),
        }
    }

    pub async fn check_dkim(&self) -> HealthCheckResult {
        let name = self.config.dkim_name();
        let lookup = self
            .bounded("DKIM lookup", self.resolver.lookup_txt(&name))
            .await;
        let result = classify_dkim(&name, lookup, self.time.now());
        Self::log(&result);
        result
    }

    pub async fn check_mta_sts_record(&self) -> HealthCheckResult {
        let name = self.config.mta_sts_name();
        let lookup = self
            .bounded("MTA-STS lookup", self.resolver.lookup_txt(&name))
            .await;
        let result = classify_mta_sts_record(&name, lookup, self.time.now());
        Self::log(&result);
        result
    }

    pub async fn check_mta_sts_policy(&self) -> HealthCheckResult {
        let url = self.config.mta_sts_policy_url();
        let fetched = self
            .bounded("MTA-STS policy fetch", self.fetcher.fetch(&url))
            .await;
        let result = classify_mta_sts_policy(&url, fetched, self.time.now());
        Self::log(&result);
        result
    }

    pub async fn check_last_inbound(&self, connection_id: &str) -> HealthCheckResult {
        let lookup = self
            .bounded(
                "Last inbound lookup",
                self.repo.latest_updated_address(connection_id),
            )
            .await
            .map(|address| address.and_then(|a| a.last_inbound_at));
        let result = classify_last_inbound(lookup, self.time.now());
        Self::log(&result);
        result
    }

    pub async fn check_database(&self) -> HealthCheckResult {
        let ping = self.bounded("Database ping", self.store.ping()).await;
        let now = self.time.now();

        let result = match ping {
            Ok(()) => HealthCheckResult::new(
                DATABASE_CHECK,
                HealthStatus::Ok,
                HealthReason::Reachable,
                "Database is reachable",
                now,
            ),
            Err(DomainError::Timeout(msg)) => HealthCheckResult::new(
                DATABASE_CHECK,
                timeout_status(DATABASE_CHECK),
                HealthReason::Timeout,
                format!("Database ping timed out: {}", msg),
                now,
            ),
            Err(e) => HealthCheckResult::new(
                DATABASE_CHECK,
                HealthStatus::Error,
                HealthReason::Unreachable,
                format!("Database is unreachable: {}", e),
                now,
            ),
        };
        Self::log(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_inbound_age_thresholds() {
        let at = |h: i64| Some(now() - ChronoDuration::hours(h));

        assert_eq!(classify_inbound_age(at(23), now()).status, HealthStatus::Ok);
        assert_eq!(
            classify_inbound_age(at(30), now()).status,
            HealthStatus::Warning
        );
        assert_eq!(
            classify_inbound_age(at(80), now()).status,
            HealthStatus::Error
        );
    }

    #[test]
    fn test_inbound_age_boundaries() {
        let at = |h: i64| Some(now() - ChronoDuration::hours(h));

        assert_eq!(classify_inbound_age(at(24), now()).reason, HealthReason::Quiet);
        assert_eq!(classify_inbound_age(at(72), now()).reason, HealthReason::Silent);
    }

    #[test]
    fn test_never_received_is_distinct_from_silence() {
        let never = classify_inbound_age(None, now());
        let silent = classify_inbound_age(Some(now() - ChronoDuration::hours(100)), now());

        assert_eq!(never.status, HealthStatus::Warning);
        assert_eq!(never.reason, HealthReason::NeverReceived);
        assert_ne!(never.reason, silent.reason);
    }

    #[test]
    fn test_last_inbound_timeout_warns_but_failure_errors() {
        let timeout = classify_last_inbound(Err(DomainError::Timeout("5s".into())), now());
        assert_eq!(timeout.status, HealthStatus::Warning);
        assert_eq!(timeout.reason, HealthReason::Timeout);
        assert_eq!(timeout.status, timeout_status(LAST_INBOUND_CHECK));

        let down = classify_last_inbound(Err(DomainError::Unreachable("gone".into())), now());
        assert_eq!(down.status, HealthStatus::Error);
        assert_eq!(down.reason, HealthReason::Unreachable);
    }

    #[test]
    fn test_timeout_status_by_check() {
        assert_eq!(timeout_status(DKIM_CHECK), HealthStatus::Error);
        assert_eq!(timeout_status(DATABASE_CHECK), HealthStatus::Error);
        assert_eq!(timeout_status(MTA_STS_RECORD_CHECK), HealthStatus::Warning);
        assert_eq!(timeout_status(MTA_STS_POLICY_CHECK), HealthStatus::Warning);
        assert_eq!(timeout_status(LAST_INBOUND_CHECK), HealthStatus::Warning);
    }

    #[test]
    fn test_dkim_missing_is_error() {
        let result = classify_dkim(
            "inbound._domainkey.mail.test",
            Err(DomainError::NotFound("no records".into())),
            now(),
        );
        assert_eq!(result.status, HealthStatus::Error);
        assert_eq!(result.reason, HealthReason::RecordMissing);
    }

    #[test]
    fn test_dkim_without_key_is_warning() {
        let result = classify_dkim(
            "sel._domainkey.mail.test",
            Ok(vec!["v=DKIM1; k=rsa; p=".to_string()]),
            now(),
        );
        assert_eq!(result.status, HealthStatus::Warning);
        assert_eq!(result.reason, HealthReason::RecordMalformed);
    }

    #[test]
    fn test_dkim_valid_record() {
        let result = classify_dkim(
            "sel._domainkey.mail.test",
            Ok(vec![
                "google-site-verification=abc".to_string(),
                "v=DKIM1; k=rsa; p=MIIBIjANBgkq".to_string(),
            ]),
            now(),
        );
        assert_eq!(result.status, HealthStatus::Ok);
    }

    #[test]
    fn test_mta_sts_record_never_errors() {
        for lookup in [
            Err(DomainError::NotFound("nx".into())),
            Err(DomainError::Timeout("slow".into())),
            Err(DomainError::Unreachable("down".into())),
            Ok(vec!["v=STSv1;".to_string()]),
        ] {
            let result = classify_mta_sts_record("_mta-sts.mail.test", lookup, now());
            assert_eq!(result.status, HealthStatus::Warning);
        }

        let ok = classify_mta_sts_record(
            "_mta-sts.mail.test",
            Ok(vec!["v=STSv1; id=20240601T000000;".to_string()]),
            now(),
        );
        assert_eq!(ok.status, HealthStatus::Ok);
    }

    #[test]
    fn test_policy_document_statuses() {
        let url = "https://mta-sts.mail.test/.well-known/mta-sts.txt";
        let doc = |status: u16, body: &str| {
            Ok(FetchedDocument {
                status,
                body: body.to_string(),
            })
        };

        let ok = classify_mta_sts_policy(url, doc(200, "version: STSv1\nmode: enforce\n"), now());
        assert_eq!(ok.status, HealthStatus::Ok);

        let wrong_body = classify_mta_sts_policy(url, doc(200, "<html>"), now());
        assert_eq!(wrong_body.reason, HealthReason::DocumentInvalid);

        let limited = classify_mta_sts_policy(url, doc(429, ""), now());
        assert_eq!(limited.status, HealthStatus::Warning);
        assert_eq!(limited.reason, HealthReason::RateLimited);

        let missing = classify_mta_sts_policy(url, doc(404, "not found"), now());
        assert_eq!(missing.reason, HealthReason::HttpStatus);

        let timeout =
            classify_mta_sts_policy(url, Err(DomainError::Timeout("5s".into())), now());
        assert_eq!(timeout.status, HealthStatus::Warning);
        assert_eq!(timeout.reason, HealthReason::Timeout);
    }
}

use crate::application::services::address_provisioner::{
    parse_canonical_address, AddressProvisioner,
};
use crate::domain::entities::{
    normalize_country, InboundAddress, ManualConfiguration, ValidationStatus,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub const VALIDATION_EMAIL_JOB: &str = "send_inbound_validation_email";
const VALIDATION_EMAIL_MAX_ATTEMPTS: i32 = 3;
const MAX_ROTATION_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDispatchResult {
    pub address_id: String,
    pub country: String,
    pub email: String,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDispatch {
    pub sent: usize,
    pub results: Vec<ValidationDispatchResult>,
}

pub fn validation_subject(token: &str) -> String {
    format!("Inbound address validation [{}]", token)
}

fn validation_body(address: &InboundAddress) -> String {
    format!(
        "This is an automated self-test of the inbound address {}.\n\
         Validation token: {}\n\
         No action is required.",
        address.email, address.token
    )
}

/// Self-test round trips and the address lifecycle that follows from them
#[derive(Clone)]
pub struct ValidationService {
    repo: Arc<dyn InboundRepository>,
    queue: Arc<dyn TaskQueue>,
    time: Arc<dyn TimeService>,
    provisioner: AddressProvisioner,
}

impl ValidationService {
    pub fn new(
        repo: Arc<dyn InboundRepository>,
        queue: Arc<dyn TaskQueue>,
        time: Arc<dyn TimeService>,
        provisioner: AddressProvisioner,
    ) -> Self {
        Self {
            repo,
            queue,
            time,
            provisioner,
        }
    }

    /// Enqueue one self-test email per target address. Targets are the
    /// addresses for `country` when given, otherwise every address that is
    /// not yet validated. Confirmation arrives later through
    /// [`Self::record_inbound_message`].
    pub async fn send_validation_email(
        &self,
        connection_id: &str,
        country: Option<&str>,
    ) -> DomainResult<ValidationDispatch> {
        let connection = self
            .repo
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Connection {}", connection_id)))?;

        let country = country.map(normalize_country).transpose()?;
        let targets: Vec<InboundAddress> = self
            .repo
            .list_addresses(&connection.id)
            .await?
            .into_iter()
            .filter(|a| match &country {
                Some(c) => &a.country == c,
                None => !a.is_validated(),
            })
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        for address in targets {
            let payload = json!({
                "address_id": address.id,
                "connection_id": connection.id,
                "to": address.email,
                "subject": validation_subject(&address.token),
                "body": validation_body(&address),
                "token": address.token,
            });

            let outcome = self
                .queue
                .enqueue(
                    VALIDATION_EMAIL_JOB,
                    &connection.tenant_id,
                    payload,
                    VALIDATION_EMAIL_MAX_ATTEMPTS,
                )
                .await;

            let (job_id, error) = match outcome {
                Ok(job_id) => {
                    tracing::info!(
                        "Enqueued validation email job {} for {}",
                        job_id,
                        address.email
                    );
                    (Some(job_id), None)
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to enqueue validation email for {}: {}",
                        address.email,
                        e
                    );
                    (None, Some(e.to_string()))
                }
            };

            results.push(ValidationDispatchResult {
                address_id: address.id,
                country: address.country,
                email: address.email,
                job_id,
                error,
            });
        }

        let sent = results.iter().filter(|r| r.job_id.is_some()).count();
        Ok(ValidationDispatch { sent, results })
    }

    /// Issue a new token and address. The old token is retired for good.
    pub async fn regenerate_token(&self, address_id: &str) -> DomainResult<InboundAddress> {
        let current = self.load_address(address_id).await?;

        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let token = self.provisioner.fresh_token().await?;
            let mut rotated = current.clone();
            rotated.email = self.provisioner.address_for(
                current.marketplace,
                &current.tenant_id,
                &current.country,
                &token,
            )?;
            rotated.token = token;
            rotated.validation_status = ValidationStatus::Pending;
            rotated.validation_error = None;
            rotated.validated_at = None;
            rotated.updated_at = self.time.now();

            match self.repo.rotate_token(&rotated, &current.token).await {
                Ok(()) => {
                    tracing::info!(
                        "Regenerated token for address {}: {} -> {}",
                        address_id,
                        current.email,
                        rotated.email
                    );
                    return Ok(rotated);
                }
                Err(DomainError::Conflict(msg)) => {
                    tracing::warn!("Token rotation conflict for {}: {}", address_id, msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::Internal(format!(
            "Could not rotate token for address {}",
            address_id
        )))
    }

    pub async fn mark_manually_configured(
        &self,
        address_id: &str,
        configured_by: &str,
        note: Option<String>,
    ) -> DomainResult<InboundAddress> {
        if configured_by.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "configured_by must not be empty".to_string(),
            ));
        }

        let mut address = self.load_address(address_id).await?;
        let now = self.time.now();
        address.manual_configuration = Some(ManualConfiguration {
            configured_by: configured_by.trim().to_string(),
            configured_at: now,
            note,
        });
        address.validation_status = ValidationStatus::Validated;
        address.validation_error = None;
        address.validated_at.get_or_insert(now);
        address.updated_at = now;

        self.repo.update_address(&address).await?;
        tracing::info!(
            "Address {} marked as manually configured by {}",
            address.id,
            configured_by
        );
        Ok(address)
    }

    pub async fn mark_validation_failed(
        &self,
        address_id: &str,
        error: &str,
    ) -> DomainResult<InboundAddress> {
        let mut address = self.load_address(address_id).await?;
        address.validation_status = ValidationStatus::Failed;
        address.validation_error = Some(error.to_string());
        address.updated_at = self.time.now();

        self.repo.update_address(&address).await?;
        tracing::warn!("Address {} validation failed: {}", address.id, error);
        Ok(address)
    }

    /// Record a message delivered to an inbound address. A message whose
    /// subject carries the address token is the self-test coming back and
    /// validates the address.
    pub async fn record_inbound_message(
        &self,
        recipient: &str,
        subject: Option<&str>,
        received_at: DateTime<Utc>,
    ) -> DomainResult<InboundAddress> {
        let parsed = parse_canonical_address(recipient)?;

        if self.repo.is_token_retired(&parsed.token).await? {
            return Err(DomainError::NotFound(format!(
                "Inbound address {} has been retired",
                recipient
            )));
        }

        let mut address = self
            .repo
            .find_address_by_token(&parsed.token)
            .await?
            .filter(|a| {
                a.marketplace == parsed.marketplace
                    && a.country == parsed.country
                    && a.tenant_id.eq_ignore_ascii_case(&parsed.tenant_id)
            })
            .ok_or_else(|| DomainError::NotFound(format!("Inbound address {}", recipient)))?;

        let newer = address.last_inbound_at.map_or(true, |t| received_at > t);
        if newer {
            address.last_inbound_at = Some(received_at);
        }

        let is_self_test = subject.map_or(false, |s| s.contains(&address.token));
        if is_self_test && !address.is_validated() {
            address.validation_status = ValidationStatus::Validated;
            address.validation_error = None;
            address.validated_at = Some(received_at);
            tracing::info!("Inbound address {} validated by self-test", address.email);
        }

        address.updated_at = self.time.now();
        self.repo.update_address(&address).await?;
        Ok(address)
    }

    async fn load_address(&self, address_id: &str) -> DomainResult<InboundAddress> {
        self.repo
            .get_address(address_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Address {}", address_id)))
    }
}

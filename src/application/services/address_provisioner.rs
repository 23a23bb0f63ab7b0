use crate::domain::entities::{
    normalize_country, ConnectionStatus, InboundAddress, InboundConnection, Marketplace,
    ValidationStatus,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::time_service::TimeService;
use crate::domain::services::connection_transitions::validate_transition;
use rand::{thread_rng, Rng};
use regex::Regex;
use std::sync::{Arc, OnceLock};

pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const MIN_TOKEN_LENGTH: usize = 6;
pub const DEFAULT_TOKEN_LENGTH: usize = 6;

/// Upper bound on token draws before giving up on finding an unused one
const MAX_TOKEN_ATTEMPTS: usize = 8;

/// Re-read and retry budget for connection writes that lose a version race
const MAX_WRITE_ATTEMPTS: usize = 16;

/// Generate a random lowercase alphanumeric token of `length` characters
pub fn generate_token(length: usize) -> DomainResult<String> {
    if length < MIN_TOKEN_LENGTH {
        return Err(DomainError::ValidationError(format!(
            "Token length must be at least {} characters, got {}",
            MIN_TOKEN_LENGTH, length
        )));
    }

    let mut rng = thread_rng();
    Ok((0..length)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect())
}

/// `{marketplace}.{tenant}.{country}.{token}@{domain}`. Parsed downstream by
/// the inbound mail pipeline, so the shape must not change.
pub fn canonical_address(
    marketplace: Marketplace,
    tenant_id: &str,
    country: &str,
    token: &str,
    inbound_domain: &str,
) -> String {
    format!(
        "{}.{}.{}.{}@{}",
        marketplace.slug(),
        tenant_id,
        country.to_ascii_lowercase(),
        token,
        inbound_domain
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAddress {
    pub marketplace: Marketplace,
    pub tenant_id: String,
    /// Upper-case country code
    pub country: String,
    pub token: String,
    pub domain: String,
}

fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<marketplace>[a-z]+)\.(?P<tenant>.+)\.(?P<country>[a-z]{2})\.(?P<token>[a-z0-9]{6,})@(?P<domain>[^@\s]+)$",
        )
        .expect("canonical address pattern is valid")
    })
}

/// Inverse of [`canonical_address`]
pub fn parse_canonical_address(email: &str) -> DomainResult<ParsedAddress> {
    let trimmed = email.trim();
    let captures = canonical_pattern().captures(trimmed).ok_or_else(|| {
        DomainError::FormatInvalid(format!("Not a canonical inbound address: {}", trimmed))
    })?;

    let marketplace = captures["marketplace"]
        .parse::<Marketplace>()
        .map_err(|_| {
            DomainError::FormatInvalid(format!(
                "Unknown marketplace in inbound address: {}",
                &captures["marketplace"]
            ))
        })?;

    Ok(ParsedAddress {
        marketplace,
        tenant_id: captures["tenant"].to_string(),
        country: captures["country"].to_ascii_uppercase(),
        token: captures["token"].to_string(),
        domain: captures["domain"].to_ascii_lowercase(),
    })
}

fn validate_tenant_id(tenant_id: &str) -> DomainResult<()> {
    if tenant_id.is_empty()
        || tenant_id.contains('@')
        || tenant_id.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(DomainError::ValidationError(format!(
            "Invalid tenant id: '{}'",
            tenant_id
        )));
    }
    Ok(())
}

/// Ensures connections and their per-country inbound addresses exist
#[derive(Clone)]
pub struct AddressProvisioner {
    repo: Arc<dyn InboundRepository>,
    time: Arc<dyn TimeService>,
    inbound_domain: String,
    token_length: usize,
}

impl AddressProvisioner {
    pub fn new(
        repo: Arc<dyn InboundRepository>,
        time: Arc<dyn TimeService>,
        inbound_domain: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            time,
            inbound_domain: inbound_domain.into().to_ascii_lowercase(),
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }

    /// Use longer tokens for more entropy. Shorter than the minimum is rejected.
    pub fn with_token_length(mut self, token_length: usize) -> DomainResult<Self> {
        if token_length < MIN_TOKEN_LENGTH {
            return Err(DomainError::ValidationError(format!(
                "Token length must be at least {} characters",
                MIN_TOKEN_LENGTH
            )));
        }
        self.token_length = token_length;
        Ok(self)
    }

    pub fn inbound_domain(&self) -> &str {
        &self.inbound_domain
    }

    /// Idempotently create the (tenant, marketplace) connection and one
    /// PENDING address per requested country that does not have one yet.
    pub async fn ensure_connection(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
        countries: &[String],
    ) -> DomainResult<InboundConnection> {
        validate_tenant_id(tenant_id)?;

        let mut requested: Vec<String> = Vec::with_capacity(countries.len());
        for raw in countries {
            let country = normalize_country(raw)?;
            if !requested.contains(&country) {
                requested.push(country);
            }
        }

        let connection = self
            .upsert_connection(tenant_id, marketplace, &requested)
            .await?;

        let existing = self.repo.list_addresses(&connection.id).await?;
        for country in &requested {
            if existing.iter().any(|a| &a.country == country) {
                continue;
            }
            self.create_address(&connection, country).await?;
        }

        Ok(connection)
    }

    async fn upsert_connection(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
        requested: &[String],
    ) -> DomainResult<InboundConnection> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(connection) = self.repo.find_connection(tenant_id, marketplace).await? else {
                let connection = InboundConnection::new(
                    tenant_id.to_string(),
                    marketplace,
                    requested.to_vec(),
                    self.time.now(),
                );
                match self.repo.create_connection(&connection).await {
                    Ok(()) => {
                        tracing::info!(
                            "Created inbound connection {} for tenant {} on {}",
                            connection.id,
                            tenant_id,
                            marketplace
                        );
                        return Ok(connection);
                    }
                    // Another handler created it first; merge into theirs
                    Err(DomainError::Conflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            };

            match self.merge_countries(connection, requested).await {
                Ok(connection) => return Ok(connection),
                Err(DomainError::Conflict(msg)) => {
                    tracing::debug!("Retrying country merge: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::Conflict(format!(
            "Connection for tenant {} on {} kept changing during update",
            tenant_id, marketplace
        )))
    }

    async fn merge_countries(
        &self,
        mut connection: InboundConnection,
        requested: &[String],
    ) -> DomainResult<InboundConnection> {
        for country in requested {
            if !connection.countries.contains(country) {
                connection.countries.push(country.clone());
            }
        }
        connection.updated_at = self.time.now();
        self.repo.update_connection(&connection).await?;
        connection.version += 1;
        Ok(connection)
    }

    async fn create_address(
        &self,
        connection: &InboundConnection,
        country: &str,
    ) -> DomainResult<()> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = self.fresh_token().await?;
            let now = self.time.now();
            let address = InboundAddress {
                id: uuid::Uuid::new_v4().to_string(),
                connection_id: connection.id.clone(),
                tenant_id: connection.tenant_id.clone(),
                marketplace: connection.marketplace,
                country: country.to_string(),
                email: self.address_for(
                    connection.marketplace,
                    &connection.tenant_id,
                    country,
                    &token,
                )?,
                token,
                validation_status: ValidationStatus::Pending,
                validation_error: None,
                validated_at: None,
                last_inbound_at: None,
                manual_configuration: None,
                created_at: now,
                updated_at: now,
            };

            match self.repo.create_address(&address).await {
                Ok(()) => {
                    tracing::info!(
                        "Provisioned inbound address {} for connection {} ({})",
                        address.email,
                        connection.id,
                        country
                    );
                    return Ok(());
                }
                Err(DomainError::Conflict(msg)) => {
                    let raced = self
                        .repo
                        .list_addresses(&connection.id)
                        .await?
                        .into_iter()
                        .any(|a| a.country == country);
                    if raced {
                        tracing::debug!(
                            "Address for {} on connection {} created concurrently",
                            country,
                            connection.id
                        );
                        return Ok(());
                    }
                    tracing::warn!("Token collision while provisioning address: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::Internal(format!(
            "Could not allocate a unique token for country {}",
            country
        )))
    }

    /// A token that no address holds and that was never retired
    pub(crate) async fn fresh_token(&self) -> DomainResult<String> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = generate_token(self.token_length)?;
            if !self.repo.token_exists(&token).await? {
                return Ok(token);
            }
        }
        Err(DomainError::Internal(
            "Exhausted attempts to generate an unused token".to_string(),
        ))
    }

    pub(crate) fn address_for(
        &self,
        marketplace: Marketplace,
        tenant_id: &str,
        country: &str,
        token: &str,
    ) -> DomainResult<String> {
        let email = canonical_address(marketplace, tenant_id, country, token, &self.inbound_domain);
        if !email_address::EmailAddress::is_valid(&email) {
            return Err(DomainError::ValidationError(format!(
                "Derived inbound address is not a valid email: {}",
                email
            )));
        }
        Ok(email)
    }

    pub async fn get_connection(&self, connection_id: &str) -> DomainResult<InboundConnection> {
        self.repo
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Connection {}", connection_id)))
    }

    pub async fn list_addresses(&self, connection_id: &str) -> DomainResult<Vec<InboundAddress>> {
        self.repo.list_addresses(connection_id).await
    }

    pub async fn list_tenant_connections(
        &self,
        tenant_id: &str,
    ) -> DomainResult<Vec<InboundConnection>> {
        self.repo.list_tenant_connections(tenant_id).await
    }

    pub async fn set_connection_status(
        &self,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> DomainResult<InboundConnection> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut connection = self.get_connection(connection_id).await?;

            validate_transition(connection.status, status)
                .map_err(|e| DomainError::ValidationError(e.to_string()))?;

            if connection.status == status {
                return Ok(connection);
            }

            let previous = connection.status;
            connection.status = status;
            connection.updated_at = self.time.now();
            match self.repo.update_connection(&connection).await {
                Ok(()) => {
                    tracing::info!(
                        "Connection {} status {} -> {}",
                        connection.id,
                        previous,
                        status
                    );
                    connection.version += 1;
                    return Ok(connection);
                }
                Err(DomainError::Conflict(msg)) => {
                    tracing::debug!("Retrying status change: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::Conflict(format!(
            "Connection {} kept changing during status update",
            connection_id
        )))
    }
}

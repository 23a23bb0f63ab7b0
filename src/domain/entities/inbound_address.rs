use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::inbound_connection::Marketplace;
use crate::domain::errors::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pending,
    Validated,
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "PENDING",
            ValidationStatus::Validated => "VALIDATED",
            ValidationStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ValidationStatus::Pending),
            "VALIDATED" => Ok(ValidationStatus::Validated),
            "FAILED" => Ok(ValidationStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "Unknown validation status: {}",
                other
            ))),
        }
    }
}

/// Who flagged the address as configured by hand on the marketplace side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualConfiguration {
    pub configured_by: String,
    pub configured_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundAddress {
    pub id: String,
    pub connection_id: String,
    pub tenant_id: String,
    pub marketplace: Marketplace,
    /// Upper-case ISO country code
    pub country: String,
    pub token: String,
    pub email: String,
    pub validation_status: ValidationStatus,
    pub validation_error: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub manual_configuration: Option<ManualConfiguration>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InboundAddress {
    pub fn is_validated(&self) -> bool {
        self.validation_status == ValidationStatus::Validated
    }
}

/// Normalize a country code to two upper-case ASCII letters
pub fn normalize_country(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::ValidationError(format!(
            "Invalid country code: '{}'",
            raw
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

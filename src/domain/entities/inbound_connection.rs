use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Marketplace {
    Amazon,
}

impl Marketplace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Amazon => "AMAZON",
        }
    }

    /// Lowercase form used in canonical addresses
    pub fn slug(&self) -> &'static str {
        match self {
            Marketplace::Amazon => "amazon",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AMAZON" => Ok(Marketplace::Amazon),
            other => Err(DomainError::ValidationError(format!(
                "Unsupported marketplace: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Pending,
    Connected,
    Error,
    Disabled,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "PENDING",
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Error => "ERROR",
            ConnectionStatus::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ConnectionStatus::Pending),
            "CONNECTED" => Ok(ConnectionStatus::Connected),
            "ERROR" => Ok(ConnectionStatus::Error),
            "DISABLED" => Ok(ConnectionStatus::Disabled),
            other => Err(DomainError::ValidationError(format!(
                "Unknown connection status: {}",
                other
            ))),
        }
    }
}

/// One inbound email connection per (tenant, marketplace)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundConnection {
    pub id: String,
    pub tenant_id: String,
    pub marketplace: Marketplace,
    /// Upper-case ISO country codes
    pub countries: Vec<String>,
    pub status: ConnectionStatus,
    /// Bumped on every stored update; writes against a stale version are rejected
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InboundConnection {
    pub fn new(
        tenant_id: String,
        marketplace: Marketplace,
        countries: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id,
            marketplace,
            countries,
            status: ConnectionStatus::Connected,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

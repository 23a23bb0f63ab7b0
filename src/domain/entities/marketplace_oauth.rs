use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::inbound_connection::Marketplace;

/// Marketplace OAuth grant for a tenant. The status is kept raw because the
/// grant is owned by another subsystem and may carry values this crate does
/// not model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceOAuth {
    pub tenant_id: String,
    pub marketplace: Marketplace,
    pub status: String,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MarketplaceOAuth {
    pub fn is_connected(&self) -> bool {
        self.status.eq_ignore_ascii_case("CONNECTED")
    }
}

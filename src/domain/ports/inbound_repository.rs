use crate::domain::entities::{InboundAddress, InboundConnection, Marketplace};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

/// Connection and address storage. Uniqueness of (tenant, marketplace) for
/// connections, (tenant, marketplace, country) and token for addresses is
/// enforced by the store and surfaces as `DomainError::Conflict`.
#[async_trait]
pub trait InboundRepository: Send + Sync {
    async fn get_connection(&self, connection_id: &str) -> DomainResult<Option<InboundConnection>>;
    async fn find_connection(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
    ) -> DomainResult<Option<InboundConnection>>;
    async fn list_tenant_connections(&self, tenant_id: &str) -> DomainResult<Vec<InboundConnection>>;
    async fn create_connection(&self, connection: &InboundConnection) -> DomainResult<()>;
    /// Compare-and-set on `connection.version`. A stale version is `Conflict`
    /// and leaves the stored row untouched; on success the stored version is
    /// one higher than the one passed in.
    async fn update_connection(&self, connection: &InboundConnection) -> DomainResult<()>;

    async fn list_addresses(&self, connection_id: &str) -> DomainResult<Vec<InboundAddress>>;
    async fn get_address(&self, address_id: &str) -> DomainResult<Option<InboundAddress>>;
    async fn find_address_by_token(&self, token: &str) -> DomainResult<Option<InboundAddress>>;
    /// Address of the connection with the newest `updated_at`
    async fn latest_updated_address(&self, connection_id: &str)
        -> DomainResult<Option<InboundAddress>>;
    async fn create_address(&self, address: &InboundAddress) -> DomainResult<()>;
    async fn update_address(&self, address: &InboundAddress) -> DomainResult<()>;

    /// True when the token is held by an address or was retired from one
    async fn token_exists(&self, token: &str) -> DomainResult<bool>;
    async fn is_token_retired(&self, token: &str) -> DomainResult<bool>;
    /// Atomically retire `retired_token` and persist the address under its new token
    async fn rotate_token(&self, address: &InboundAddress, retired_token: &str) -> DomainResult<()>;
}

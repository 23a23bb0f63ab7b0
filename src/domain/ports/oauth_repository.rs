use crate::domain::entities::{Marketplace, MarketplaceOAuth};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait OAuthRepository: Send + Sync {
    async fn get_marketplace_oauth(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
    ) -> DomainResult<Option<MarketplaceOAuth>>;
}

use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> DomainResult<()>;
}

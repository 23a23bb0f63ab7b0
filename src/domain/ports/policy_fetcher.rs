use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait PolicyFetcher: Send + Sync {
    /// GET `url`. Non-2xx responses are returned, not raised; transport
    /// failures map to `Timeout` or `Unreachable`.
    async fn fetch(&self, url: &str) -> DomainResult<FetchedDocument>;
}

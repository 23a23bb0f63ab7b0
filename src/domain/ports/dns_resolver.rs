use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// TXT records at `name`, each with its character-string fragments already
    /// concatenated. A name without TXT records yields `DomainError::NotFound`.
    async fn lookup_txt(&self, name: &str) -> DomainResult<Vec<String>>;
}

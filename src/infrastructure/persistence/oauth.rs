use crate::domain::entities::{Marketplace, MarketplaceOAuth};
use crate::domain::errors::DomainResult;
use crate::domain::ports::oauth_repository::OAuthRepository;
use crate::infrastructure::persistence::{nullable_text, parse_ts, Database};
use async_trait::async_trait;
use sqlx::Row;

#[async_trait]
impl OAuthRepository for Database {
    async fn get_marketplace_oauth(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
    ) -> DomainResult<Option<MarketplaceOAuth>> {
        let row = sqlx::query(
            "SELECT tenant_id, status, last_error, updated_at
             FROM marketplace_oauth_connections
             WHERE tenant_id = ? AND marketplace = ?",
        )
        .bind(tenant_id)
        .bind(marketplace.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let updated_at: String = row.try_get("updated_at")?;
                Ok(Some(MarketplaceOAuth {
                    tenant_id: row.try_get("tenant_id")?,
                    marketplace,
                    status: row.try_get("status")?,
                    last_error: nullable_text(&row, "last_error"),
                    updated_at: parse_ts(&updated_at)?,
                }))
            }
            None => Ok(None),
        }
    }
}

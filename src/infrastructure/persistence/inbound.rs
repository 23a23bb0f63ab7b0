use crate::domain::entities::{
    ConnectionStatus, InboundAddress, InboundConnection, ManualConfiguration, Marketplace,
    ValidationStatus,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::infrastructure::persistence::{
    format_ts, nullable_text, parse_opt_ts, parse_ts, Database,
};
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

const CONNECTION_COLUMNS: &str =
    "id, tenant_id, marketplace, countries, status, version, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, connection_id, tenant_id, marketplace, country, token, email,
     validation_status, validation_error, validated_at, last_inbound_at,
     manual_configured_by, manual_configured_at, manual_configuration_note,
     created_at, updated_at";

fn stored<T, E: std::fmt::Display>(value: Result<T, E>, column: &str) -> DomainResult<T> {
    value.map_err(|e| DomainError::Internal(format!("Invalid stored {}: {}", column, e)))
}

fn connection_from_row(row: &AnyRow) -> DomainResult<InboundConnection> {
    let marketplace: String = row.try_get("marketplace")?;
    let status: String = row.try_get("status")?;
    let countries: String = row.try_get("countries")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(InboundConnection {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        marketplace: stored(marketplace.parse::<Marketplace>(), "marketplace")?,
        countries: stored(serde_json::from_str(&countries), "countries")?,
        status: stored(status.parse::<ConnectionStatus>(), "connection status")?,
        version: row.try_get("version")?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn address_from_row(row: &AnyRow) -> DomainResult<InboundAddress> {
    let marketplace: String = row.try_get("marketplace")?;
    let validation_status: String = row.try_get("validation_status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    // Markers are all set together; a partial set is treated as absent
    let configured_by = nullable_text(row, "manual_configured_by");
    let configured_at = parse_opt_ts(nullable_text(row, "manual_configured_at"))?;
    let manual_configuration = match (configured_by, configured_at) {
        (Some(configured_by), Some(configured_at)) => Some(ManualConfiguration {
            configured_by,
            configured_at,
            note: nullable_text(row, "manual_configuration_note"),
        }),
        _ => None,
    };

    Ok(InboundAddress {
        id: row.try_get("id")?,
        connection_id: row.try_get("connection_id")?,
        tenant_id: row.try_get("tenant_id")?,
        marketplace: stored(marketplace.parse::<Marketplace>(), "marketplace")?,
        country: row.try_get("country")?,
        token: row.try_get("token")?,
        email: row.try_get("email")?,
        validation_status: stored(
            validation_status.parse::<ValidationStatus>(),
            "validation status",
        )?,
        validation_error: nullable_text(row, "validation_error"),
        validated_at: parse_opt_ts(nullable_text(row, "validated_at"))?,
        last_inbound_at: parse_opt_ts(nullable_text(row, "last_inbound_at"))?,
        manual_configuration,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn countries_json(connection: &InboundConnection) -> DomainResult<String> {
    serde_json::to_string(&connection.countries)
        .map_err(|e| DomainError::Internal(format!("Failed to encode countries: {}", e)))
}

#[async_trait]
impl InboundRepository for Database {
    async fn get_connection(&self, connection_id: &str) -> DomainResult<Option<InboundConnection>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_connections WHERE id = ?",
            CONNECTION_COLUMNS
        ))
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(connection_from_row).transpose()
    }

    async fn find_connection(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
    ) -> DomainResult<Option<InboundConnection>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_connections WHERE tenant_id = ? AND marketplace = ?",
            CONNECTION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(marketplace.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(connection_from_row).transpose()
    }

    async fn list_tenant_connections(&self, tenant_id: &str) -> DomainResult<Vec<InboundConnection>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inbound_connections WHERE tenant_id = ? ORDER BY created_at",
            CONNECTION_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(connection_from_row).collect()
    }

    async fn create_connection(&self, connection: &InboundConnection) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO inbound_connections (id, tenant_id, marketplace, countries, status, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&connection.id)
        .bind(&connection.tenant_id)
        .bind(connection.marketplace.as_str())
        .bind(countries_json(connection)?)
        .bind(connection.status.as_str())
        .bind(connection.version)
        .bind(format_ts(&connection.created_at))
        .bind(format_ts(&connection.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_connection(&self, connection: &InboundConnection) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE inbound_connections
             SET countries = ?, status = ?, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(countries_json(connection)?)
        .bind(connection.status.as_str())
        .bind(format_ts(&connection.updated_at))
        .bind(&connection.id)
        .bind(connection.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_connection(&connection.id).await? {
                Some(current) => Err(DomainError::Conflict(format!(
                    "Connection {} changed concurrently (version {} != {})",
                    connection.id, current.version, connection.version
                ))),
                None => Err(DomainError::NotFound(format!(
                    "Connection {}",
                    connection.id
                ))),
            };
        }
        Ok(())
    }

    async fn list_addresses(&self, connection_id: &str) -> DomainResult<Vec<InboundAddress>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM inbound_addresses WHERE connection_id = ? ORDER BY country",
            ADDRESS_COLUMNS
        ))
        .bind(connection_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(address_from_row).collect()
    }

    async fn get_address(&self, address_id: &str) -> DomainResult<Option<InboundAddress>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_addresses WHERE id = ?",
            ADDRESS_COLUMNS
        ))
        .bind(address_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(address_from_row).transpose()
    }

    async fn find_address_by_token(&self, token: &str) -> DomainResult<Option<InboundAddress>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_addresses WHERE token = ?",
            ADDRESS_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(address_from_row).transpose()
    }

    async fn latest_updated_address(
        &self,
        connection_id: &str,
    ) -> DomainResult<Option<InboundAddress>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM inbound_addresses
             WHERE connection_id = ?
             ORDER BY updated_at DESC
             LIMIT 1",
            ADDRESS_COLUMNS
        ))
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(address_from_row).transpose()
    }

    async fn create_address(&self, address: &InboundAddress) -> DomainResult<()> {
        let manual = address.manual_configuration.as_ref();
        sqlx::query(
            "INSERT INTO inbound_addresses (
                id, connection_id, tenant_id, marketplace, country, token, email,
                validation_status, validation_error, validated_at, last_inbound_at,
                manual_configured_by, manual_configured_at, manual_configuration_note,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&address.id)
        .bind(&address.connection_id)
        .bind(&address.tenant_id)
        .bind(address.marketplace.as_str())
        .bind(&address.country)
        .bind(&address.token)
        .bind(&address.email)
        .bind(address.validation_status.as_str())
        .bind(address.validation_error.clone())
        .bind(address.validated_at.as_ref().map(format_ts))
        .bind(address.last_inbound_at.as_ref().map(format_ts))
        .bind(manual.map(|m| m.configured_by.clone()))
        .bind(manual.map(|m| format_ts(&m.configured_at)))
        .bind(manual.and_then(|m| m.note.clone()))
        .bind(format_ts(&address.created_at))
        .bind(format_ts(&address.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_address(&self, address: &InboundAddress) -> DomainResult<()> {
        let manual = address.manual_configuration.as_ref();
        let result = sqlx::query(
            "UPDATE inbound_addresses
             SET validation_status = ?, validation_error = ?, validated_at = ?,
                 last_inbound_at = ?, manual_configured_by = ?, manual_configured_at = ?,
                 manual_configuration_note = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(address.validation_status.as_str())
        .bind(address.validation_error.clone())
        .bind(address.validated_at.as_ref().map(format_ts))
        .bind(address.last_inbound_at.as_ref().map(format_ts))
        .bind(manual.map(|m| m.configured_by.clone()))
        .bind(manual.map(|m| format_ts(&m.configured_at)))
        .bind(manual.and_then(|m| m.note.clone()))
        .bind(format_ts(&address.updated_at))
        .bind(&address.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("Address {}", address.id)));
        }
        Ok(())
    }

    async fn token_exists(&self, token: &str) -> DomainResult<bool> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM inbound_addresses WHERE token = ?)
              + (SELECT COUNT(*) FROM retired_inbound_tokens WHERE token = ?) AS hits",
        )
        .bind(token)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        let hits: i64 = row.try_get("hits")?;
        Ok(hits > 0)
    }

    async fn is_token_retired(&self, token: &str) -> DomainResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS hits FROM retired_inbound_tokens WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await?;

        let hits: i64 = row.try_get("hits")?;
        Ok(hits > 0)
    }

    async fn rotate_token(&self, address: &InboundAddress, retired_token: &str) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO retired_inbound_tokens (token, address_id, retired_at) VALUES (?, ?, ?)",
        )
        .bind(retired_token)
        .bind(&address.id)
        .bind(format_ts(&address.updated_at))
        .execute(&mut *tx)
        .await?;

        // Guarded on the old token so a concurrent rotation loses cleanly
        let result = sqlx::query(
            "UPDATE inbound_addresses
             SET token = ?, email = ?, validation_status = ?, validation_error = NULL,
                 validated_at = NULL, updated_at = ?
             WHERE id = ? AND token = ?",
        )
        .bind(&address.token)
        .bind(&address.email)
        .bind(address.validation_status.as_str())
        .bind(format_ts(&address.updated_at))
        .bind(&address.id)
        .bind(retired_token)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::NotFound(format!(
                "Address {} with token {}",
                address.id, retired_token
            )));
        }

        tx.commit().await?;
        Ok(())
    }
}

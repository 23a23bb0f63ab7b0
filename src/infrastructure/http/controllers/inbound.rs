use crate::application::services::validation_service::ValidationDispatch;
use crate::domain::entities::{
    AmazonPollingHealth, ConnectionStatus, InboundAddress, InboundConnection, Marketplace,
    OverallHealth,
};
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound callers may request for a health evaluation
const MAX_HEALTH_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
pub struct EnsureConnectionRequest {
    pub tenant_id: String,
    pub marketplace: String,
    pub countries: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    #[serde(flatten)]
    pub connection: InboundConnection,
    pub addresses: Vec<InboundAddress>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidationEmailRequest {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualConfigurationRequest {
    pub configured_by: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidationFailureRequest {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessageRequest {
    pub recipient: String,
    pub subject: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

async fn connection_response(
    state: &AppState,
    connection: InboundConnection,
) -> ApiResult<ConnectionResponse> {
    let addresses = state.provisioner.list_addresses(&connection.id).await?;
    Ok(ConnectionResponse {
        connection,
        addresses,
    })
}

/// Create or extend the inbound connection for a tenant
pub async fn ensure_connection(
    State(state): State<AppState>,
    Json(request): Json<EnsureConnectionRequest>,
) -> ApiResult<Json<ConnectionResponse>> {
    let marketplace: Marketplace = request.marketplace.parse()?;
    if request.countries.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one country is required".to_string(),
        ));
    }

    let connection = state
        .provisioner
        .ensure_connection(&request.tenant_id, marketplace, &request.countries)
        .await?;

    Ok(Json(connection_response(&state, connection).await?))
}

pub async fn get_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> ApiResult<Json<ConnectionResponse>> {
    let connection = state.provisioner.get_connection(&connection_id).await?;
    Ok(Json(connection_response(&state, connection).await?))
}

pub async fn list_tenant_connections(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Vec<InboundConnection>>> {
    Ok(Json(
        state.provisioner.list_tenant_connections(&tenant_id).await?,
    ))
}

pub async fn update_connection_status(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<InboundConnection>> {
    let status: ConnectionStatus = request.status.parse()?;
    let connection = state
        .provisioner
        .set_connection_status(&connection_id, status)
        .await?;
    Ok(Json(connection))
}

/// Aggregate health of a connection. `timeout_ms` bounds the evaluation;
/// signals still pending when it elapses come back as placeholders.
pub async fn get_connection_health(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Query(query): Query<HealthQuery>,
) -> ApiResult<Json<OverallHealth>> {
    let health = match query.timeout_ms {
        Some(ms) => {
            let timeout = Duration::from_millis(ms.min(MAX_HEALTH_TIMEOUT_MS));
            state
                .health_reducer
                .reduce_with(&connection_id, timeout, CancellationToken::new())
                .await?
        }
        None => state.health_reducer.reduce(&connection_id).await?,
    };
    Ok(Json(health))
}

pub async fn get_amazon_polling_health(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> ApiResult<Json<AmazonPollingHealth>> {
    Ok(Json(
        state.polling_classifier.classify(&connection_id).await?,
    ))
}

pub async fn send_validation_email(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    request: Option<Json<ValidationEmailRequest>>,
) -> ApiResult<(StatusCode, Json<ValidationDispatch>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let dispatch = state
        .validation_service
        .send_validation_email(&connection_id, request.country.as_deref())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(dispatch)))
}

pub async fn regenerate_token(
    State(state): State<AppState>,
    Path(address_id): Path<String>,
) -> ApiResult<Json<InboundAddress>> {
    Ok(Json(
        state.validation_service.regenerate_token(&address_id).await?,
    ))
}

pub async fn mark_manually_configured(
    State(state): State<AppState>,
    Path(address_id): Path<String>,
    Json(request): Json<ManualConfigurationRequest>,
) -> ApiResult<Json<InboundAddress>> {
    let address = state
        .validation_service
        .mark_manually_configured(&address_id, &request.configured_by, request.note)
        .await?;
    Ok(Json(address))
}

pub async fn mark_validation_failed(
    State(state): State<AppState>,
    Path(address_id): Path<String>,
    Json(request): Json<ValidationFailureRequest>,
) -> ApiResult<Json<InboundAddress>> {
    let address = state
        .validation_service
        .mark_validation_failed(&address_id, &request.error)
        .await?;
    Ok(Json(address))
}

/// Called by the inbound mail pipeline for every accepted message
pub async fn record_inbound_message(
    State(state): State<AppState>,
    Json(request): Json<InboundMessageRequest>,
) -> ApiResult<Json<InboundAddress>> {
    let received_at = request.received_at.unwrap_or_else(Utc::now);
    let address = state
        .validation_service
        .record_inbound_message(&request.recipient, request.subject.as_deref(), received_at)
        .await?;
    Ok(Json(address))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

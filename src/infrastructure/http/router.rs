use crate::infrastructure::http::controllers::inbound;
use crate::infrastructure::http::middleware::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn build_router(state: AppState) -> Router {
    let connections = Router::new()
        .route("/api/inbound/connections", post(inbound::ensure_connection))
        .route("/api/inbound/connections/:id", get(inbound::get_connection))
        .route(
            "/api/inbound/connections/:id/status",
            patch(inbound::update_connection_status),
        )
        .route(
            "/api/tenants/:tenant_id/inbound/connections",
            get(inbound::list_tenant_connections),
        );

    let health = Router::new()
        .route(
            "/api/inbound/connections/:id/health",
            get(inbound::get_connection_health),
        )
        .route(
            "/api/inbound/connections/:id/amazon-polling",
            get(inbound::get_amazon_polling_health),
        );

    // Address lifecycle and the inbound pipeline callback
    let addresses = Router::new()
        .route(
            "/api/inbound/connections/:id/validation-email",
            post(inbound::send_validation_email),
        )
        .route(
            "/api/inbound/addresses/:id/regenerate-token",
            post(inbound::regenerate_token),
        )
        .route(
            "/api/inbound/addresses/:id/manual-configuration",
            post(inbound::mark_manually_configured),
        )
        .route(
            "/api/inbound/addresses/:id/validation-failure",
            post(inbound::mark_validation_failed),
        )
        .route("/api/inbound/messages", post(inbound::record_inbound_message));

    Router::new()
        .route("/healthz", get(inbound::liveness))
        .merge(connections)
        .merge(health)
        .merge(addresses)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

use inbound_health::bootstrap;
use inbound_health::config::Config;
use inbound_health::infrastructure::http::router::build_router;
use inbound_health::infrastructure::observability;
use inbound_health::infrastructure::persistence::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Tracing, optional OTLP export and the Prometheus listener
    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    db.run_migrations().await?;
    tracing::info!("Database migrations applied");

    let state = bootstrap::build_app_state(db, &config).await?;

    let app = build_router(state);

    let addr = config.server_address();
    tracing::info!(
        "listening on {} (inbound domain {})",
        addr,
        config.inbound_domain
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use crate::application::services::*;
use crate::config::Config;
use crate::domain::ports::dns_resolver::TxtResolver;
use crate::domain::ports::inbound_repository::InboundRepository;
use crate::domain::ports::oauth_repository::OAuthRepository;
use crate::domain::ports::policy_fetcher::PolicyFetcher;
use crate::domain::ports::polling_job_repository::PollingJobRepository;
use crate::domain::ports::store_health::StoreHealth;
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::time_service::TimeService;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{HickoryTxtResolver, HttpPolicyFetcher};
use crate::infrastructure::runtime::SystemTimeService;
use crate::infrastructure::workers::SqlTaskQueue;
use std::sync::Arc;

pub async fn build_app_state(
    db: Database,
    config: &Config,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let time: Arc<dyn TimeService> = Arc::new(SystemTimeService::new());
    let inbound_repo: Arc<dyn InboundRepository> = Arc::new(db.clone());

    // Outbound adapters for the DNS and HTTPS probes
    let resolver: Arc<dyn TxtResolver> =
        Arc::new(HickoryTxtResolver::from_system_conf(config.probe_timeout()));
    let fetcher: Arc<dyn PolicyFetcher> = Arc::new(HttpPolicyFetcher::new(config.probe_timeout())?);
    tracing::info!(
        "Probe adapters initialized (timeout {:?})",
        config.probe_timeout()
    );

    let queue: Arc<dyn TaskQueue> = Arc::new(SqlTaskQueue::new(db.clone(), time.clone()));

    let provisioner =
        AddressProvisioner::new(inbound_repo.clone(), time.clone(), &config.inbound_domain);

    let validation_service = ValidationService::new(
        inbound_repo.clone(),
        queue,
        time.clone(),
        provisioner.clone(),
    );

    let probes = SignalProbes::new(
        resolver,
        fetcher,
        inbound_repo.clone(),
        Arc::new(db.clone()) as Arc<dyn StoreHealth>,
        time.clone(),
        ProbeConfig {
            inbound_domain: config.inbound_domain.clone(),
            dkim_selector: config.dkim_selector.clone(),
            timeout: config.probe_timeout(),
        },
    );

    let polling_classifier = AmazonPollingClassifier::new(
        inbound_repo.clone(),
        Arc::new(db.clone()) as Arc<dyn OAuthRepository>,
        Arc::new(db.clone()) as Arc<dyn PollingJobRepository>,
        time.clone(),
        PollingClassifierConfig {
            job_type: config.amazon_poll_job_type.clone(),
            mock_mode: config.amazon_mock_mode,
        },
    );
    if config.amazon_mock_mode {
        tracing::warn!("Amazon mock mode enabled; polling health will never report OK");
    }

    let health_reducer = HealthReducer::new(
        probes,
        polling_classifier.clone(),
        inbound_repo,
        time,
        config.health_timeout(),
    );

    Ok(AppState {
        provisioner,
        validation_service,
        polling_classifier,
        health_reducer,
    })
}

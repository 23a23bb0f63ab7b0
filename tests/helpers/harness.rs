use super::fakes::*;
use super::test_db::TestDatabase;
use inbound_health::application::services::*;
use inbound_health::domain::ports::dns_resolver::TxtResolver;
use inbound_health::domain::ports::inbound_repository::InboundRepository;
use inbound_health::domain::ports::oauth_repository::OAuthRepository;
use inbound_health::domain::ports::policy_fetcher::PolicyFetcher;
use inbound_health::domain::ports::polling_job_repository::PollingJobRepository;
use inbound_health::domain::ports::store_health::StoreHealth;
use inbound_health::domain::ports::task_queue::TaskQueue;
use inbound_health::domain::ports::time_service::TimeService;
use inbound_health::infrastructure::persistence::Database;
use inbound_health::infrastructure::workers::SqlTaskQueue;
use std::sync::Arc;
use std::time::Duration;

pub struct HarnessOptions {
    pub mock_mode: bool,
    pub resolver: Arc<dyn TxtResolver>,
    pub fetcher: Arc<dyn PolicyFetcher>,
    /// Defaults to the test database itself
    pub store: Option<Arc<dyn StoreHealth>>,
    /// Defaults to the SQL queue on the test database
    pub queue: Option<Arc<dyn TaskQueue>>,
    pub probe_timeout: Duration,
    pub health_timeout: Duration,
    /// Route repository reads through a [`SlowInboundRepository`] with this delay
    pub inbound_delay: Option<Duration>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            mock_mode: false,
            resolver: Arc::new(StaticTxtResolver::healthy()),
            fetcher: Arc::new(StaticPolicyFetcher::healthy()),
            store: None,
            queue: None,
            probe_timeout: Duration::from_secs(5),
            health_timeout: Duration::from_secs(5),
            inbound_delay: None,
        }
    }
}

/// Every service wired the way bootstrap does, over fakes and a fresh database
pub struct Harness {
    pub test_db: TestDatabase,
    pub clock: Arc<FixedClock>,
    pub provisioner: AddressProvisioner,
    pub validation: ValidationService,
    pub classifier: AmazonPollingClassifier,
    pub reducer: HealthReducer,
    /// Present when `inbound_delay` was set; arm it once setup is done
    pub slow_repo: Option<Arc<SlowInboundRepository>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(HarnessOptions::default()).await
    }

    pub async fn with(options: HarnessOptions) -> Self {
        let test_db = TestDatabase::new().await;
        let db = test_db.db();
        let clock = Arc::new(FixedClock::at(base_time()));
        let time: Arc<dyn TimeService> = clock.clone();
        let slow_repo = options.inbound_delay.map(|delay| {
            Arc::new(SlowInboundRepository::new(
                Arc::new(db.clone()) as Arc<dyn InboundRepository>,
                delay,
            ))
        });
        let repo: Arc<dyn InboundRepository> = match &slow_repo {
            Some(slow) => slow.clone() as Arc<dyn InboundRepository>,
            None => Arc::new(db.clone()) as Arc<dyn InboundRepository>,
        };

        let queue = options
            .queue
            .unwrap_or_else(|| Arc::new(SqlTaskQueue::new(db.clone(), time.clone())) as Arc<dyn TaskQueue>);
        let store = options
            .store
            .unwrap_or_else(|| Arc::new(db.clone()) as Arc<dyn StoreHealth>);

        let provisioner = AddressProvisioner::new(repo.clone(), time.clone(), INBOUND_DOMAIN);
        let validation =
            ValidationService::new(repo.clone(), queue, time.clone(), provisioner.clone());

        let probes = SignalProbes::new(
            options.resolver,
            options.fetcher,
            repo.clone(),
            store,
            time.clone(),
            ProbeConfig {
                inbound_domain: INBOUND_DOMAIN.to_string(),
                dkim_selector: "inbound".to_string(),
                timeout: options.probe_timeout,
            },
        );

        let classifier = AmazonPollingClassifier::new(
            repo.clone(),
            Arc::new(db.clone()) as Arc<dyn OAuthRepository>,
            Arc::new(db.clone()) as Arc<dyn PollingJobRepository>,
            time.clone(),
            PollingClassifierConfig {
                job_type: POLL_JOB_TYPE.to_string(),
                mock_mode: options.mock_mode,
            },
        );

        let reducer = HealthReducer::new(
            probes,
            classifier.clone(),
            repo,
            time,
            options.health_timeout,
        );

        Self {
            test_db,
            clock,
            provisioner,
            validation,
            classifier,
            reducer,
            slow_repo,
        }
    }

    /// Start delaying address reads from here on
    pub fn stall_address_reads(&self) {
        if let Some(slow) = &self.slow_repo {
            slow.arm();
        }
    }

    pub fn db(&self) -> Database {
        self.test_db.db()
    }
}

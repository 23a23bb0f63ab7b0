use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use inbound_health::domain::entities::{InboundAddress, InboundConnection, Marketplace};
use inbound_health::domain::errors::{DomainError, DomainResult};
use inbound_health::domain::ports::dns_resolver::TxtResolver;
use inbound_health::domain::ports::inbound_repository::InboundRepository;
use inbound_health::domain::ports::policy_fetcher::{FetchedDocument, PolicyFetcher};
use inbound_health::domain::ports::store_health::StoreHealth;
use inbound_health::domain::ports::time_service::TimeService;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const INBOUND_DOMAIN: &str = "inbound.test";
pub const POLL_JOB_TYPE: &str = "amazon_orders_poll";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Clock that only moves when told to
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl TimeService for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Canned TXT answers by name; unknown names have no records
#[derive(Default)]
pub struct StaticTxtResolver {
    records: HashMap<String, DomainResult<Vec<String>>>,
    delay: Option<std::time::Duration>,
}

impl StaticTxtResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid DKIM and MTA-STS records for the test inbound domain
    pub fn healthy() -> Self {
        Self::new()
            .with_record(
                &format!("inbound._domainkey.{}", INBOUND_DOMAIN),
                "v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQC",
            )
            .with_record(
                &format!("_mta-sts.{}", INBOUND_DOMAIN),
                "v=STSv1; id=20240601T000000",
            )
    }

    pub fn with_record(mut self, name: &str, record: &str) -> Self {
        self.records
            .insert(name.to_string(), Ok(vec![record.to_string()]));
        self
    }

    pub fn with_error(mut self, name: &str, error: DomainError) -> Self {
        self.records.insert(name.to_string(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TxtResolver for StaticTxtResolver {
    async fn lookup_txt(&self, name: &str) -> DomainResult<Vec<String>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.records
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(DomainError::NotFound(format!("No TXT records for {}", name))))
    }
}

pub struct StaticPolicyFetcher {
    response: DomainResult<FetchedDocument>,
    delay: Option<std::time::Duration>,
}

impl StaticPolicyFetcher {
    pub fn healthy() -> Self {
        Self::returning(
            200,
            "version: STSv1\nmode: enforce\nmx: mx.inbound.test\nmax_age: 86400\n",
        )
    }

    pub fn returning(status: u16, body: &str) -> Self {
        Self {
            response: Ok(FetchedDocument {
                status,
                body: body.to_string(),
            }),
            delay: None,
        }
    }

    pub fn failing(error: DomainError) -> Self {
        Self {
            response: Err(error),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl PolicyFetcher for StaticPolicyFetcher {
    async fn fetch(&self, _url: &str) -> DomainResult<FetchedDocument> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}

/// Store that answers after `delay`, or fails outright
pub struct SlowStore {
    pub delay: std::time::Duration,
    pub fail: bool,
}

#[async_trait]
impl StoreHealth for SlowStore {
    async fn ping(&self) -> DomainResult<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(DomainError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Queue that rejects every submission
pub struct FailingTaskQueue;

#[async_trait]
impl inbound_health::domain::ports::task_queue::TaskQueue for FailingTaskQueue {
    async fn enqueue(
        &self,
        _job_type: &str,
        _tenant_id: &str,
        _payload: serde_json::Value,
        _max_attempts: i32,
    ) -> DomainResult<String> {
        Err(DomainError::Unreachable("queue offline".to_string()))
    }
}

/// Delegates to a real repository, but once armed the address reads used by
/// health evaluation answer only after `delay`
pub struct SlowInboundRepository {
    inner: Arc<dyn InboundRepository>,
    delay: std::time::Duration,
    armed: AtomicBool,
}

impl SlowInboundRepository {
    pub fn new(inner: Arc<dyn InboundRepository>, delay: std::time::Duration) -> Self {
        Self {
            inner,
            delay,
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn stall(&self) {
        if self.armed.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl InboundRepository for SlowInboundRepository {
    async fn get_connection(&self, connection_id: &str) -> DomainResult<Option<InboundConnection>> {
        self.inner.get_connection(connection_id).await
    }

    async fn find_connection(
        &self,
        tenant_id: &str,
        marketplace: Marketplace,
    ) -> DomainResult<Option<InboundConnection>> {
        self.inner.find_connection(tenant_id, marketplace).await
    }

    async fn list_tenant_connections(&self, tenant_id: &str) -> DomainResult<Vec<InboundConnection>> {
        self.inner.list_tenant_connections(tenant_id).await
    }

    async fn create_connection(&self, connection: &InboundConnection) -> DomainResult<()> {
        self.inner.create_connection(connection).await
    }

    async fn update_connection(&self, connection: &InboundConnection) -> DomainResult<()> {
        self.inner.update_connection(connection).await
    }

    async fn list_addresses(&self, connection_id: &str) -> DomainResult<Vec<InboundAddress>> {
        self.stall().await;
        self.inner.list_addresses(connection_id).await
    }

    async fn get_address(&self, address_id: &str) -> DomainResult<Option<InboundAddress>> {
        self.inner.get_address(address_id).await
    }

    async fn find_address_by_token(&self, token: &str) -> DomainResult<Option<InboundAddress>> {
        self.inner.find_address_by_token(token).await
    }

    async fn latest_updated_address(
        &self,
        connection_id: &str,
    ) -> DomainResult<Option<InboundAddress>> {
        self.stall().await;
        self.inner.latest_updated_address(connection_id).await
    }

    async fn create_address(&self, address: &InboundAddress) -> DomainResult<()> {
        self.inner.create_address(address).await
    }

    async fn update_address(&self, address: &InboundAddress) -> DomainResult<()> {
        self.inner.update_address(address).await
    }

    async fn token_exists(&self, token: &str) -> DomainResult<bool> {
        self.inner.token_exists(token).await
    }

    async fn is_token_retired(&self, token: &str) -> DomainResult<bool> {
        self.inner.is_token_retired(token).await
    }

    async fn rotate_token(&self, address: &InboundAddress, retired_token: &str) -> DomainResult<()> {
        self.inner.rotate_token(address, retired_token).await
    }
}

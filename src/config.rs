use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub inbound_domain: String,
    pub dkim_selector: String,
    pub probe_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub amazon_mock_mode: bool,
    pub amazon_poll_job_type: String,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(name)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://inbound.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let inbound_domain = env::var("INBOUND_DOMAIN")
            .map_err(|_| ConfigError::MissingInboundDomain)?
            .trim()
            .to_ascii_lowercase();
        if inbound_domain.is_empty() || inbound_domain.contains('@') {
            return Err(ConfigError::MissingInboundDomain);
        }

        let dkim_selector = env::var("DKIM_SELECTOR").unwrap_or_else(|_| "inbound".to_string());

        let probe_timeout_secs = env::var("PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout("PROBE_TIMEOUT_SECS"))?;

        let health_timeout_secs = env::var("HEALTH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout("HEALTH_TIMEOUT_SECS"))?;

        let amazon_mock_mode = match env::var("AMAZON_MOCK_MODE") {
            Ok(raw) => parse_bool("AMAZON_MOCK_MODE", &raw)?,
            Err(_) => false,
        };

        let amazon_poll_job_type = env::var("AMAZON_POLL_JOB_TYPE")
            .unwrap_or_else(|_| "amazon_orders_poll".to_string());

        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "inbound-health".to_string());

        let metrics_port = env::var("METRICS_PORT")
            .unwrap_or_else(|_| "9000".to_string())
            .parse()
            .unwrap_or(9000);

        Ok(Config {
            database_url,
            server_host,
            server_port,
            inbound_domain,
            dkim_selector,
            probe_timeout_secs,
            health_timeout_secs,
            amazon_mock_mode,
            amazon_poll_job_type,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("INBOUND_DOMAIN environment variable not set or invalid")]
    MissingInboundDomain,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid timeout in {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid boolean in {0}")]
    InvalidBool(&'static str),
}

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::dns_resolver::TxtResolver;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

/// TXT lookups through hickory's tokio resolver
#[derive(Clone)]
pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    /// Use the host's resolver configuration, falling back to public
    /// resolvers when it cannot be read.
    pub fn from_system_conf(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                tracing::warn!("Failed to read system DNS config, using defaults: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

fn map_resolve_error(name: &str, err: ResolveError) -> DomainError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => {
            DomainError::NotFound(format!("No TXT records at {}", name))
        }
        ResolveErrorKind::Timeout => DomainError::Timeout(format!("TXT lookup for {}", name)),
        _ => DomainError::Unreachable(format!("TXT lookup for {} failed: {}", name, err)),
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> DomainResult<Vec<String>> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| map_resolve_error(name, e))?;

        let records: Vec<String> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|fragment| String::from_utf8_lossy(fragment))
                    .collect::<String>()
            })
            .collect();

        if records.is_empty() {
            return Err(DomainError::NotFound(format!("No TXT records at {}", name)));
        }

        tracing::debug!("Resolved {} TXT record(s) at {}", records.len(), name);
        Ok(records)
    }
}

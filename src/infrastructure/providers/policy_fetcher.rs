use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::policy_fetcher::{FetchedDocument, PolicyFetcher};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Policy documents are a few hundred bytes; anything past this is never read
pub const MAX_BODY_BYTES: usize = 64 * 1024;

fn transport_error(what: &str, url: &str, e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::Timeout(format!("{} {}: {}", what, url, e))
    } else {
        DomainError::Unreachable(format!("{} {}: {}", what, url, e))
    }
}

/// Append up to the cap; true once the buffer is full
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8]) -> bool {
    let room = MAX_BODY_BYTES.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() >= MAX_BODY_BYTES
}

/// Drops a code point split by the cap; other invalid bytes are replaced
fn decode_body(buf: &[u8]) -> String {
    match std::str::from_utf8(buf) {
        Ok(body) => body.to_string(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&buf[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(buf).into_owned(),
    }
}

pub struct HttpPolicyFetcher {
    http_client: Client,
}

impl HttpPolicyFetcher {
    pub fn new(timeout: Duration) -> DomainResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DomainError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl PolicyFetcher for HttpPolicyFetcher {
    async fn fetch(&self, url: &str) -> DomainResult<FetchedDocument> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("GET", url, e))?;

        let status = response.status().as_u16();
        let mut buf = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error("Reading body of", url, e))?
        {
            if append_capped(&mut buf, &chunk) {
                tracing::debug!("Body of {} cut off at {} bytes", url, MAX_BODY_BYTES);
                break;
            }
        }
        let body = decode_body(&buf);

        tracing::debug!("GET {} returned HTTP {}", url, status);
        Ok(FetchedDocument { status, body })
    }
}

//! Retry, backoff, and error classification shared by upload and retrieval.
//!
//! Every remote failure is classified into a [`RemoteError`] kind before any
//! retry decision is made. Only transient network failures are retried, with
//! exponential backoff (`base_delay * 2^attempt`). Authentication,
//! authorization, and TLS failures are fatal: they are surfaced immediately
//! and halt further upload rounds in the current pass. Call sites match on
//! the kind, never on transport-library internals.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

/// Classified remote failure.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("authentication failed (401): check your API token")]
    Auth,

    #[error("access forbidden (403): the API token lacks permission")]
    Forbidden,

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Fatal errors halt further upload rounds and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth | Self::Forbidden | Self::Tls(_))
    }

    /// Only transient network failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Classify an HTTP response status together with the body text the server
/// returned alongside it.
pub fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth,
        StatusCode::FORBIDDEN => RemoteError::Forbidden,
        s if s.is_server_error() => {
            RemoteError::Network(format!("server error {}: {}", s, body.trim()))
        }
        s => RemoteError::Other(format!("unexpected response {}: {}", s, body.trim())),
    }
}

/// Classify a transport-level failure from the HTTP client.
pub fn classify_transport(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::Network("request timed out".to_string());
    }
    classify_transport_detail(err.is_connect(), source_chain(err))
}

/// Classify by the flattened source chain. TLS handshake failures surface
/// as connect errors, so the certificate check runs first.
fn classify_transport_detail(is_connect: bool, detail: String) -> RemoteError {
    if detail.contains("certificate") || detail.contains("UnknownIssuer") {
        return RemoteError::Tls(detail);
    }
    if is_connect || detail.contains("dns error") {
        return RemoteError::Network(detail);
    }
    RemoteError::Other(detail)
}

/// Flatten the error and its sources into one diagnosable string.
fn source_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Run `op` up to `max_attempts` times, backing off exponentially between
/// retryable failures. Non-retryable failures are surfaced immediately.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    error = %e,
                    "remote operation failed"
                );
                return Err(e);
            }
        }
    }
}

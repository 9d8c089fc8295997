// crates/lookup-gate-providers/src/http.rs
// ============================================================================
// Module: Provider HTTP Transport
// Description: Bounded HTTP GET transport for the external lookup provider.
// Purpose: Issue single provider attempts with timeouts and size limits.
// Dependencies: async-trait, reqwest, thiserror, url
// ============================================================================

//! ## Overview
//! [`HttpTransport`] issues one GET per call. It enforces the scheme policy,
//! a per-attempt timeout, a connect timeout, disabled redirects, and a
//! response size limit. It never retries; retry decisions belong to the
//! client that owns the [`crate::retry::RetrySchedule`].
//! Security posture: provider responses are untrusted and size-bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_response_bytes: 1024 * 1024,
            user_agent: "lookup-gate/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Transport Contract
// ============================================================================

/// Raw provider response for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, bounded by the transport limit.
    pub body: Vec<u8>,
    /// Content type header, when present.
    pub content_type: Option<String>,
}

/// Transport failures for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Attempt exceeded its timeout.
    #[error("provider request timed out")]
    Timeout,
    /// Connection could not be established.
    #[error("provider connection failed: {0}")]
    Connect(String),
    /// Connection failed mid-exchange.
    #[error("provider i/o failed: {0}")]
    Io(String),
    /// Body ended before the declared length.
    #[error("provider response truncated")]
    Truncated,
    /// Body exceeded the size limit.
    #[error("provider response exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured limit.
        limit: usize,
    },
    /// Request could not be built or violates policy; nothing was sent.
    #[error("provider request rejected before sending: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns true when another attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Io(_) | Self::Truncated)
    }
}

/// Single-attempt transport to the provider.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Issues one GET request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no complete response was received.
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// SECTION: Reqwest Transport
// ============================================================================

/// Reqwest-backed provider transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Transport configuration, including limits and policy.
    config: HttpTransportConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpTransport {
    /// Creates a new transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] when the client cannot be built.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| TransportError::InvalidRequest("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportError> {
        validate_url(url, self.config.allow_http)?;
        let response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_send_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = read_response_limited(response, self.config.max_response_bytes).await?;
        Ok(TransportResponse {
            status,
            body,
            content_type,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates URL scheme and rejects embedded credentials.
///
/// # Errors
///
/// Returns [`TransportError::InvalidRequest`] when the URL violates policy.
pub fn validate_url(url: &Url, allow_http: bool) -> Result<(), TransportError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        _ => return Err(TransportError::InvalidRequest("unsupported url scheme".to_string())),
    }
    if url.host_str().is_none() {
        return Err(TransportError::InvalidRequest("url host required".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(TransportError::InvalidRequest("url must not embed credentials".to_string()));
    }
    Ok(())
}

/// Maps reqwest send failures onto transport errors.
fn map_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(redacted_error(&err))
    } else if err.is_builder() {
        TransportError::InvalidRequest(redacted_error(&err))
    } else {
        TransportError::Io(redacted_error(&err))
    }
}

/// Renders a reqwest error without the request URL.
fn redacted_error(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    if let Some(url) = err.url() {
        text = text.replace(url.as_str(), "<provider>");
    }
    text
}

/// Reads the response body while enforcing a byte limit.
async fn read_response_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| {
        TransportError::InvalidRequest("response size limit exceeds u64".to_string())
    })?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(TransportError::BodyTooLarge {
            limit: max_bytes,
        });
    }
    let mut buf = Vec::new();
    loop {
        let chunk = response.chunk().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Io(redacted_error(&err))
            }
        })?;
        let Some(chunk) = chunk else {
            break;
        };
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(TransportError::BodyTooLarge {
                limit: max_bytes,
            });
        }
        buf.extend_from_slice(&chunk);
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected)
            .map_err(|_| TransportError::Io("invalid response length".to_string()))?;
        if buf.len() < expected {
            return Err(TransportError::Truncated);
        }
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

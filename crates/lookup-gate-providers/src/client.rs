// crates/lookup-gate-providers/src/client.rs
// ============================================================================
// Module: Provider Client
// Description: Resilient lookup client for the external OSINT provider.
// Purpose: Turn lookup calls into bounded, classified, retried HTTP attempts.
// Dependencies: async-trait, lookup-gate-core, serde_json, url
// ============================================================================

//! ## Overview
//! [`ProviderClient`] implements [`LookupProvider`]. Each call builds the
//! kind's endpoint, then drives a [`RetrySchedule`]: transient failures
//! (timeouts, connection errors, 408, 429, and 5xx) back off and retry while
//! the budget lasts, definitive answers end the call at once.
//! Security posture: the API key is never logged; endpoints are redacted
//! before they reach observers or error details.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lookup_gate_core::LookupKind;
use lookup_gate_core::LookupProvider;
use lookup_gate_core::ProviderFailure;
use lookup_gate_core::ProviderResponse;
use serde_json::Value;
use url::Url;

use crate::http::HttpTransport;
use crate::http::HttpTransportConfig;
use crate::http::ProviderTransport;
use crate::http::TransportError;
use crate::http::TransportResponse;
use crate::observe::AttemptObserver;
use crate::observe::AttemptOutcome;
use crate::observe::AttemptRecord;
use crate::observe::TracingObserver;
use crate::retry::JitterSource;
use crate::retry::RandomJitter;
use crate::retry::RetryPolicy;
use crate::retry::RetrySchedule;
use crate::retry::RetryStep;
use crate::retry::Sleeper;
use crate::retry::TokioSleeper;
use crate::routes::DEFAULT_KEY_PARAM;
use crate::routes::ProviderRoutes;
use crate::routes::build_endpoint;
use crate::routes::redact_endpoint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of a rejection body carried into error details.
const MAX_DETAIL_CHARS: usize = 200;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Provider client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderClientConfig {
    /// Provider base URL.
    pub base_url: Url,
    /// API key, sent as a query parameter when present.
    pub api_key: Option<String>,
    /// Query parameter carrying the API key.
    pub key_param: String,
    /// Per-kind routes.
    pub routes: ProviderRoutes,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl ProviderClientConfig {
    /// Creates a configuration with default routes and retry policy.
    #[must_use]
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            key_param: DEFAULT_KEY_PARAM.to_string(),
            routes: ProviderRoutes::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for ProviderClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("key_param", &self.key_param)
            .field("routes", &self.routes)
            .field("retry", &self.retry)
            .finish()
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Lookup provider backed by an HTTP transport with retries.
#[derive(Clone)]
pub struct ProviderClient {
    /// Client configuration.
    config: ProviderClientConfig,
    /// Single-attempt transport.
    transport: Arc<dyn ProviderTransport>,
    /// Backoff sleeper.
    sleeper: Arc<dyn Sleeper>,
    /// Backoff jitter.
    jitter: Arc<dyn JitterSource>,
    /// Attempt observer.
    observer: Arc<dyn AttemptObserver>,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ProviderClient {
    /// Creates a client over an explicit transport.
    #[must_use]
    pub fn new(config: ProviderClientConfig, transport: Arc<dyn ProviderTransport>) -> Self {
        Self {
            config,
            transport,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Creates a client over the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be built.
    pub fn from_http(
        config: ProviderClientConfig,
        http: HttpTransportConfig,
    ) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(http)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Replaces the backoff sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the jitter source.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the attempt observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderClientConfig {
        &self.config
    }

    /// Builds the endpoint for a lookup.
    fn endpoint(&self, kind: LookupKind, query: &str) -> Result<Url, ProviderFailure> {
        build_endpoint(
            &self.config.base_url,
            self.config.routes.route(kind),
            &self.config.key_param,
            self.config.api_key.as_deref(),
            query,
        )
        .map_err(ProviderFailure::Misconfigured)
    }
}

#[async_trait]
impl LookupProvider for ProviderClient {
    async fn call(
        &self,
        kind: LookupKind,
        query: &str,
    ) -> Result<ProviderResponse, ProviderFailure> {
        let endpoint = self.endpoint(kind, query)?;
        let shown = redact_endpoint(&endpoint, &self.config.key_param);
        let mut schedule = RetrySchedule::new(self.config.retry);
        let mut last_detail = String::from("no attempt made");
        while let Some(attempt) = schedule.begin() {
            let started = Instant::now();
            let result = self.transport.get(&endpoint).await;
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let verdict = classify_attempt(result, attempt);
            self.observer.observe(&AttemptRecord {
                kind,
                attempt,
                endpoint: shown.clone(),
                elapsed_ms,
                outcome: verdict.outcome(),
            });
            match verdict {
                AttemptVerdict::Success(response) => {
                    schedule.finish();
                    return Ok(response);
                }
                AttemptVerdict::Terminal(failure) => {
                    schedule.finish();
                    return Err(failure);
                }
                AttemptVerdict::Transient(detail) => {
                    last_detail = detail;
                    match schedule.fail_transient(self.jitter.as_ref()) {
                        RetryStep::Retry {
                            delay, ..
                        } => self.sleeper.sleep(delay).await,
                        RetryStep::GiveUp {
                            attempts,
                        } => {
                            return Err(ProviderFailure::Unavailable {
                                attempts,
                                detail: last_detail,
                            });
                        }
                    }
                }
            }
        }
        Err(ProviderFailure::Unavailable {
            attempts: schedule.attempts(),
            detail: last_detail,
        })
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classified attempt.
#[derive(Debug)]
enum AttemptVerdict {
    /// Usable response.
    Success(ProviderResponse),
    /// Retry-eligible failure detail.
    Transient(String),
    /// Call-ending failure.
    Terminal(ProviderFailure),
}

impl AttemptVerdict {
    /// Returns the observer outcome for this verdict.
    fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Success(response) => AttemptOutcome::Success {
                status: response.status,
            },
            Self::Transient(detail) => AttemptOutcome::Transient {
                detail: detail.clone(),
            },
            Self::Terminal(failure) => AttemptOutcome::Terminal {
                detail: failure.to_string(),
            },
        }
    }
}

/// Classifies one transport result.
fn classify_attempt(
    result: Result<TransportResponse, TransportError>,
    attempt: u32,
) -> AttemptVerdict {
    let response = match result {
        Ok(response) => response,
        Err(err) if err.is_transient() => return AttemptVerdict::Transient(err.to_string()),
        Err(TransportError::InvalidRequest(detail)) => {
            return AttemptVerdict::Terminal(ProviderFailure::Misconfigured(detail));
        }
        Err(err) => {
            return AttemptVerdict::Terminal(ProviderFailure::Malformed {
                attempts: attempt,
                detail: err.to_string(),
            });
        }
    };
    let status = response.status;
    match status {
        200 ..= 299 => match serde_json::from_slice::<Value>(&response.body) {
            Ok(payload) => AttemptVerdict::Success(ProviderResponse {
                payload,
                status,
                attempts: attempt,
            }),
            Err(err) => AttemptVerdict::Terminal(ProviderFailure::Malformed {
                attempts: attempt,
                detail: format!("response is not valid json: {err}"),
            }),
        },
        401 | 403 => AttemptVerdict::Terminal(ProviderFailure::Unauthorized {
            attempts: attempt,
            status,
        }),
        408 | 429 | 500 ..= 599 => {
            AttemptVerdict::Transient(format!("provider returned status {status}"))
        }
        400 ..= 499 => AttemptVerdict::Terminal(ProviderFailure::Rejected {
            attempts: attempt,
            status,
            detail: body_snippet(&response.body),
        }),
        _ => AttemptVerdict::Terminal(ProviderFailure::Malformed {
            attempts: attempt,
            detail: format!("unexpected status {status}"),
        }),
    }
}

/// Returns a bounded, single-line excerpt of a response body.
fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    line.chars().take(MAX_DETAIL_CHARS).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/lookup-gate-providers/src/lib.rs
// ============================================================================
// Module: Lookup Gate Providers
// Description: HTTP client for the external lookup provider.
// Purpose: Provide the production LookupProvider with retries and limits.
// Dependencies: lookup-gate-core, reqwest, url
// ============================================================================

//! ## Overview
//! This crate ships the provider client used by the gateway. It builds
//! per-kind endpoints, issues bounded HTTP attempts, retries transient
//! failures with exponential backoff and jitter, and classifies every answer
//! into the core [`lookup_gate_core::ProviderFailure`] taxonomy.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod http;
pub mod observe;
pub mod retry;
pub mod routes;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::ProviderClient;
pub use client::ProviderClientConfig;
pub use http::HttpTransport;
pub use http::HttpTransportConfig;
pub use http::ProviderTransport;
pub use http::TransportError;
pub use http::TransportResponse;
pub use observe::AttemptObserver;
pub use observe::AttemptOutcome;
pub use observe::AttemptRecord;
pub use observe::NoopObserver;
pub use observe::TracingObserver;
pub use retry::JitterSource;
pub use retry::NoJitter;
pub use retry::RandomJitter;
pub use retry::RetryPolicy;
pub use retry::RetrySchedule;
pub use retry::RetryState;
pub use retry::RetryStep;
pub use retry::Sleeper;
pub use retry::TokioSleeper;
pub use routes::ProviderRoutes;
pub use routes::RouteSpec;

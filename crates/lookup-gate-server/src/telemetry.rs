// crates/lookup-gate-server/src/telemetry.rs
// ============================================================================
// Module: Telemetry
// Description: tracing subscriber setup for the gateway process.
// Purpose: Route tracing events to stderr as text or JSON lines.
// Dependencies: lookup-gate-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Logging is initialized once per process. `RUST_LOG` takes precedence over
//! `logging.level` so operators can raise verbosity without editing config.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io;

use lookup_gate_config::LogFormat;
use lookup_gate_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::server::ServerError;

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Builds the event filter from `RUST_LOG`, falling back to `level`.
///
/// # Errors
///
/// Returns [`ServerError::Config`] when the chosen directive does not parse.
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter, ServerError> {
    let directive = filter_directive(level, rust_log);
    EnvFilter::try_new(directive)
        .map_err(|err| ServerError::Config(format!("invalid log filter {directive}: {err}")))
}

/// Returns the directive `build_filter` parses.
fn filter_directive<'a>(level: &'a str, rust_log: Option<&'a str>) -> &'a str {
    rust_log.map(str::trim).filter(|value| !value.is_empty()).unwrap_or_else(|| level.trim())
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`ServerError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ServerError> {
    let rust_log = env::var("RUST_LOG").ok();
    let filter = build_filter(&config.level, rust_log.as_deref())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| ServerError::Init(format!("tracing init failed: {err}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

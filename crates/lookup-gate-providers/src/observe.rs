// crates/lookup-gate-providers/src/observe.rs
// ============================================================================
// Module: Provider Attempt Observation
// Description: Per-attempt records emitted by the provider client.
// Purpose: Make every network attempt visible without exposing the API key.
// Dependencies: lookup-gate-core, tracing
// ============================================================================

//! ## Overview
//! The provider client reports each attempt to an [`AttemptObserver`] once the
//! attempt is classified. Records carry the redacted endpoint only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lookup_gate_core::LookupKind;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Provider returned a usable 2xx response.
    Success {
        /// Status returned.
        status: u16,
    },
    /// Failure eligible for another attempt.
    Transient {
        /// Failure detail.
        detail: String,
    },
    /// Failure that ends the call.
    Terminal {
        /// Failure detail.
        detail: String,
    },
}

impl AttemptOutcome {
    /// Returns a stable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success {
                ..
            } => "success",
            Self::Transient {
                ..
            } => "transient",
            Self::Terminal {
                ..
            } => "terminal",
        }
    }
}

/// Record of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Lookup kind.
    pub kind: LookupKind,
    /// Attempt number, starting at one.
    pub attempt: u32,
    /// Endpoint with the API key masked.
    pub endpoint: String,
    /// Wall-clock duration of the attempt.
    pub elapsed_ms: u64,
    /// Classified outcome.
    pub outcome: AttemptOutcome,
}

/// Receives provider attempt records.
pub trait AttemptObserver: Send + Sync {
    /// Observes one attempt.
    fn observe(&self, record: &AttemptRecord);
}

/// Observer that discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn observe(&self, _record: &AttemptRecord) {}
}

/// Observer that emits structured tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn observe(&self, record: &AttemptRecord) {
        match &record.outcome {
            AttemptOutcome::Success {
                status,
            } => debug!(
                kind = record.kind.as_str(),
                attempt = record.attempt,
                endpoint = %record.endpoint,
                elapsed_ms = record.elapsed_ms,
                status = *status,
                "provider attempt succeeded"
            ),
            AttemptOutcome::Transient {
                detail,
            } => warn!(
                kind = record.kind.as_str(),
                attempt = record.attempt,
                endpoint = %record.endpoint,
                elapsed_ms = record.elapsed_ms,
                detail = %detail,
                "provider attempt failed transiently"
            ),
            AttemptOutcome::Terminal {
                detail,
            } => warn!(
                kind = record.kind.as_str(),
                attempt = record.attempt,
                endpoint = %record.endpoint,
                elapsed_ms = record.elapsed_ms,
                detail = %detail,
                "provider attempt failed"
            ),
        }
    }
}

// crates/lookup-gate-core/src/core/audit.rs
// ============================================================================
// Module: Lookup Audit Records
// Description: Append-only audit entries written once per lookup.
// Purpose: Record the terminal outcome of every lookup for accounting and review.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The dispatcher writes exactly one [`AuditEntry`] per request when it
//! reaches a terminal state. Entries carry no query values or provider
//! payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CallerId;
use crate::core::identifiers::RequestId;
use crate::core::lookup::LookupKind;
use crate::core::state::DispatchState;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Terminal outcome classification for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Lookup completed.
    Success,
    /// Admission rejected the lookup.
    Denied,
    /// Lookup failed after receipt.
    Failed,
}

impl AuditOutcome {
    /// Classifies a terminal dispatch state.
    #[must_use]
    pub const fn from_state(state: DispatchState) -> Self {
        match state {
            DispatchState::Rejected(_) => Self::Denied,
            DispatchState::Completed => Self::Success,
            _ => Self::Failed,
        }
    }
}

/// Audit record for one lookup.
///
/// # Invariants
/// - Written once per request, after the request reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Event label.
    pub event: String,
    /// Request identifier.
    pub request_id: RequestId,
    /// Caller identifier.
    pub caller_id: CallerId,
    /// Lookup kind.
    pub kind: LookupKind,
    /// Request receipt time.
    pub timestamp: Timestamp,
    /// Outcome classification.
    pub outcome: AuditOutcome,
    /// Terminal state reached.
    pub state: DispatchState,
    /// Failure or denial reason label.
    pub reason: Option<String>,
    /// Provider attempts performed.
    pub provider_attempts: u32,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the admin override applied.
    pub admin: bool,
    /// Quota units charged and kept.
    pub quota_charged: u32,
    /// Whether a charge was refunded.
    pub quota_refunded: bool,
}

/// Audit event label for lookup entries.
pub const LOOKUP_AUDIT_EVENT: &str = "lookup";

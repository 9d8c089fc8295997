// crates/lookup-gate-core/src/core/state.rs
// ============================================================================
// Module: Dispatch State Machine
// Description: Per-request lifecycle states and legal transitions.
// Purpose: Make illegal lifecycle transitions unrepresentable at runtime.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every lookup moves `Received -> Admitted -> Dispatched -> Normalized ->
//! Completed`. Any non-terminal state may exit to `Failed`; `Received` and
//! `Admitted` may exit to `Rejected`. Terminal states accept no transitions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::failure::AdmissionReason;
use crate::core::failure::FailureCode;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle state of one lookup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DispatchState {
    /// Request accepted for processing.
    Received,
    /// Admission granted.
    Admitted,
    /// Provider call in progress.
    Dispatched,
    /// Provider payload normalized.
    Normalized,
    /// Result delivered.
    Completed,
    /// Request failed.
    Failed(FailureCode),
    /// Admission rejected the request.
    Rejected(AdmissionReason),
}

impl DispatchState {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Rejected(_))
    }

    /// Returns the stable state label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Admitted => "admitted",
            Self::Dispatched => "dispatched",
            Self::Normalized => "normalized",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::Rejected(_) => "rejected",
        }
    }

    /// Validates a transition to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not part of the lifecycle.
    pub const fn transition(self, next: Self) -> Result<Self, TransitionError> {
        let allowed = match (self, next) {
            (Self::Received, Self::Admitted | Self::Rejected(_))
            | (Self::Admitted, Self::Dispatched | Self::Rejected(_))
            | (Self::Dispatched, Self::Normalized)
            | (Self::Normalized, Self::Completed) => true,
            (from, Self::Failed(_)) => !from.is_terminal(),
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

/// Illegal lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal dispatch transition from {} to {}", from.label(), to.label())]
pub struct TransitionError {
    /// State the transition started from.
    pub from: DispatchState,
    /// Requested next state.
    pub to: DispatchState,
}

/// Recorded lifecycle of one request.
///
/// # Invariants
/// - `path` starts at `Received` and every step passed [`DispatchState::transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// States visited in order.
    path: Vec<DispatchState>,
}

impl Lifecycle {
    /// Starts a lifecycle in `Received`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: vec![DispatchState::Received],
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> DispatchState {
        self.path.last().copied().unwrap_or(DispatchState::Received)
    }

    /// Advances to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is illegal.
    pub fn advance(&mut self, next: DispatchState) -> Result<DispatchState, TransitionError> {
        let state = self.current().transition(next)?;
        self.path.push(state);
        Ok(state)
    }

    /// Returns the states visited so far.
    #[must_use]
    pub fn path(&self) -> &[DispatchState] {
        &self.path
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/lookup-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Lookup Gate Interfaces
// Description: Backend-agnostic interfaces for subscriptions, providers, and audit.
// Purpose: Define the contract surfaces used by the Lookup Gate runtime.
// Dependencies: crate::core, async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the dispatcher integrates with storage, the external
//! data provider, and audit pipelines. Implementations return typed errors
//! and never panic across the boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::AuditEntry;
use crate::core::CallerId;
use crate::core::CallerRecord;
use crate::core::LookupKind;
use crate::core::QuotaDecision;
use crate::core::QuotaReceipt;
use crate::core::SubscriptionPolicy;
use crate::core::SubscriptionStats;
use crate::core::TierGrant;
use crate::core::TierId;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Subscription Store
// ============================================================================

/// Subscription store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Caller is not registered.
    #[error("unknown caller: {0}")]
    UnknownCaller(String),
    /// Tier is not declared by the subscription policy.
    #[error("unknown tier: {0}")]
    UnknownTier(String),
    /// Stored data failed validation.
    #[error("store data invalid: {0}")]
    Invalid(String),
    /// Backend failure.
    #[error("store error: {0}")]
    Store(String),
}

/// Keyed subscription state with per-caller atomic quota consumption.
///
/// # Invariants
/// - `consume_quota` is linearizable per caller: concurrent calls never both
///   succeed when only one unit remains.
/// - Unknown callers are never created implicitly except through `register`.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the subscription policy the store enforces.
    fn policy(&self) -> &SubscriptionPolicy;

    /// Registers a caller on first contact and refreshes `last_seen_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn register(&self, caller: &CallerId, now: Timestamp)
    -> Result<CallerRecord, StoreError>;

    /// Loads a caller record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn caller(&self, caller: &CallerId) -> Result<Option<CallerRecord>, StoreError>;

    /// Returns the caller's tier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownCaller`] for unregistered callers.
    async fn tier(&self, caller: &CallerId) -> Result<TierId, StoreError>;

    /// Returns whether the caller holds the admin override.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn is_admin(&self, caller: &CallerId) -> Result<bool, StoreError>;

    /// Atomically charges `cost` units against the caller's window quota.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; denials are not errors.
    async fn consume_quota(
        &self,
        caller: &CallerId,
        cost: u32,
        now: Timestamp,
    ) -> Result<QuotaDecision, StoreError>;

    /// Returns a charge when its window is still current.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn refund_quota(&self, receipt: &QuotaReceipt) -> Result<bool, StoreError>;

    /// Records one dispatched lookup for lifetime accounting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn record_usage(&self, caller: &CallerId, now: Timestamp) -> Result<(), StoreError>;

    /// Grants a tier for a fixed term.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownCaller`] or [`StoreError::UnknownTier`].
    async fn grant_tier(&self, grant: &TierGrant, now: Timestamp)
    -> Result<CallerRecord, StoreError>;

    /// Returns the caller to the default tier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownCaller`] for unregistered callers.
    async fn revoke_tier(&self, caller: &CallerId, now: Timestamp)
    -> Result<CallerRecord, StoreError>;

    /// Sets the admin override flag, registering the caller when needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn set_admin(
        &self,
        caller: &CallerId,
        admin: bool,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError>;

    /// Aggregates subscription statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn stats(&self, now: Timestamp) -> Result<SubscriptionStats, StoreError>;
}

// ============================================================================
// SECTION: Lookup Provider
// ============================================================================

/// Successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    /// Parsed JSON payload.
    pub payload: Value,
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Attempts performed, including the successful one.
    pub attempts: u32,
}

/// Terminal provider failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    /// Transient failures exhausted the retry budget.
    #[error("provider unavailable after {attempts} attempts: {detail}")]
    Unavailable {
        /// Attempts performed.
        attempts: u32,
        /// Last transient failure.
        detail: String,
    },
    /// Provider rejected the query definitively.
    #[error("provider rejected query with status {status}: {detail}")]
    Rejected {
        /// Attempts performed.
        attempts: u32,
        /// Status returned.
        status: u16,
        /// Rejection detail.
        detail: String,
    },
    /// Provider refused the configured credentials.
    #[error("provider authentication failed with status {status}")]
    Unauthorized {
        /// Attempts performed.
        attempts: u32,
        /// Status returned.
        status: u16,
    },
    /// Provider answered outside its contract.
    #[error("malformed provider response: {detail}")]
    Malformed {
        /// Attempts performed.
        attempts: u32,
        /// Violation detail.
        detail: String,
    },
    /// Request could not be built; nothing was sent.
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
}

impl ProviderFailure {
    /// Returns the number of attempts that reached the network.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Unavailable {
                attempts, ..
            }
            | Self::Rejected {
                attempts, ..
            }
            | Self::Unauthorized {
                attempts, ..
            }
            | Self::Malformed {
                attempts, ..
            } => *attempts,
            Self::Misconfigured(_) => 0,
        }
    }
}

/// External data provider.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Executes a lookup with the provider's resilience policy applied.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderFailure`] when the lookup cannot produce a payload.
    async fn call(&self, kind: LookupKind, query: &str)
    -> Result<ProviderResponse, ProviderFailure>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Destination for lookup audit entries.
pub trait AuditSink: Send + Sync {
    /// Records an audit entry.
    fn record(&self, entry: &AuditEntry);
}

// crates/lookup-gate-core/src/runtime/admission.rs
// ============================================================================
// Module: Admission Controller
// Description: Global concurrency, per-caller rate, and quota admission checks.
// Purpose: Decide whether a lookup may proceed to the external provider.
// Dependencies: crate::core, crate::interfaces, tokio, tracing
// ============================================================================

//! ## Overview
//! Admission evaluates three ceilings in order and stops at the first
//! failure:
//!
//! 1. the global in-flight ceiling toward the provider (a semaphore; callers
//!    queue for a permit up to the configured queue timeout),
//! 2. the caller's requests-per-minute token bucket,
//! 3. the caller's subscription quota.
//!
//! Admins skip the second and third checks. Nobody skips the first: the
//! returned [`AdmissionTicket`] owns the in-flight permit until it is
//! dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::core::AdmissionReason;
use crate::core::CallerId;
use crate::core::Clock;
use crate::core::GateFailure;
use crate::core::LookupKind;
use crate::core::QuotaDecision;
use crate::core::QuotaReceipt;
use crate::core::TierId;
use crate::interfaces::StoreError;
use crate::interfaces::SubscriptionStore;
use crate::runtime::rate_limit::DEFAULT_MAX_TRACKED_CALLERS;
use crate::runtime::rate_limit::RateDecision;
use crate::runtime::rate_limit::RateLimiter;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Admission limits.
///
/// # Invariants
/// - `max_inflight` is at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum concurrent provider-bound lookups.
    pub max_inflight: usize,
    /// Maximum wait for an in-flight permit.
    pub queue_timeout: Duration,
    /// Maximum callers tracked by the rate limiter.
    pub max_tracked_callers: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_inflight: 16,
            queue_timeout: Duration::from_secs(10),
            max_tracked_callers: DEFAULT_MAX_TRACKED_CALLERS,
        }
    }
}

// ============================================================================
// SECTION: Tickets
// ============================================================================

/// Proof of admission.
///
/// # Invariants
/// - Holds one in-flight permit until dropped.
/// - `receipt` is `None` for admins, who consume no quota.
#[derive(Debug)]
pub struct AdmissionTicket {
    /// In-flight permit.
    permit: OwnedSemaphorePermit,
    /// Quota receipt for refunds.
    receipt: Option<QuotaReceipt>,
    /// Whether the admin override applied.
    admin: bool,
    /// Tier the caller was admitted under.
    tier: TierId,
    /// Units remaining after the charge.
    remaining: Option<u32>,
}

impl AdmissionTicket {
    /// Returns the quota receipt, if quota was charged.
    #[must_use]
    pub const fn receipt(&self) -> Option<&QuotaReceipt> {
        self.receipt.as_ref()
    }

    /// Returns whether the admin override applied.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.admin
    }

    /// Returns the tier the caller was admitted under.
    #[must_use]
    pub const fn tier(&self) -> &TierId {
        &self.tier
    }

    /// Returns units remaining after the charge.
    #[must_use]
    pub const fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Releases the in-flight permit.
    pub fn release(self) {
        drop(self.permit);
    }
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Admission controller for provider-bound lookups.
pub struct AdmissionController {
    /// Global in-flight ceiling.
    inflight: Arc<Semaphore>,
    /// Per-caller rate limiter.
    limiter: RateLimiter,
    /// Subscription store for tiers and quota.
    store: Arc<dyn SubscriptionStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Admission limits.
    config: AdmissionConfig,
}

impl AdmissionController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        config: AdmissionConfig,
        store: Arc<dyn SubscriptionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let max_inflight = config.max_inflight.max(1);
        Self {
            inflight: Arc::new(Semaphore::new(max_inflight)),
            limiter: RateLimiter::new(config.max_tracked_callers),
            store,
            clock,
            config: AdmissionConfig {
                max_inflight,
                ..config
            },
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Returns the number of free in-flight permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.inflight.available_permits()
    }

    /// Admits a lookup or reports why it was rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GateFailure::AdmissionDenied`] for rejections and
    /// [`GateFailure::Internal`] for store failures.
    pub async fn admit(
        &self,
        caller: &CallerId,
        kind: LookupKind,
    ) -> Result<AdmissionTicket, GateFailure> {
        let permit = self.acquire_permit().await?;
        let admin = self.store.is_admin(caller).await.map_err(store_failure)?;
        let tier = match self.store.tier(caller).await {
            Ok(tier) => tier,
            Err(StoreError::UnknownCaller(_)) => {
                return Err(GateFailure::denied(AdmissionReason::UnknownCaller));
            }
            Err(err) => return Err(store_failure(err)),
        };
        if admin {
            debug!(caller = %caller, kind = kind.as_str(), "admin override admitted");
            return Ok(AdmissionTicket {
                permit,
                receipt: None,
                admin: true,
                tier,
                remaining: None,
            });
        }
        let policy = self.store.policy();
        let per_minute = policy.resolve(&tier).requests_per_minute;
        let cost = policy.cost_for(kind);
        let now = self.clock.now();
        match self.limiter.check(caller, per_minute, now).map_err(GateFailure::internal)? {
            RateDecision::Allowed => {}
            RateDecision::Limited {
                retry_after_ms,
            } => {
                return Err(GateFailure::AdmissionDenied {
                    reason: AdmissionReason::RateLimited,
                    retry_after_ms: Some(retry_after_ms),
                });
            }
        }
        match self.store.consume_quota(caller, cost, now).await.map_err(store_failure)? {
            QuotaDecision::Allowed {
                receipt,
                remaining,
                ..
            } => Ok(AdmissionTicket {
                permit,
                receipt: Some(receipt),
                admin: false,
                tier,
                remaining: Some(remaining),
            }),
            QuotaDecision::Denied {
                reason,
                retry_at,
            } => Err(GateFailure::AdmissionDenied {
                reason: reason.into(),
                retry_after_ms: retry_at.map(|at| at.millis_since(now)),
            }),
        }
    }

    /// Waits for an in-flight permit up to the queue timeout.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, GateFailure> {
        let acquire = Arc::clone(&self.inflight).acquire_owned();
        match tokio::time::timeout(self.config.queue_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(GateFailure::internal("in-flight semaphore closed")),
            Err(_) => Err(GateFailure::denied(AdmissionReason::Saturated)),
        }
    }
}

/// Maps store errors raised during admission.
fn store_failure(err: StoreError) -> GateFailure {
    GateFailure::internal(format!("subscription store: {err}"))
}

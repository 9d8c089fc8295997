// crates/lookup-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Lookup Gate In-Memory Stores
// Description: In-memory subscription store and audit log.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces, async-trait
// ============================================================================

//! ## Overview
//! [`InMemorySubscriptionStore`] keeps every caller record behind a single
//! mutex, which makes quota consumption linearizable per caller. It is the
//! default backend for single-process deployments and tests; state is lost
//! on restart. [`InMemoryAuditLog`] collects audit entries for inspection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;

use crate::core::AuditEntry;
use crate::core::CallerId;
use crate::core::CallerRecord;
use crate::core::QuotaDecision;
use crate::core::QuotaDenial;
use crate::core::QuotaReceipt;
use crate::core::SubscriptionPolicy;
use crate::core::SubscriptionStats;
use crate::core::TierGrant;
use crate::core::TierId;
use crate::core::Timestamp;
use crate::interfaces::AuditSink;
use crate::interfaces::StoreError;
use crate::interfaces::SubscriptionStore;
use crate::runtime::ledger;

// ============================================================================
// SECTION: In-Memory Subscription Store
// ============================================================================

/// In-memory subscription store.
#[derive(Debug, Clone)]
pub struct InMemorySubscriptionStore {
    /// Policy enforced by the store.
    policy: Arc<SubscriptionPolicy>,
    /// Caller records protected by a mutex.
    callers: Arc<Mutex<BTreeMap<CallerId, CallerRecord>>>,
}

impl InMemorySubscriptionStore {
    /// Creates an empty store enforcing `policy`.
    #[must_use]
    pub fn new(policy: SubscriptionPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            callers: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Inserts or replaces a caller record verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn seed(&self, record: CallerRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.caller_id.clone(), record);
        Ok(())
    }

    /// Locks the caller map.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<CallerId, CallerRecord>>, StoreError> {
        self.callers
            .lock()
            .map_err(|_| StoreError::Store("subscription store mutex poisoned".to_string()))
    }

    /// Applies `update` to an existing record and returns the new state.
    fn update<F>(&self, caller: &CallerId, update: F) -> Result<CallerRecord, StoreError>
    where
        F: FnOnce(&mut CallerRecord) -> Result<(), StoreError>,
    {
        let mut guard = self.lock()?;
        let record =
            guard.get_mut(caller).ok_or_else(|| StoreError::UnknownCaller(caller.to_string()))?;
        update(record)?;
        Ok(record.clone())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    fn policy(&self) -> &SubscriptionPolicy {
        &self.policy
    }

    async fn register(
        &self,
        caller: &CallerId,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        let mut guard = self.lock()?;
        let record = guard
            .entry(caller.clone())
            .or_insert_with(|| CallerRecord::first_contact(caller.clone(), &self.policy, now));
        record.last_seen_at = now;
        Ok(record.clone())
    }

    async fn caller(&self, caller: &CallerId) -> Result<Option<CallerRecord>, StoreError> {
        Ok(self.lock()?.get(caller).cloned())
    }

    async fn tier(&self, caller: &CallerId) -> Result<TierId, StoreError> {
        self.lock()?
            .get(caller)
            .map(|record| record.tier.clone())
            .ok_or_else(|| StoreError::UnknownCaller(caller.to_string()))
    }

    async fn is_admin(&self, caller: &CallerId) -> Result<bool, StoreError> {
        Ok(self.lock()?.get(caller).is_some_and(|record| record.admin))
    }

    async fn consume_quota(
        &self,
        caller: &CallerId,
        cost: u32,
        now: Timestamp,
    ) -> Result<QuotaDecision, StoreError> {
        let mut guard = self.lock()?;
        let Some(record) = guard.get_mut(caller) else {
            return Ok(QuotaDecision::Denied {
                reason: QuotaDenial::UnknownCaller,
                retry_at: None,
            });
        };
        Ok(ledger::consume(record, &self.policy, cost, now))
    }

    async fn refund_quota(&self, receipt: &QuotaReceipt) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        Ok(guard.get_mut(&receipt.caller_id).is_some_and(|record| ledger::refund(record, receipt)))
    }

    async fn record_usage(&self, caller: &CallerId, now: Timestamp) -> Result<(), StoreError> {
        self.update(caller, |record| {
            ledger::record_usage(record, now);
            Ok(())
        })
        .map(|_| ())
    }

    async fn grant_tier(
        &self,
        grant: &TierGrant,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        self.update(&grant.caller_id, |record| ledger::grant(record, &self.policy, grant, now))
    }

    async fn revoke_tier(
        &self,
        caller: &CallerId,
        _now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        self.update(caller, |record| {
            ledger::revoke(record, &self.policy);
            Ok(())
        })
    }

    async fn set_admin(
        &self,
        caller: &CallerId,
        admin: bool,
        now: Timestamp,
    ) -> Result<CallerRecord, StoreError> {
        let mut guard = self.lock()?;
        let record = guard
            .entry(caller.clone())
            .or_insert_with(|| CallerRecord::first_contact(caller.clone(), &self.policy, now));
        record.admin = admin;
        Ok(record.clone())
    }

    async fn stats(&self, now: Timestamp) -> Result<SubscriptionStats, StoreError> {
        let guard = self.lock()?;
        let mut stats = SubscriptionStats::default();
        for record in guard.values() {
            stats.accumulate(record, &self.policy, now);
        }
        Ok(stats)
    }
}

// ============================================================================
// SECTION: In-Memory Audit Log
// ============================================================================

/// Audit sink that keeps entries in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLog {
    /// Recorded entries in write order.
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: &AuditEntry) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry.clone());
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

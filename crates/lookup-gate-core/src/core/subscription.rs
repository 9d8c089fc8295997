// crates/lookup-gate-core/src/core/subscription.rs
// ============================================================================
// Module: Subscription Model
// Description: Tier policies, quota windows, caller records, and quota receipts.
// Purpose: Define the canonical subscription state shared by every store backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Subscription state is keyed by caller. Each caller holds a tier, an
//! optional tier expiry, and a quota counter that belongs to a fixed
//! wall-clock window. Windows are aligned to the epoch plus a configured
//! offset, so every caller shares the same reset instants regardless of when
//! they first used the service.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CallerId;
use crate::core::identifiers::TierId;
use crate::core::lookup::LookupKind;
use crate::core::time::MILLIS_PER_DAY;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Quota Window
// ============================================================================

/// Fixed quota window aligned to wall-clock boundaries.
///
/// # Invariants
/// - `period_ms` is greater than zero.
/// - Window starts satisfy `start = k * period_ms + offset_ms` for integer `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaWindow {
    /// Window length in milliseconds.
    period_ms: i64,
    /// Boundary offset from the unix epoch in milliseconds.
    offset_ms: i64,
}

impl QuotaWindow {
    /// Creates a window; a non-positive period is clamped to one millisecond.
    #[must_use]
    pub const fn new(period_ms: i64, offset_ms: i64) -> Self {
        let period_ms = if period_ms <= 0 { 1 } else { period_ms };
        Self {
            period_ms,
            offset_ms,
        }
    }

    /// Daily window with boundaries shifted by `offset_minutes` from UTC midnight.
    #[must_use]
    pub const fn daily(offset_minutes: i64) -> Self {
        Self::new(MILLIS_PER_DAY, offset_minutes * 60_000)
    }

    /// Returns the window length in milliseconds.
    #[must_use]
    pub const fn period_ms(&self) -> i64 {
        self.period_ms
    }

    /// Returns the boundary offset in milliseconds.
    #[must_use]
    pub const fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Returns the start of the window containing `now`.
    #[must_use]
    pub const fn window_start(&self, now: Timestamp) -> Timestamp {
        let shifted = now.as_unix_millis().saturating_sub(self.offset_ms);
        let index = shifted.div_euclid(self.period_ms);
        Timestamp::from_unix_millis(
            index.saturating_mul(self.period_ms).saturating_add(self.offset_ms),
        )
    }

    /// Returns the instant the window containing `now` resets.
    #[must_use]
    pub const fn resets_at(&self, now: Timestamp) -> Timestamp {
        self.window_start(now).saturating_add_millis(self.period_ms)
    }
}

impl Default for QuotaWindow {
    fn default() -> Self {
        Self::daily(0)
    }
}

// ============================================================================
// SECTION: Tier Policy
// ============================================================================

/// Limits attached to a subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Tier identifier.
    pub id: TierId,
    /// Quota units available per window.
    pub quota_per_window: u32,
    /// Per-caller requests per minute; zero disables the per-minute ceiling.
    pub requests_per_minute: u32,
}

/// Subscription policy shared by store backends and admission.
///
/// # Invariants
/// - `default_tier` is always resolvable, so tier lookups are total.
/// - Costs default to one unit for kinds without an explicit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionPolicy {
    /// Quota window shared by all callers.
    pub window: QuotaWindow,
    /// Tier assigned on first contact and after revocation.
    pub default_tier: TierPolicy,
    /// Additional tiers keyed by identifier.
    pub tiers: BTreeMap<TierId, TierPolicy>,
    /// Quota cost per lookup kind.
    pub costs: BTreeMap<LookupKind, u32>,
    /// Default grant length in days for admin grants.
    pub grant_days: u32,
}

impl SubscriptionPolicy {
    /// Creates a policy with a single default tier and unit costs.
    #[must_use]
    pub fn new(window: QuotaWindow, default_tier: TierPolicy) -> Self {
        Self {
            window,
            default_tier,
            tiers: BTreeMap::new(),
            costs: BTreeMap::new(),
            grant_days: DEFAULT_GRANT_DAYS,
        }
    }

    /// Adds or replaces a tier.
    #[must_use]
    pub fn with_tier(mut self, tier: TierPolicy) -> Self {
        self.tiers.insert(tier.id.clone(), tier);
        self
    }

    /// Resolves a tier, falling back to the default tier for unknown ids.
    #[must_use]
    pub fn resolve(&self, tier: &TierId) -> &TierPolicy {
        if *tier == self.default_tier.id {
            return &self.default_tier;
        }
        self.tiers.get(tier).unwrap_or(&self.default_tier)
    }

    /// Returns true when the tier id is declared.
    #[must_use]
    pub fn has_tier(&self, tier: &TierId) -> bool {
        *tier == self.default_tier.id || self.tiers.contains_key(tier)
    }

    /// Returns the quota cost for a lookup kind.
    #[must_use]
    pub fn cost_for(&self, kind: LookupKind) -> u32 {
        self.costs.get(&kind).copied().unwrap_or(1)
    }
}

/// Default grant length for admin grants.
pub const DEFAULT_GRANT_DAYS: u32 = 21;

// ============================================================================
// SECTION: Caller Records
// ============================================================================

/// Persisted subscription state for one caller.
///
/// # Invariants
/// - `used` never exceeds the resolved tier's `quota_per_window` through
///   quota consumption; admin lookups do not touch `used`.
/// - `window_start` is a boundary produced by [`QuotaWindow::window_start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerRecord {
    /// Caller identifier.
    pub caller_id: CallerId,
    /// Current tier.
    pub tier: TierId,
    /// Tier expiry, when the tier was granted for a fixed term.
    pub tier_expires_at: Option<Timestamp>,
    /// Admin override flag.
    pub admin: bool,
    /// Quota units used in the current window.
    pub used: u32,
    /// Start of the window `used` belongs to.
    pub window_start: Timestamp,
    /// First contact time.
    pub created_at: Timestamp,
    /// Most recent contact time.
    pub last_seen_at: Timestamp,
    /// Lookups dispatched to the provider over the caller's lifetime.
    pub lifetime_queries: u64,
    /// Payment reference recorded with the latest grant.
    pub payment_ref: Option<String>,
}

impl CallerRecord {
    /// Creates a first-contact record on the policy's default tier.
    #[must_use]
    pub fn first_contact(caller_id: CallerId, policy: &SubscriptionPolicy, now: Timestamp) -> Self {
        Self {
            caller_id,
            tier: policy.default_tier.id.clone(),
            tier_expires_at: None,
            admin: false,
            used: 0,
            window_start: policy.window.window_start(now),
            created_at: now,
            last_seen_at: now,
            lifetime_queries: 0,
            payment_ref: None,
        }
    }

    /// Returns true when the tier has a fixed term that has elapsed.
    #[must_use]
    pub fn tier_expired(&self, now: Timestamp) -> bool {
        self.tier_expires_at.is_some_and(|expires| now >= expires)
    }
}

/// Admin grant of a tier for a fixed number of days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierGrant {
    /// Caller receiving the grant.
    pub caller_id: CallerId,
    /// Tier being granted.
    pub tier: TierId,
    /// Grant length in days.
    pub days: u32,
    /// Optional payment reference.
    pub payment_ref: Option<String>,
    /// Admin issuing the grant.
    pub granted_by: CallerId,
}

impl TierGrant {
    /// Returns the expiry instant for a grant issued at `now`.
    #[must_use]
    pub fn expires_at(&self, now: Timestamp) -> Timestamp {
        now.saturating_add_millis(i64::from(self.days).saturating_mul(MILLIS_PER_DAY))
    }
}

// ============================================================================
// SECTION: Quota Decisions
// ============================================================================

/// Quota denial reasons reported by subscription stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDenial {
    /// Window quota is used up.
    TierExhausted,
    /// Fixed-term tier has expired.
    TierExpired,
    /// Caller has never been registered.
    UnknownCaller,
}

/// Proof of a quota consumption used for refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaReceipt {
    /// Caller charged.
    pub caller_id: CallerId,
    /// Units charged.
    pub cost: u32,
    /// Window the charge belongs to.
    pub window_start: Timestamp,
}

/// Result of a quota consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Units were charged.
    Allowed {
        /// Receipt for the charge.
        receipt: QuotaReceipt,
        /// Units remaining in the window after the charge.
        remaining: u32,
        /// Window reset instant.
        resets_at: Timestamp,
    },
    /// Units were not charged.
    Denied {
        /// Denial reason.
        reason: QuotaDenial,
        /// Instant the denial may lift, when known.
        retry_at: Option<Timestamp>,
    },
}

// ============================================================================
// SECTION: Status Views
// ============================================================================

/// Subscription status label derived from a caller record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Caller holds a non-default tier that has not expired.
    Active,
    /// Caller's fixed-term tier has expired.
    Expired,
    /// Caller is on the default tier.
    Inactive,
}

/// Read-only caller status for self-service and admin inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerStatus {
    /// Caller identifier.
    pub caller_id: CallerId,
    /// Current tier.
    pub tier: TierId,
    /// Derived subscription status.
    pub status: SubscriptionStatus,
    /// Tier expiry, if any.
    pub tier_expires_at: Option<Timestamp>,
    /// Whole days remaining before expiry.
    pub days_remaining: Option<u32>,
    /// Admin flag.
    pub admin: bool,
    /// Units used in the current window.
    pub quota_used: u32,
    /// Units remaining in the current window.
    pub quota_remaining: u32,
    /// Current window reset instant.
    pub quota_resets_at: Timestamp,
    /// Lifetime dispatched lookups.
    pub lifetime_queries: u64,
    /// Payment reference recorded with the latest grant.
    pub payment_ref: Option<String>,
    /// First contact time.
    pub created_at: Timestamp,
}

impl CallerStatus {
    /// Builds the status view for `record` at `now`.
    #[must_use]
    pub fn from_record(record: &CallerRecord, policy: &SubscriptionPolicy, now: Timestamp) -> Self {
        let tier = policy.resolve(&record.tier);
        let current_window = policy.window.window_start(now);
        let used = if record.window_start == current_window { record.used } else { 0 };
        let status = if record.tier_expired(now) {
            SubscriptionStatus::Expired
        } else if record.tier == policy.default_tier.id {
            SubscriptionStatus::Inactive
        } else {
            SubscriptionStatus::Active
        };
        let days_remaining = record.tier_expires_at.map(|expires| {
            let remaining_ms = expires.millis_since(now);
            u32::try_from(remaining_ms / MILLIS_PER_DAY.unsigned_abs()).unwrap_or(u32::MAX)
        });
        Self {
            caller_id: record.caller_id.clone(),
            tier: record.tier.clone(),
            status,
            tier_expires_at: record.tier_expires_at,
            days_remaining,
            admin: record.admin,
            quota_used: used,
            quota_remaining: tier.quota_per_window.saturating_sub(used),
            quota_resets_at: policy.window.resets_at(now),
            lifetime_queries: record.lifetime_queries,
            payment_ref: record.payment_ref.clone(),
            created_at: record.created_at,
        }
    }
}

/// Aggregate subscription statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStats {
    /// Registered callers.
    pub total_callers: u64,
    /// Callers with an active non-default tier.
    pub active_subscriptions: u64,
    /// Callers with an expired fixed-term tier.
    pub expired_subscriptions: u64,
    /// Callers flagged as admins.
    pub admins: u64,
    /// Quota units used in the current window across all callers.
    pub window_units_used: u64,
    /// Lifetime dispatched lookups across all callers.
    pub lifetime_queries: u64,
}

impl SubscriptionStats {
    /// Folds one caller record into the aggregate.
    pub fn accumulate(&mut self, record: &CallerRecord, policy: &SubscriptionPolicy, now: Timestamp) {
        self.total_callers += 1;
        match CallerStatus::from_record(record, policy, now).status {
            SubscriptionStatus::Active => self.active_subscriptions += 1,
            SubscriptionStatus::Expired => self.expired_subscriptions += 1,
            SubscriptionStatus::Inactive => {}
        }
        if record.admin {
            self.admins += 1;
        }
        if record.window_start == policy.window.window_start(now) {
            self.window_units_used += u64::from(record.used);
        }
        self.lifetime_queries = self.lifetime_queries.saturating_add(record.lifetime_queries);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

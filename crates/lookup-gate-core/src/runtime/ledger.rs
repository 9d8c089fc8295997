// crates/lookup-gate-core/src/runtime/ledger.rs
// ============================================================================
// Module: Quota Ledger
// Description: Pure quota, grant, and refund transitions over caller records.
// Purpose: Share one set of subscription semantics across every store backend.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Store backends load a [`CallerRecord`], apply one of these functions
//! under their own synchronization boundary, and persist the result. The
//! functions never read the clock; `now` is supplied by the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::CallerRecord;
use crate::core::QuotaDecision;
use crate::core::QuotaDenial;
use crate::core::QuotaReceipt;
use crate::core::SubscriptionPolicy;
use crate::core::TierGrant;
use crate::core::Timestamp;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Quota Transitions
// ============================================================================

/// Resets the usage counter when `now` falls in a later window.
pub fn roll_window(record: &mut CallerRecord, policy: &SubscriptionPolicy, now: Timestamp) {
    let current = policy.window.window_start(now);
    if record.window_start < current {
        record.window_start = current;
        record.used = 0;
    }
}

/// Charges `cost` units against the caller's window quota.
///
/// # Invariants
/// - On `Allowed`, `record.used` never exceeds the tier quota.
/// - On `Denied`, the record's usage is unchanged apart from a window roll.
pub fn consume(
    record: &mut CallerRecord,
    policy: &SubscriptionPolicy,
    cost: u32,
    now: Timestamp,
) -> QuotaDecision {
    roll_window(record, policy, now);
    if record.tier_expired(now) {
        return QuotaDecision::Denied {
            reason: QuotaDenial::TierExpired,
            retry_at: None,
        };
    }
    let tier = policy.resolve(&record.tier);
    let resets_at = policy.window.resets_at(now);
    let Some(next_used) = record.used.checked_add(cost) else {
        return QuotaDecision::Denied {
            reason: QuotaDenial::TierExhausted,
            retry_at: Some(resets_at),
        };
    };
    if next_used > tier.quota_per_window {
        return QuotaDecision::Denied {
            reason: QuotaDenial::TierExhausted,
            retry_at: Some(resets_at),
        };
    }
    record.used = next_used;
    QuotaDecision::Allowed {
        receipt: QuotaReceipt {
            caller_id: record.caller_id.clone(),
            cost,
            window_start: record.window_start,
        },
        remaining: tier.quota_per_window - next_used,
        resets_at,
    }
}

/// Returns a charge when the receipt's window is still the record's window.
pub fn refund(record: &mut CallerRecord, receipt: &QuotaReceipt) -> bool {
    if record.caller_id != receipt.caller_id || record.window_start != receipt.window_start {
        return false;
    }
    record.used = record.used.saturating_sub(receipt.cost);
    true
}

/// Records one dispatched lookup.
pub fn record_usage(record: &mut CallerRecord, now: Timestamp) {
    record.lifetime_queries = record.lifetime_queries.saturating_add(1);
    record.last_seen_at = now;
}

// ============================================================================
// SECTION: Tier Administration
// ============================================================================

/// Applies an admin grant, resetting the window counter.
///
/// # Errors
///
/// Returns [`StoreError::UnknownTier`] when the tier is not declared.
pub fn grant(
    record: &mut CallerRecord,
    policy: &SubscriptionPolicy,
    grant: &TierGrant,
    now: Timestamp,
) -> Result<(), StoreError> {
    if !policy.has_tier(&grant.tier) {
        return Err(StoreError::UnknownTier(grant.tier.to_string()));
    }
    record.tier = grant.tier.clone();
    record.tier_expires_at = Some(grant.expires_at(now));
    record.payment_ref.clone_from(&grant.payment_ref);
    record.window_start = policy.window.window_start(now);
    record.used = 0;
    Ok(())
}

/// Returns the caller to the default tier without an expiry.
pub fn revoke(record: &mut CallerRecord, policy: &SubscriptionPolicy) {
    record.tier = policy.default_tier.id.clone();
    record.tier_expires_at = None;
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CallerId;
    use crate::core::QuotaWindow;
    use crate::core::TierId;
    use crate::core::TierPolicy;

    fn policy(quota: u32) -> SubscriptionPolicy {
        SubscriptionPolicy::new(
            QuotaWindow::new(1_000, 0),
            TierPolicy {
                id: TierId::new("free"),
                quota_per_window: quota,
                requests_per_minute: 0,
            },
        )
        .with_tier(TierPolicy {
            id: TierId::new("premium"),
            quota_per_window: 10,
            requests_per_minute: 0,
        })
    }

    fn at(millis: i64) -> Timestamp {
        Timestamp::from_unix_millis(millis)
    }

    #[test]
    fn consume_stops_at_ceiling_and_resets_next_window() {
        let policy = policy(2);
        let mut record = CallerRecord::first_contact(CallerId::new("c"), &policy, at(10));
        assert!(matches!(consume(&mut record, &policy, 1, at(20)), QuotaDecision::Allowed {
            remaining: 1,
            ..
        }));
        assert!(matches!(consume(&mut record, &policy, 1, at(30)), QuotaDecision::Allowed {
            remaining: 0,
            ..
        }));
        assert!(matches!(consume(&mut record, &policy, 1, at(40)), QuotaDecision::Denied {
            reason: QuotaDenial::TierExhausted,
            ..
        }));
        assert_eq!(record.used, 2);
        assert!(matches!(consume(&mut record, &policy, 1, at(1_005)), QuotaDecision::Allowed {
            remaining: 1,
            ..
        }));
    }

    #[test]
    fn refund_only_applies_in_same_window() {
        let policy = policy(2);
        let mut record = CallerRecord::first_contact(CallerId::new("c"), &policy, at(0));
        let QuotaDecision::Allowed {
            receipt, ..
        } = consume(&mut record, &policy, 1, at(5))
        else {
            unreachable!("quota available");
        };
        assert!(refund(&mut record, &receipt));
        assert_eq!(record.used, 0);
        let QuotaDecision::Allowed {
            receipt, ..
        } = consume(&mut record, &policy, 1, at(5))
        else {
            unreachable!("quota available");
        };
        roll_window(&mut record, &policy, at(2_000));
        assert!(!refund(&mut record, &receipt));
    }

    #[test]
    fn expired_grant_denies_without_charging() {
        let policy = policy(0);
        let mut record = CallerRecord::first_contact(CallerId::new("c"), &policy, at(0));
        let grant_request = TierGrant {
            caller_id: CallerId::new("c"),
            tier: TierId::new("premium"),
            days: 0,
            payment_ref: Some("upi-ref".to_string()),
            granted_by: CallerId::new("admin"),
        };
        assert!(grant(&mut record, &policy, &grant_request, at(0)).is_ok());
        assert!(matches!(consume(&mut record, &policy, 1, at(1)), QuotaDecision::Denied {
            reason: QuotaDenial::TierExpired,
            ..
        }));
        assert_eq!(record.used, 0);
        revoke(&mut record, &policy);
        assert_eq!(record.tier.as_str(), "free");
        assert!(record.tier_expires_at.is_none());
    }

    #[test]
    fn grant_rejects_unknown_tier() {
        let policy = policy(1);
        let mut record = CallerRecord::first_contact(CallerId::new("c"), &policy, at(0));
        let grant_request = TierGrant {
            caller_id: CallerId::new("c"),
            tier: TierId::new("gold"),
            days: 21,
            payment_ref: None,
            granted_by: CallerId::new("admin"),
        };
        assert!(matches!(
            grant(&mut record, &policy, &grant_request, at(0)),
            Err(StoreError::UnknownTier(_))
        ));
    }
}

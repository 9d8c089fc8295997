// crates/lookup-gate-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite SubscriptionStore behavior.
// Purpose: Ensure durable subscriptions and atomic quota consumption.
// Dependencies: lookup-gate-store-sqlite, lookup-gate-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed subscription store. Exercises
//! persistence across reopen, concurrent quota charges, tier history, and
//! adversarial storage conditions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use lookup_gate_core::CallerId;
use lookup_gate_core::QuotaDecision;
use lookup_gate_core::QuotaDenial;
use lookup_gate_core::QuotaWindow;
use lookup_gate_core::StoreError;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::SubscriptionStore;
use lookup_gate_core::TierGrant;
use lookup_gate_core::TierId;
use lookup_gate_core::TierPolicy;
use lookup_gate_core::Timestamp;
use lookup_gate_store_sqlite::SqliteStoreConfig;
use lookup_gate_store_sqlite::SqliteStoreError;
use lookup_gate_store_sqlite::SqliteSubscriptionStore;
use lookup_gate_store_sqlite::TierEvent;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

fn policy(quota: u32) -> SubscriptionPolicy {
    SubscriptionPolicy::new(QuotaWindow::daily(330), TierPolicy {
        id: TierId::new("free"),
        quota_per_window: quota,
        requests_per_minute: 0,
    })
    .with_tier(TierPolicy {
        id: TierId::new("premium"),
        quota_per_window: 500,
        requests_per_minute: 0,
    })
}

fn open(dir: &TempDir, quota: u32) -> SqliteSubscriptionStore {
    let config = SqliteStoreConfig::new(dir.path().join("subscriptions.sqlite"));
    SqliteSubscriptionStore::open(config, policy(quota)).unwrap()
}

fn grant(caller: &str, days: u32) -> TierGrant {
    TierGrant {
        caller_id: CallerId::new(caller),
        tier: TierId::new("premium"),
        days,
        payment_ref: Some("upi-4711".to_string()),
        granted_by: CallerId::new("admin"),
    }
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let caller = CallerId::new("caller-1");
    {
        let store = open(&dir, 3);
        store.register(&caller, NOW).await.unwrap();
        assert!(matches!(
            store.consume_quota(&caller, 1, NOW).await.unwrap(),
            QuotaDecision::Allowed {
                remaining: 2,
                ..
            }
        ));
        store.record_usage(&caller, NOW).await.unwrap();
        store.set_admin(&CallerId::new("root"), true, NOW).await.unwrap();
    }
    let store = open(&dir, 3);
    let record = store.caller(&caller).await.unwrap().unwrap();
    assert_eq!(record.used, 1);
    assert_eq!(record.lifetime_queries, 1);
    assert_eq!(record.tier.as_str(), "free");
    assert!(store.is_admin(&CallerId::new("root")).await.unwrap());
    assert!(!store.is_admin(&caller).await.unwrap());
}

#[tokio::test]
async fn register_is_idempotent_and_refreshes_last_seen() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 3);
    let caller = CallerId::new("caller-1");
    let first = store.register(&caller, NOW).await.unwrap();
    let later = NOW.saturating_add_millis(5_000);
    let second = store.register(&caller, later).await.unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.last_seen_at, later);
    assert_eq!(store.stats(later).await.unwrap().total_callers, 1);
}

// ============================================================================
// SECTION: Quota
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_charges_never_exceed_quota() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir, 5));
    let caller = CallerId::new("caller-1");
    store.register(&caller, NOW).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0 .. 20 {
        let store = Arc::clone(&store);
        let caller = caller.clone();
        tasks.push(tokio::spawn(async move { store.consume_quota(&caller, 1, NOW).await.unwrap() }));
    }
    let mut allowed = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), QuotaDecision::Allowed { .. }) {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
    assert_eq!(store.caller(&caller).await.unwrap().unwrap().used, 5);
}

#[tokio::test]
async fn unknown_callers_are_denied_not_created() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 3);
    let stranger = CallerId::new("stranger");
    assert!(matches!(
        store.consume_quota(&stranger, 1, NOW).await.unwrap(),
        QuotaDecision::Denied {
            reason: QuotaDenial::UnknownCaller,
            ..
        }
    ));
    assert!(store.caller(&stranger).await.unwrap().is_none());
    assert!(matches!(store.tier(&stranger).await, Err(StoreError::UnknownCaller(_))));
    assert!(matches!(store.record_usage(&stranger, NOW).await, Err(StoreError::UnknownCaller(_))));
}

#[tokio::test]
async fn refunds_apply_only_within_the_charged_window() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 1);
    let caller = CallerId::new("caller-1");
    store.register(&caller, NOW).await.unwrap();
    let QuotaDecision::Allowed {
        receipt, ..
    } = store.consume_quota(&caller, 1, NOW).await.unwrap()
    else {
        panic!("quota available");
    };
    assert!(store.refund_quota(&receipt).await.unwrap());
    assert_eq!(store.caller(&caller).await.unwrap().unwrap().used, 0);

    let QuotaDecision::Allowed {
        receipt, ..
    } = store.consume_quota(&caller, 1, NOW).await.unwrap()
    else {
        panic!("quota available after refund");
    };
    let next_day = NOW.saturating_add_millis(86_400_000);
    assert!(matches!(store.consume_quota(&caller, 1, next_day).await.unwrap(), QuotaDecision::Allowed { .. }));
    assert!(!store.refund_quota(&receipt).await.unwrap());
    assert_eq!(store.caller(&caller).await.unwrap().unwrap().used, 1);
}

// ============================================================================
// SECTION: Tiers
// ============================================================================

#[tokio::test]
async fn grants_and_revocations_are_recorded() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 0);
    let caller = CallerId::new("caller-1");
    store.register(&caller, NOW).await.unwrap();

    let granted = store.grant_tier(&grant("caller-1", 21), NOW).await.unwrap();
    assert_eq!(granted.tier.as_str(), "premium");
    assert_eq!(granted.tier_expires_at, Some(NOW.saturating_add_millis(21 * 86_400_000)));
    assert_eq!(granted.payment_ref.as_deref(), Some("upi-4711"));
    assert!(matches!(store.consume_quota(&caller, 1, NOW).await.unwrap(), QuotaDecision::Allowed { .. }));

    let revoked_at = NOW.saturating_add_millis(60_000);
    let revoked = store.revoke_tier(&caller, revoked_at).await.unwrap();
    assert_eq!(revoked.tier.as_str(), "free");
    assert!(revoked.tier_expires_at.is_none());

    let history = store.tier_history(&caller).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event, TierEvent::Grant);
    assert_eq!(history[0].days, Some(21));
    assert_eq!(history[0].granted_by, Some(CallerId::new("admin")));
    assert_eq!(history[1].event, TierEvent::Revoke);
    assert_eq!(history[1].tier.as_str(), "free");
    assert_eq!(history[0].recorded_at, NOW);
    assert_eq!(history[1].recorded_at, revoked_at);
}

#[tokio::test]
async fn grant_rejects_unknown_tier_and_caller() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 3);
    store.register(&CallerId::new("caller-1"), NOW).await.unwrap();
    let mut gold = grant("caller-1", 21);
    gold.tier = TierId::new("gold");
    assert!(matches!(store.grant_tier(&gold, NOW).await, Err(StoreError::UnknownTier(_))));
    assert!(store.tier_history(&CallerId::new("caller-1")).await.unwrap().is_empty());
    assert!(matches!(
        store.grant_tier(&grant("nobody", 21), NOW).await,
        Err(StoreError::UnknownCaller(_))
    ));
}

#[tokio::test]
async fn stats_aggregate_stored_callers() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir, 3);
    for name in ["a", "b", "c"] {
        store.register(&CallerId::new(name), NOW).await.unwrap();
    }
    store.grant_tier(&grant("a", 21), NOW).await.unwrap();
    store.set_admin(&CallerId::new("b"), true, NOW).await.unwrap();
    store.consume_quota(&CallerId::new("c"), 2, NOW).await.unwrap();
    store.record_usage(&CallerId::new("c"), NOW).await.unwrap();

    let stats = store.stats(NOW).await.unwrap();
    assert_eq!(stats.total_callers, 3);
    assert_eq!(stats.active_subscriptions, 1);
    assert_eq!(stats.admins, 1);
    assert_eq!(stats.window_units_used, 2);
    assert_eq!(stats.lifetime_queries, 1);
}

// ============================================================================
// SECTION: Adversarial Storage
// ============================================================================

#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = SqliteStoreConfig::new(dir.path());
    assert!(matches!(
        SqliteSubscriptionStore::open(config, policy(3)),
        Err(SqliteStoreError::Invalid(_))
    ));
}

#[test]
fn unsupported_schema_versions_fail_closed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subscriptions.sqlite");
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE store_meta (version INTEGER NOT NULL); INSERT INTO store_meta \
                 (version) VALUES (99);",
            )
            .unwrap();
    }
    assert!(matches!(
        SqliteSubscriptionStore::open(SqliteStoreConfig::new(path), policy(3)),
        Err(SqliteStoreError::VersionMismatch(_))
    ));
}

#[tokio::test]
async fn corrupt_rows_surface_as_invalid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subscriptions.sqlite");
    let store = SqliteSubscriptionStore::open(SqliteStoreConfig::new(&path), policy(3)).unwrap();
    store.register(&CallerId::new("caller-1"), NOW).await.unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection.execute("UPDATE callers SET used = -4 WHERE caller_id = 'caller-1'", []).unwrap();
    }
    assert!(matches!(store.caller(&CallerId::new("caller-1")).await, Err(StoreError::Invalid(_))));
}

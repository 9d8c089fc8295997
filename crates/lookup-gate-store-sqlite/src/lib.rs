// crates/lookup-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Subscription Store
// Description: Durable SubscriptionStore backend using SQLite.
// Purpose: Persist caller subscriptions and quota usage across restarts.
// Dependencies: lookup-gate-core, rusqlite, tokio
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`lookup_gate_core::SubscriptionStore`]
//! that keeps one row per caller plus an append-only tier history. Every
//! mutation runs in an immediate transaction, so quota charges stay atomic
//! per caller even when several gateway processes share the database file.
//! Security posture: storage inputs are untrusted and validated on load.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSubscriptionStore;
pub use store::SqliteSyncMode;
pub use store::TierEvent;
pub use store::TierHistoryEntry;

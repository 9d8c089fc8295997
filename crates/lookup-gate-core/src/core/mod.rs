// crates/lookup-gate-core/src/core/mod.rs
// ============================================================================
// Module: Lookup Gate Core Types
// Description: Canonical lookup, subscription, result, and audit structures.
// Purpose: Provide stable, serializable types shared by every Lookup Gate crate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types are the canonical source of truth for the HTTP surface, the
//! store backends, and the provider client. They hold no I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod failure;
pub mod identifiers;
pub mod lookup;
pub mod schema;
pub mod state;
pub mod subscription;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEntry;
pub use audit::AuditOutcome;
pub use failure::AdmissionReason;
pub use failure::FailureCode;
pub use failure::FailureReport;
pub use failure::GateFailure;
pub use identifiers::CallerId;
pub use identifiers::RequestId;
pub use identifiers::TierId;
pub use lookup::LookupKind;
pub use lookup::LookupRequest;
pub use lookup::LookupSubmission;
pub use lookup::QueryError;
pub use schema::FieldSpec;
pub use schema::FieldValue;
pub use schema::Freshness;
pub use schema::NormalizedField;
pub use schema::NormalizedRecord;
pub use schema::NormalizedResult;
pub use state::DispatchState;
pub use state::Lifecycle;
pub use state::TransitionError;
pub use subscription::CallerRecord;
pub use subscription::CallerStatus;
pub use subscription::QuotaDecision;
pub use subscription::QuotaDenial;
pub use subscription::QuotaReceipt;
pub use subscription::QuotaWindow;
pub use subscription::SubscriptionPolicy;
pub use subscription::SubscriptionStats;
pub use subscription::SubscriptionStatus;
pub use subscription::TierGrant;
pub use subscription::TierPolicy;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use time::Timestamp;

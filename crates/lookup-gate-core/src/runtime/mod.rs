// crates/lookup-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Lookup Gate Runtime
// Description: Admission, quota ledger, normalization, and dispatch engine.
// Purpose: Execute lookups against the subscription store and external provider.
// Dependencies: crate::{core, interfaces}, tokio, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement the request path. Every inbound surface calls
//! [`LookupDispatcher`]; store backends share the [`ledger`] transitions so
//! quota semantics do not depend on the backend.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod admission;
pub mod dispatch;
pub mod ledger;
pub mod normalize;
pub mod rate_limit;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admission::AdmissionConfig;
pub use admission::AdmissionController;
pub use admission::AdmissionTicket;
pub use dispatch::DeadlineElapsed;
pub use dispatch::DispatchConfig;
pub use dispatch::DispatchOutcome;
pub use dispatch::LookupDispatcher;
pub use normalize::NormalizeError;
pub use normalize::PayloadShape;
pub use normalize::classify;
pub use normalize::normalize;
pub use rate_limit::RateDecision;
pub use rate_limit::RateLimiter;
pub use store::InMemoryAuditLog;
pub use store::InMemorySubscriptionStore;

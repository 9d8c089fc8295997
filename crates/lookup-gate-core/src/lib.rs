// crates/lookup-gate-core/src/lib.rs
// ============================================================================
// Module: Lookup Gate Core Library
// Description: Public API surface for the Lookup Gate core.
// Purpose: Expose core types, interfaces, and the dispatch runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Lookup Gate core receives identity-lookup requests, decides whether the
//! caller is entitled to run them, forwards them to one external provider,
//! and returns a normalized, audited result. Storage, the provider transport,
//! and audit destinations plug in through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditSink;
pub use interfaces::LookupProvider;
pub use interfaces::ProviderFailure;
pub use interfaces::ProviderResponse;
pub use interfaces::StoreError;
pub use interfaces::SubscriptionStore;
pub use runtime::AdmissionConfig;
pub use runtime::AdmissionController;
pub use runtime::AdmissionTicket;
pub use runtime::DeadlineElapsed;
pub use runtime::DispatchConfig;
pub use runtime::DispatchOutcome;
pub use runtime::InMemoryAuditLog;
pub use runtime::InMemorySubscriptionStore;
pub use runtime::LookupDispatcher;
pub use runtime::NormalizeError;
pub use runtime::PayloadShape;
pub use runtime::RateDecision;
pub use runtime::RateLimiter;

// crates/lookup-gate-server/src/lib.rs
// ============================================================================
// Module: Lookup Gate Server
// Description: HTTP surface for the lookup gateway.
// Purpose: Expose lookups, caller status, and administration over HTTP.
// Dependencies: axum, lookup-gate-core, lookup-gate-config, tracing
// ============================================================================

//! ## Overview
//! This crate assembles the gateway process: it builds the dispatcher from
//! configuration, exposes it through an axum router, writes audit entries,
//! and installs the tracing subscriber. Inputs are untrusted; every `/v1`
//! route can require a bearer token and admin routes require an admin caller.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod gateway;
pub mod routes;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FanoutAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::TracingAuditSink;
pub use audit::build_audit_sink;
pub use auth::CALLER_HEADER;
pub use gateway::Gateway;
pub use gateway::GatewayError;
pub use gateway::GrantRequest;
pub use routes::RouterSettings;
pub use routes::router;
pub use server::LookupServer;
pub use server::ServerError;
pub use telemetry::init_tracing;

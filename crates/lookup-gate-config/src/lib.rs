// crates/lookup-gate-config/src/lib.rs
// ============================================================================
// Module: Lookup Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for lookup-gate.toml semantics.
// Dependencies: lookup-gate-core, lookup-gate-providers, serde, toml
// ============================================================================

//! ## Overview
//! `lookup-gate-config` defines the configuration model for Lookup Gate. It
//! loads a TOML file, applies environment overrides, and validates the
//! result fail-closed before any component is built from it.
//!
//! Security posture: config inputs are untrusted; secrets never appear in
//! `Debug` output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod env;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use env::EnvSource;
pub use env::ProcessEnv;
pub use examples::config_toml_example;

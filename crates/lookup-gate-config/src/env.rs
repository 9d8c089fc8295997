// crates/lookup-gate-config/src/env.rs
// ============================================================================
// Module: Environment Sources
// Description: Strict environment variable access for config overrides.
// Purpose: Read overrides without touching process state in tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Overrides are read through [`EnvSource`]. [`ProcessEnv`] reads the real
//! process environment and rejects non-UTF-8 and empty values; map sources
//! let tests supply overrides without mutating the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Sources
// ============================================================================

/// Source of environment overrides.
pub trait EnvSource {
    /// Returns the value of `name`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value is not UTF-8 or empty.
    fn var(&self, name: &str) -> Result<Option<String>, ConfigError>;
}

/// Process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let Some(raw) = env::var_os(name) else {
            return Ok(None);
        };
        let value = raw
            .into_string()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be valid utf-8")))?;
        non_empty(name, value).map(Some)
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Result<Option<String>, ConfigError> {
        self.get(name).map(|value| non_empty(name, value.clone())).transpose()
    }
}

/// Rejects blank override values.
fn non_empty(name: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{name} must be non-empty when set")));
    }
    Ok(value)
}

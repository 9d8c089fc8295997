// crates/lookup-gate-server/src/auth.rs
// ============================================================================
// Module: Request Authentication
// Description: Bearer token and acting-caller header checks.
// Purpose: Gate `/v1` routes before any gateway work runs.
// Dependencies: axum, lookup-gate-core
// ============================================================================

//! ## Overview
//! Every `/v1` route requires the configured bearer token when one is set.
//! Admin routes also name the acting caller in [`CALLER_HEADER`]; whether
//! that caller is an admin is decided by the gateway.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use lookup_gate_core::CallerId;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header naming the acting caller on admin routes.
pub const CALLER_HEADER: &str = "x-lookup-gate-caller";
/// Maximum accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 1024;
/// Maximum accepted caller header size.
const MAX_CALLER_HEADER_BYTES: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Credentials are missing or wrong.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Checks the bearer token when one is configured.
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the token is missing or wrong.
pub fn authorize_bearer(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let token = parse_bearer_token(header)?;
    if token != expected.trim() {
        return Err(AuthError::Unauthenticated("invalid bearer token".to_string()));
    }
    Ok(())
}

/// Returns the acting caller named in [`CALLER_HEADER`].
///
/// # Errors
///
/// Returns [`AuthError::Unauthenticated`] when the header is missing or blank.
pub fn acting_caller(headers: &HeaderMap) -> Result<CallerId, AuthError> {
    let value = headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(AuthError::Unauthenticated(format!("missing {CALLER_HEADER} header")));
    }
    if value.len() > MAX_CALLER_HEADER_BYTES {
        return Err(AuthError::Unauthenticated(format!("{CALLER_HEADER} header too large")));
    }
    Ok(CallerId::new(value))
}

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/lookup-gate-core/src/core/lookup.rs
// ============================================================================
// Module: Lookup Requests
// Description: Lookup kinds, query canonicalization, and request records.
// Purpose: Reject malformed lookup values before any quota or provider work.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A lookup is one of four kinds. Each kind owns a canonical query form:
//! phone numbers are ten digits with any `+91` prefix removed, Aadhaar
//! numbers are twelve digits, vehicle registrations are uppercase without
//! separators, and UPI ids are `handle@psp`. Canonicalization runs before
//! admission so invalid input never consumes quota.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::CallerId;
use crate::core::identifiers::RequestId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted raw query length in bytes.
pub const MAX_QUERY_BYTES: usize = 255;

// ============================================================================
// SECTION: Lookup Kind
// ============================================================================

/// Supported lookup categories.
///
/// # Invariants
/// - Labels returned by [`LookupKind::as_str`] are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    /// Indian mobile number lookup.
    Phone,
    /// Vehicle registration lookup.
    Vehicle,
    /// Aadhaar number lookup.
    Aadhaar,
    /// UPI id lookup.
    Upi,
}

impl LookupKind {
    /// All lookup kinds in declaration order.
    pub const ALL: [Self; 4] = [Self::Phone, Self::Vehicle, Self::Aadhaar, Self::Upi];

    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Vehicle => "vehicle",
            Self::Aadhaar => "aadhaar",
            Self::Upi => "upi",
        }
    }

    /// Canonicalizes a raw query value for this kind.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the value does not match the kind's format.
    pub fn canonicalize(self, raw: &str) -> Result<String, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Empty);
        }
        if trimmed.len() > MAX_QUERY_BYTES {
            return Err(QueryError::TooLong {
                max: MAX_QUERY_BYTES,
            });
        }
        match self {
            Self::Phone => canonical_phone(trimmed),
            Self::Aadhaar => canonical_aadhaar(trimmed),
            Self::Vehicle => canonical_vehicle(trimmed),
            Self::Upi => canonical_upi(trimmed),
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookupKind {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "phone" | "number" => Ok(Self::Phone),
            "vehicle" => Ok(Self::Vehicle),
            "aadhaar" | "aadhar" => Ok(Self::Aadhaar),
            "upi" => Ok(Self::Upi),
            _ => Err(QueryError::UnsupportedKind(value.to_string())),
        }
    }
}

/// Query validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Query value was empty after trimming.
    #[error("query value is empty")]
    Empty,
    /// Query value exceeded the byte limit.
    #[error("query value exceeds {max} bytes")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },
    /// Query value did not match the kind's format.
    #[error("invalid {kind} value: {detail}")]
    Format {
        /// Lookup kind being validated.
        kind: LookupKind,
        /// Short description of the expected shape.
        detail: &'static str,
    },
    /// Lookup kind label is not supported.
    #[error("unsupported lookup kind: {0}")]
    UnsupportedKind(String),
}

// ============================================================================
// SECTION: Lookup Request
// ============================================================================

/// Lookup submission handed to the dispatcher by an inbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSubmission {
    /// Caller submitting the lookup.
    pub caller_id: CallerId,
    /// Lookup kind.
    pub kind: LookupKind,
    /// Raw query value as typed by the caller.
    pub query: String,
}

/// Lookup request owned by the dispatcher for one dispatch.
///
/// # Invariants
/// - Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupRequest {
    /// Request identifier.
    pub request_id: RequestId,
    /// Lookup kind.
    pub kind: LookupKind,
    /// Raw query value.
    pub query: String,
    /// Caller reference.
    pub caller_id: CallerId,
    /// Submission time.
    pub submitted_at: Timestamp,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes spaces and hyphens used as visual separators.
fn strip_separators(value: &str) -> String {
    value.chars().filter(|ch| !matches!(ch, ' ' | '-')).collect()
}

/// Canonicalizes a phone number to ten digits.
fn canonical_phone(value: &str) -> Result<String, QueryError> {
    let compact = strip_separators(value);
    let digits = compact.strip_prefix("+91").unwrap_or(&compact);
    if digits.len() == 10 && digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(digits.to_string());
    }
    Err(QueryError::Format {
        kind: LookupKind::Phone,
        detail: "expected 10 digits, optionally prefixed by +91",
    })
}

/// Canonicalizes an Aadhaar number to twelve digits.
fn canonical_aadhaar(value: &str) -> Result<String, QueryError> {
    let compact = strip_separators(value);
    if compact.len() == 12 && compact.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(compact);
    }
    Err(QueryError::Format {
        kind: LookupKind::Aadhaar,
        detail: "expected 12 digits",
    })
}

/// Canonicalizes a vehicle registration (e.g. `DL1CA1234`).
///
/// Accepts a 2 letter state code, 1 to 2 district digits, up to 2 series
/// letters, and a 4 digit number.
fn canonical_vehicle(value: &str) -> Result<String, QueryError> {
    let compact = strip_separators(value).to_ascii_uppercase();
    let bytes = compact.as_bytes();
    let err = QueryError::Format {
        kind: LookupKind::Vehicle,
        detail: "expected state code, district digits, series letters, and a 4 digit number",
    };
    if bytes.len() < 7 || !bytes[.. 2].iter().all(u8::is_ascii_uppercase) {
        return Err(err);
    }
    let rest = &bytes[2 ..];
    let Some(split) = rest.len().checked_sub(4) else {
        return Err(err);
    };
    let (middle, number) = rest.split_at(split);
    let district = middle.iter().take_while(|byte| byte.is_ascii_digit()).count();
    let series = &middle[district ..];
    let valid = (1 ..= 2).contains(&district)
        && series.len() <= 2
        && series.iter().all(u8::is_ascii_uppercase)
        && number.iter().all(u8::is_ascii_digit);
    if valid { Ok(compact) } else { Err(err) }
}

/// Validates a UPI id of the form `handle@psp`.
fn canonical_upi(value: &str) -> Result<String, QueryError> {
    let err = QueryError::Format {
        kind: LookupKind::Upi,
        detail: "expected handle@psp",
    };
    let Some((handle, psp)) = value.split_once('@') else {
        return Err(err);
    };
    let handle_ok = !handle.is_empty()
        && handle.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
    let psp_ok = !psp.is_empty()
        && psp.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-'));
    if handle_ok && psp_ok {
        return Ok(value.to_string());
    }
    Err(err)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/lookup-gate-core/src/core/failure.rs
// ============================================================================
// Module: Lookup Failure Taxonomy
// Description: Typed lookup failures with stable codes and caller messages.
// Purpose: Map every failure to a machine-stable code and a kind-agnostic message.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Components return [`GateFailure`] values; only the dispatcher turns them
//! into a [`FailureReport`] for callers. Reports never carry provider detail
//! strings. Detail is for logs and audit only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::subscription::QuotaDenial;

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Admission rejection reasons.
///
/// # Invariants
/// - Labels are stable wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    /// Per-caller requests-per-minute ceiling reached.
    RateLimited,
    /// Window quota used up.
    TierExhausted,
    /// Fixed-term tier expired.
    TierExpired,
    /// Caller is not registered.
    UnknownCaller,
    /// Global in-flight ceiling stayed full for the whole queue timeout.
    Saturated,
}

impl AdmissionReason {
    /// Returns the stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::TierExhausted => "tier_exhausted",
            Self::TierExpired => "tier_expired",
            Self::UnknownCaller => "unknown_caller",
            Self::Saturated => "saturated",
        }
    }
}

impl From<QuotaDenial> for AdmissionReason {
    fn from(value: QuotaDenial) -> Self {
        match value {
            QuotaDenial::TierExhausted => Self::TierExhausted,
            QuotaDenial::TierExpired => Self::TierExpired,
            QuotaDenial::UnknownCaller => Self::UnknownCaller,
        }
    }
}

/// Failure codes for requests that leave through `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Provider could not be reached within the retry budget.
    ProviderUnavailable,
    /// Query was rejected as invalid.
    InvalidQuery,
    /// Provider violated its response contract.
    MalformedResponse,
    /// Configuration or programming error.
    Internal,
}

impl FailureCode {
    /// Returns the stable label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::InvalidQuery => "invalid_query",
            Self::MalformedResponse => "malformed_response",
            Self::Internal => "internal",
        }
    }
}

// ============================================================================
// SECTION: Gate Failure
// ============================================================================

/// Typed lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateFailure {
    /// Admission rejected the request.
    #[error("admission denied: {}", reason.as_str())]
    AdmissionDenied {
        /// Rejection reason.
        reason: AdmissionReason,
        /// Suggested wait before retrying, when known.
        retry_after_ms: Option<u64>,
    },
    /// Provider unavailable after the retry budget.
    #[error("provider unavailable after {attempts} attempts")]
    ProviderUnavailable {
        /// Attempts performed.
        attempts: u32,
    },
    /// Query rejected as invalid, locally or by the provider.
    #[error("invalid query: {detail}")]
    InvalidQuery {
        /// Internal detail for logs.
        detail: String,
    },
    /// Provider response violated the contract.
    #[error("malformed provider response: {detail}")]
    MalformedResponse {
        /// Internal detail for logs.
        detail: String,
    },
    /// Internal error.
    #[error("internal error: {detail}")]
    Internal {
        /// Internal detail for logs.
        detail: String,
    },
}

impl GateFailure {
    /// Builds an admission denial without a retry hint.
    #[must_use]
    pub const fn denied(reason: AdmissionReason) -> Self {
        Self::AdmissionDenied {
            reason,
            retry_after_ms: None,
        }
    }

    /// Builds an internal failure.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Returns the stable failure code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AdmissionDenied {
                ..
            } => "admission_denied",
            Self::ProviderUnavailable {
                ..
            } => FailureCode::ProviderUnavailable.as_str(),
            Self::InvalidQuery {
                ..
            } => FailureCode::InvalidQuery.as_str(),
            Self::MalformedResponse {
                ..
            } => FailureCode::MalformedResponse.as_str(),
            Self::Internal {
                ..
            } => FailureCode::Internal.as_str(),
        }
    }

    /// Returns the admission reason for denials.
    #[must_use]
    pub const fn admission_reason(&self) -> Option<AdmissionReason> {
        match self {
            Self::AdmissionDenied {
                reason, ..
            } => Some(*reason),
            _ => None,
        }
    }

    /// Returns the failure code for non-admission failures.
    #[must_use]
    pub const fn failure_code(&self) -> Option<FailureCode> {
        match self {
            Self::AdmissionDenied {
                ..
            } => None,
            Self::ProviderUnavailable {
                ..
            } => Some(FailureCode::ProviderUnavailable),
            Self::InvalidQuery {
                ..
            } => Some(FailureCode::InvalidQuery),
            Self::MalformedResponse {
                ..
            } => Some(FailureCode::MalformedResponse),
            Self::Internal {
                ..
            } => Some(FailureCode::Internal),
        }
    }

    /// Returns the caller-facing message. Messages never name a lookup kind.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::AdmissionDenied {
                reason, ..
            } => match reason {
                AdmissionReason::RateLimited => {
                    "Too many requests. Please wait a moment and try again."
                }
                AdmissionReason::TierExhausted => {
                    "Your lookup quota for this period is used up. It resets at the start of the \
                     next period."
                }
                AdmissionReason::TierExpired => {
                    "Your subscription has expired. Contact an administrator to renew."
                }
                AdmissionReason::UnknownCaller => {
                    "You are not registered for lookups. Contact an administrator."
                }
                AdmissionReason::Saturated => "The service is busy. Please try again shortly.",
            },
            Self::ProviderUnavailable {
                ..
            } => "The lookup service is temporarily unavailable. Please try again later.",
            Self::InvalidQuery {
                ..
            } => "The lookup value is not valid. Check the input and try again.",
            Self::MalformedResponse {
                ..
            } => "The lookup could not be completed. Please try again later.",
            Self::Internal {
                ..
            } => "An internal error occurred. Please try again later.",
        }
    }

    /// Returns the caller-facing report.
    #[must_use]
    pub fn report(&self) -> FailureReport {
        let retry_after_ms = match self {
            Self::AdmissionDenied {
                retry_after_ms, ..
            } => *retry_after_ms,
            _ => None,
        };
        FailureReport {
            code: self.code().to_string(),
            reason: self.admission_reason().map(|reason| reason.as_str().to_string()),
            message: self.user_message().to_string(),
            retry_after_ms,
            retryable: self.is_retryable(),
        }
    }

    /// Returns true when the same request may succeed later without changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::AdmissionDenied {
                reason, ..
            } => !matches!(reason, AdmissionReason::UnknownCaller | AdmissionReason::TierExpired),
            Self::ProviderUnavailable {
                ..
            } => true,
            Self::InvalidQuery {
                ..
            }
            | Self::MalformedResponse {
                ..
            }
            | Self::Internal {
                ..
            } => false,
        }
    }
}

/// Caller-facing failure report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Machine-stable failure code.
    pub code: String,
    /// Admission reason label for denials.
    pub reason: Option<String>,
    /// Human-readable, kind-agnostic message.
    pub message: String,
    /// Suggested wait before retrying, when known.
    pub retry_after_ms: Option<u64>,
    /// Whether retrying later may succeed.
    pub retryable: bool,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_never_include_detail() {
        let failure = GateFailure::MalformedResponse {
            detail: "upstream sent <html>".to_string(),
        };
        let report = failure.report();
        assert_eq!(report.code, "malformed_response");
        assert!(!report.message.contains("html"));
        assert!(report.reason.is_none());
    }

    #[test]
    fn denial_report_carries_reason() {
        let failure = GateFailure::AdmissionDenied {
            reason: AdmissionReason::RateLimited,
            retry_after_ms: Some(1_500),
        };
        let report = failure.report();
        assert_eq!(report.code, "admission_denied");
        assert_eq!(report.reason.as_deref(), Some("rate_limited"));
        assert_eq!(report.retry_after_ms, Some(1_500));
        assert!(report.retryable);
    }

    #[test]
    fn messages_are_kind_agnostic() {
        let failures = [
            GateFailure::denied(AdmissionReason::TierExhausted),
            GateFailure::ProviderUnavailable {
                attempts: 3,
            },
            GateFailure::InvalidQuery {
                detail: String::new(),
            },
            GateFailure::internal("x"),
        ];
        for failure in failures {
            let message = failure.user_message().to_ascii_lowercase();
            for kind in ["phone", "vehicle", "aadhaar", "upi"] {
                assert!(!message.contains(kind));
            }
        }
    }
}

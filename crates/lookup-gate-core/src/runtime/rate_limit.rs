// crates/lookup-gate-core/src/runtime/rate_limit.rs
// ============================================================================
// Module: Per-Caller Rate Limiter
// Description: Token buckets enforcing a requests-per-minute ceiling per caller.
// Purpose: Bound request bursts from one caller independently of quota.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Each caller owns a token bucket whose capacity equals the tier's
//! requests-per-minute value and which refills continuously. The bucket map
//! is bounded; when full, the least recently seen caller is evicted, which
//! can only make the limiter more permissive for that caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::CallerId;
use crate::core::Timestamp;
use crate::core::time::MILLIS_PER_MINUTE;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of tracked callers.
pub const DEFAULT_MAX_TRACKED_CALLERS: usize = 10_000;
/// Bucket units per token.
const TOKEN_UNITS: u64 = MILLIS_PER_MINUTE.unsigned_abs();

// ============================================================================
// SECTION: Types
// ============================================================================

/// Rate limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request may proceed; one token was taken.
    Allowed,
    /// Bucket empty.
    Limited {
        /// Milliseconds until one token is available.
        retry_after_ms: u64,
    },
}

/// Token bucket state for one caller.
///
/// Levels are kept in token-milliseconds: one token equals
/// [`MILLIS_PER_MINUTE`] units and the bucket refills `per_minute` units per
/// millisecond, which keeps refill arithmetic exact.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Current level in token-milliseconds.
    level: u64,
    /// Last refill time in unix milliseconds.
    refilled_at_ms: i64,
}

/// Per-caller token bucket limiter.
///
/// # Invariants
/// - At most `max_entries` buckets are tracked.
/// - Tokens never exceed the bucket capacity.
#[derive(Debug)]
pub struct RateLimiter {
    /// Buckets keyed by caller.
    buckets: Mutex<HashMap<CallerId, Bucket>>,
    /// Maximum tracked callers.
    max_entries: usize,
}

impl RateLimiter {
    /// Creates a limiter tracking at most `max_entries` callers.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Takes one token for `caller` at `now` under a `per_minute` ceiling.
    ///
    /// A `per_minute` of zero disables the ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error string when the limiter lock is poisoned.
    pub fn check(
        &self,
        caller: &CallerId,
        per_minute: u32,
        now: Timestamp,
    ) -> Result<RateDecision, String> {
        if per_minute == 0 {
            return Ok(RateDecision::Allowed);
        }
        let per_minute = u64::from(per_minute);
        let capacity = per_minute * TOKEN_UNITS;
        let now_ms = now.as_unix_millis();
        let mut buckets =
            self.buckets.lock().map_err(|_| "rate limiter mutex poisoned".to_string())?;
        if !buckets.contains_key(caller) && buckets.len() >= self.max_entries {
            evict_oldest(&mut buckets);
        }
        let bucket = buckets.entry(caller.clone()).or_insert(Bucket {
            level: capacity,
            refilled_at_ms: now_ms,
        });
        let elapsed = u64::try_from(now_ms.saturating_sub(bucket.refilled_at_ms)).unwrap_or(0);
        bucket.level = bucket.level.saturating_add(elapsed.saturating_mul(per_minute)).min(capacity);
        bucket.refilled_at_ms = bucket.refilled_at_ms.max(now_ms);
        if bucket.level >= TOKEN_UNITS {
            bucket.level -= TOKEN_UNITS;
            return Ok(RateDecision::Allowed);
        }
        let deficit = TOKEN_UNITS - bucket.level;
        Ok(RateDecision::Limited {
            retry_after_ms: deficit.div_ceil(per_minute),
        })
    }

    /// Returns the number of tracked callers.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.buckets.lock().map(|buckets| buckets.len()).unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED_CALLERS)
    }
}

/// Removes the bucket refilled longest ago.
fn evict_oldest(buckets: &mut HashMap<CallerId, Bucket>) {
    let oldest = buckets
        .iter()
        .min_by_key(|(_, bucket)| bucket.refilled_at_ms)
        .map(|(caller, _)| caller.clone());
    if let Some(caller) = oldest {
        buckets.remove(&caller);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

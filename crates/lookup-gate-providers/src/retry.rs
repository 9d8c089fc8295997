// crates/lookup-gate-providers/src/retry.rs
// ============================================================================
// Module: Provider Retry Schedule
// Description: Bounded exponential backoff with jitter for provider calls.
// Purpose: Drive provider attempts through an explicit, testable state machine.
// Dependencies: async-trait, rand, serde, tokio
// ============================================================================

//! ## Overview
//! [`RetrySchedule`] tracks one call's attempts. The caller asks for the next
//! attempt, reports whether it failed transiently, and receives either a
//! backoff delay or a give-up verdict. Sleeping and randomness sit behind the
//! [`Sleeper`] and [`JitterSource`] seams so schedules replay
//! deterministically in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default attempt budget per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Retry policy for provider calls.
///
/// # Invariants
/// - `max_attempts` is at least one; a policy with zero attempts behaves as one.
/// - `jitter_percent` is clamped to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling for a single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
    /// Share of each delay that may be shaved off at random, in percent.
    pub jitter_percent: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: 2,
            jitter_percent: 20,
        }
    }
}

impl RetryPolicy {
    /// Returns the un-jittered delay after `failed_attempt` attempts.
    #[must_use]
    pub fn nominal_delay_ms(&self, failed_attempt: u32) -> u64 {
        let exponent = failed_attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms)
    }
}

// ============================================================================
// SECTION: Seams
// ============================================================================

/// Randomness used to spread retries.
pub trait JitterSource: Send + Sync {
    /// Returns a value in `0 ..= max_ms`.
    fn sample(&self, max_ms: u64) -> u64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self, max_ms: u64) -> u64 {
        if max_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0 ..= max_ms)
    }
}

/// Jitter that never shortens a delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&self, _max_ms: u64) -> u64 {
        0
    }
}

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

// ============================================================================
// SECTION: Schedule
// ============================================================================

/// Schedule state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Next attempt may start.
    Ready {
        /// Number the next attempt will carry.
        next_attempt: u32,
    },
    /// Attempt in flight.
    InFlight {
        /// Attempt number.
        attempt: u32,
    },
    /// No further attempts.
    Finished {
        /// Attempts performed.
        attempts: u32,
    },
}

/// Verdict after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Wait, then try again.
    Retry {
        /// Number the next attempt will carry.
        next_attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// Attempt budget spent.
    GiveUp {
        /// Attempts performed.
        attempts: u32,
    },
}

/// Bounded retry schedule for one provider call.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    /// Retry policy.
    policy: RetryPolicy,
    /// Current state.
    state: RetryState,
}

impl RetrySchedule {
    /// Starts a schedule ready for the first attempt.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Ready {
                next_attempt: 1,
            },
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RetryState {
        self.state
    }

    /// Returns the attempts started so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self.state {
            RetryState::Ready {
                next_attempt,
            } => next_attempt - 1,
            RetryState::InFlight {
                attempt,
            } => attempt,
            RetryState::Finished {
                attempts,
            } => attempts,
        }
    }

    /// Starts the next attempt, returning its number.
    ///
    /// Returns `None` once the schedule has finished or while an attempt is
    /// already in flight.
    pub const fn begin(&mut self) -> Option<u32> {
        match self.state {
            RetryState::Ready {
                next_attempt,
            } => {
                self.state = RetryState::InFlight {
                    attempt: next_attempt,
                };
                Some(next_attempt)
            }
            RetryState::InFlight {
                ..
            }
            | RetryState::Finished {
                ..
            } => None,
        }
    }

    /// Records a transient failure of the in-flight attempt.
    pub fn fail_transient(&mut self, jitter: &dyn JitterSource) -> RetryStep {
        let attempt = self.attempts();
        if attempt >= self.policy.max_attempts.max(1) {
            self.state = RetryState::Finished {
                attempts: attempt,
            };
            return RetryStep::GiveUp {
                attempts: attempt,
            };
        }
        let nominal = self.policy.nominal_delay_ms(attempt);
        let spread = nominal.saturating_mul(u64::from(self.policy.jitter_percent.min(100))) / 100;
        let delay_ms = nominal.saturating_sub(jitter.sample(spread).min(spread));
        self.state = RetryState::Ready {
            next_attempt: attempt + 1,
        };
        RetryStep::Retry {
            next_attempt: attempt + 1,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Records a final outcome of the in-flight attempt.
    pub const fn finish(&mut self) {
        self.state = RetryState::Finished {
            attempts: self.attempts(),
        };
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MaxJitter;

    impl JitterSource for MaxJitter {
        fn sample(&self, max_ms: u64) -> u64 {
            max_ms
        }
    }

    #[test]
    fn schedule_gives_up_after_budget() {
        let mut schedule = RetrySchedule::new(RetryPolicy::default());
        let mut delays = Vec::new();
        while let Some(attempt) = schedule.begin() {
            match schedule.fail_transient(&NoJitter) {
                RetryStep::Retry {
                    next_attempt,
                    delay,
                } => {
                    assert_eq!(next_attempt, attempt + 1);
                    delays.push(delay);
                }
                RetryStep::GiveUp {
                    attempts,
                } => assert_eq!(attempts, 3),
            }
        }
        assert_eq!(delays, vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]);
        assert_eq!(schedule.state(), RetryState::Finished {
            attempts: 3
        });
    }

    #[test]
    fn delays_are_capped_and_jittered_downward() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 3_000,
            multiplier: 2,
            jitter_percent: 50,
        };
        assert_eq!(policy.nominal_delay_ms(1), 1_000);
        assert_eq!(policy.nominal_delay_ms(3), 3_000);
        assert_eq!(policy.nominal_delay_ms(30), 3_000);
        let mut schedule = RetrySchedule::new(policy);
        assert_eq!(schedule.begin(), Some(1));
        assert_eq!(schedule.fail_transient(&MaxJitter), RetryStep::Retry {
            next_attempt: 2,
            delay: Duration::from_millis(500),
        });
    }

    #[test]
    fn finish_stops_the_schedule() {
        let mut schedule = RetrySchedule::new(RetryPolicy::default());
        assert_eq!(schedule.begin(), Some(1));
        assert_eq!(schedule.begin(), None);
        schedule.finish();
        assert_eq!(schedule.begin(), None);
        assert_eq!(schedule.attempts(), 1);
    }

    #[test]
    fn zero_attempt_policy_still_tries_once() {
        let mut schedule = RetrySchedule::new(RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        });
        assert_eq!(schedule.begin(), Some(1));
        assert_eq!(schedule.fail_transient(&NoJitter), RetryStep::GiveUp {
            attempts: 1
        });
    }

    #[test]
    fn random_jitter_stays_in_range() {
        for _ in 0 .. 100 {
            assert!(RandomJitter.sample(10) <= 10);
        }
        assert_eq!(RandomJitter.sample(0), 0);
    }
}

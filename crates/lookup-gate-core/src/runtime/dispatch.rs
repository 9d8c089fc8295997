// crates/lookup-gate-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Lookup Dispatcher
// Description: Per-request state machine sequencing admission, provider, and normalization.
// Purpose: Turn one lookup submission into exactly one terminal outcome and audit entry.
// Dependencies: crate::core, crate::interfaces, crate::runtime, tokio, tracing
// ============================================================================

//! ## Overview
//! [`LookupDispatcher::dispatch`] runs every request on its own tokio task.
//! The task walks the request through `Received → Admitted → Dispatched →
//! Normalized → Completed`, leaving through `Rejected` or `Failed` on the
//! first error, and writes exactly one [`AuditEntry`] when it settles. If the
//! caller stops waiting, the task still finishes and still audits.
//!
//! Quota charged at admission is returned only when no provider attempt was
//! made. Once the provider has been contacted the charge stands, whatever the
//! outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::AuditEntry;
use crate::core::AuditOutcome;
use crate::core::Clock;
use crate::core::DispatchState;
use crate::core::FailureCode;
use crate::core::FailureReport;
use crate::core::GateFailure;
use crate::core::Lifecycle;
use crate::core::LookupKind;
use crate::core::LookupRequest;
use crate::core::LookupSubmission;
use crate::core::NormalizedResult;
use crate::core::RequestId;
use crate::core::Timestamp;
use crate::core::TransitionError;
use crate::core::audit::LOOKUP_AUDIT_EVENT;
use crate::interfaces::AuditSink;
use crate::interfaces::LookupProvider;
use crate::interfaces::ProviderFailure;
use crate::interfaces::SubscriptionStore;
use crate::runtime::admission::AdmissionConfig;
use crate::runtime::admission::AdmissionController;
use crate::runtime::admission::AdmissionTicket;
use crate::runtime::normalize::normalize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Dispatcher behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Register unknown callers on first contact.
    pub auto_register: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            auto_register: true,
        }
    }
}

/// Terminal outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Request identifier.
    pub request_id: RequestId,
    /// Lookup kind.
    pub kind: LookupKind,
    /// Terminal state.
    pub state: DispatchState,
    /// Canonical result or typed failure.
    pub result: Result<NormalizedResult, GateFailure>,
    /// States visited.
    pub path: Vec<DispatchState>,
    /// Whether the admin override applied.
    pub admin: bool,
    /// Provider attempts performed.
    pub provider_attempts: u32,
    /// Quota units remaining after the charge, for non-admin callers.
    pub quota_remaining: Option<u32>,
}

impl DispatchOutcome {
    /// Returns the caller-facing failure report, if the lookup failed.
    #[must_use]
    pub fn report(&self) -> Option<FailureReport> {
        self.result.as_ref().err().map(GateFailure::report)
    }
}

/// The caller stopped waiting before the lookup settled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lookup {request_id} still running after the caller deadline")]
pub struct DeadlineElapsed {
    /// Request that kept running.
    pub request_id: RequestId,
}

/// Side facts collected while a request runs.
#[derive(Debug, Default)]
struct DispatchTrace {
    /// Whether the admin override applied.
    admin: bool,
    /// Provider attempts performed.
    attempts: u32,
    /// Units charged at admission.
    charged: u32,
    /// Whether the charge was refunded.
    refunded: bool,
    /// Units remaining after the charge.
    remaining: Option<u32>,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Lookup dispatcher.
#[derive(Clone)]
pub struct LookupDispatcher {
    /// Shared dispatcher state.
    inner: Arc<DispatcherInner>,
}

/// Shared dispatcher state moved into each request task.
struct DispatcherInner {
    /// Subscription store.
    store: Arc<dyn SubscriptionStore>,
    /// External provider.
    provider: Arc<dyn LookupProvider>,
    /// Audit destination.
    audit: Arc<dyn AuditSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Admission controller.
    admission: AdmissionController,
    /// Behavior switches.
    config: DispatchConfig,
    /// Request sequence for identifiers.
    sequence: AtomicU64,
}

impl LookupDispatcher {
    /// Builds a dispatcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        provider: Arc<dyn LookupProvider>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        admission: AdmissionConfig,
        config: DispatchConfig,
    ) -> Self {
        let admission = AdmissionController::new(admission, Arc::clone(&store), Arc::clone(&clock));
        Self {
            inner: Arc::new(DispatcherInner {
                store,
                provider,
                audit,
                clock,
                admission,
                config,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the subscription store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.inner.store
    }

    /// Returns the time source.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Returns the admission controller.
    #[must_use]
    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    /// Runs one lookup to a terminal outcome.
    pub async fn dispatch(&self, submission: LookupSubmission) -> DispatchOutcome {
        let request = self.inner.receive(submission);
        let task = tokio::spawn(Arc::clone(&self.inner).run(request.clone()));
        self.inner.joined(&request, task.await)
    }

    /// Runs one lookup, waiting at most `deadline` for the outcome.
    ///
    /// The lookup keeps running after the deadline and is audited when it
    /// settles.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineElapsed`] when the deadline passes first.
    pub async fn dispatch_within(
        &self,
        submission: LookupSubmission,
        deadline: Duration,
    ) -> Result<DispatchOutcome, DeadlineElapsed> {
        let request = self.inner.receive(submission);
        let task = tokio::spawn(Arc::clone(&self.inner).run(request.clone()));
        match tokio::time::timeout(deadline, task).await {
            Ok(joined) => Ok(self.inner.joined(&request, joined)),
            Err(_) => {
                warn!(request_id = %request.request_id, "caller deadline elapsed; lookup continues");
                Err(DeadlineElapsed {
                    request_id: request.request_id,
                })
            }
        }
    }
}

impl DispatcherInner {
    /// Stamps a submission with an identifier and receipt time.
    fn receive(&self, submission: LookupSubmission) -> LookupRequest {
        let submitted_at = self.clock.now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        LookupRequest {
            request_id: RequestId::new(format!(
                "lk-{}-{sequence}",
                submitted_at.as_unix_millis()
            )),
            kind: submission.kind,
            query: submission.query,
            caller_id: submission.caller_id,
            submitted_at,
        }
    }

    /// Runs the request state machine and audits the terminal state.
    async fn run(self: Arc<Self>, request: LookupRequest) -> DispatchOutcome {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new();
        let mut trace = DispatchTrace::default();
        let result = self.execute(&request, &mut lifecycle, &mut trace).await;
        let state = settle(&mut lifecycle, &result);
        log_terminal(&request, state, &result);
        self.audit.record(&AuditEntry {
            event: LOOKUP_AUDIT_EVENT.to_string(),
            request_id: request.request_id.clone(),
            caller_id: request.caller_id.clone(),
            kind: request.kind,
            timestamp: request.submitted_at,
            outcome: AuditOutcome::from_state(state),
            state,
            reason: terminal_reason(state),
            provider_attempts: trace.attempts,
            latency_ms: elapsed_ms(started),
            admin: trace.admin,
            quota_charged: if trace.refunded { 0 } else { trace.charged },
            quota_refunded: trace.refunded,
        });
        DispatchOutcome {
            request_id: request.request_id,
            kind: request.kind,
            state,
            result,
            path: lifecycle.path().to_vec(),
            admin: trace.admin,
            provider_attempts: trace.attempts,
            quota_remaining: trace.remaining,
        }
    }

    /// Sequences canonicalization, admission, the provider call, and normalization.
    async fn execute(
        &self,
        request: &LookupRequest,
        lifecycle: &mut Lifecycle,
        trace: &mut DispatchTrace,
    ) -> Result<NormalizedResult, GateFailure> {
        let query = request.kind.canonicalize(&request.query).map_err(|err| {
            GateFailure::InvalidQuery {
                detail: err.to_string(),
            }
        })?;
        if self.config.auto_register {
            self.store
                .register(&request.caller_id, request.submitted_at)
                .await
                .map_err(|err| GateFailure::internal(format!("caller registration: {err}")))?;
        }
        let ticket = self.admission.admit(&request.caller_id, request.kind).await?;
        trace.admin = ticket.is_admin();
        trace.charged = ticket.receipt().map_or(0, |receipt| receipt.cost);
        trace.remaining = ticket.remaining();
        if let Err(err) =
            lifecycle.advance(DispatchState::Admitted).and_then(|_| {
                lifecycle.advance(DispatchState::Dispatched)
            })
        {
            self.refund(&ticket, trace).await;
            return Err(transition_failure(err));
        }
        let response = match self.provider.call(request.kind, &query).await {
            Ok(response) => response,
            Err(failure) => {
                trace.attempts = failure.attempts();
                if failure.attempts() == 0 {
                    self.refund(&ticket, trace).await;
                } else {
                    self.record_usage(request).await;
                }
                return Err(provider_failure(request, failure));
            }
        };
        trace.attempts = response.attempts;
        ticket.release();
        let fetched_at = self.record_usage(request).await;
        let result = normalize(request.kind, &response.payload, fetched_at)?;
        lifecycle.advance(DispatchState::Normalized).map_err(transition_failure)?;
        lifecycle.advance(DispatchState::Completed).map_err(transition_failure)?;
        Ok(result)
    }

    /// Counts a lookup that reached the provider and returns the usage time.
    async fn record_usage(&self, request: &LookupRequest) -> Timestamp {
        let now = self.clock.now();
        if let Err(err) = self.store.record_usage(&request.caller_id, now).await {
            warn!(request_id = %request.request_id, error = %err, "usage not recorded");
        }
        now
    }

    /// Returns the admission charge when no provider work happened.
    async fn refund(&self, ticket: &AdmissionTicket, trace: &mut DispatchTrace) {
        let Some(receipt) = ticket.receipt() else {
            return;
        };
        match self.store.refund_quota(receipt).await {
            Ok(refunded) => {
                trace.refunded = refunded;
                if refunded {
                    trace.remaining = trace.remaining.map(|left| left.saturating_add(receipt.cost));
                }
            }
            Err(err) => warn!(caller = %receipt.caller_id, error = %err, "quota refund failed"),
        }
    }

    /// Converts a joined request task into an outcome.
    fn joined(
        &self,
        request: &LookupRequest,
        joined: Result<DispatchOutcome, JoinError>,
    ) -> DispatchOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(err) => self.abandon(request, &err),
        }
    }

    /// Audits a request whose task ended without settling.
    fn abandon(&self, request: &LookupRequest, err: &JoinError) -> DispatchOutcome {
        error!(request_id = %request.request_id, error = %err, "lookup task ended abnormally");
        let state = DispatchState::Failed(FailureCode::Internal);
        self.audit.record(&AuditEntry {
            event: LOOKUP_AUDIT_EVENT.to_string(),
            request_id: request.request_id.clone(),
            caller_id: request.caller_id.clone(),
            kind: request.kind,
            timestamp: request.submitted_at,
            outcome: AuditOutcome::Failed,
            state,
            reason: terminal_reason(state),
            provider_attempts: 0,
            latency_ms: self.clock.now().millis_since(request.submitted_at),
            admin: false,
            quota_charged: 0,
            quota_refunded: false,
        });
        DispatchOutcome {
            request_id: request.request_id.clone(),
            kind: request.kind,
            state,
            result: Err(GateFailure::internal("lookup task ended abnormally")),
            path: vec![DispatchState::Received, state],
            admin: false,
            provider_attempts: 0,
            quota_remaining: None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Moves the lifecycle to its terminal state.
fn settle(
    lifecycle: &mut Lifecycle,
    result: &Result<NormalizedResult, GateFailure>,
) -> DispatchState {
    let Err(failure) = result else {
        return lifecycle.current();
    };
    let terminal = match failure.admission_reason() {
        Some(reason) => DispatchState::Rejected(reason),
        None => DispatchState::Failed(failure.failure_code().unwrap_or(FailureCode::Internal)),
    };
    let fallback = DispatchState::Failed(FailureCode::Internal);
    lifecycle.advance(terminal).or_else(|_| lifecycle.advance(fallback)).unwrap_or(fallback)
}

/// Returns the reason label recorded for a terminal state.
fn terminal_reason(state: DispatchState) -> Option<String> {
    match state {
        DispatchState::Failed(code) => Some(code.as_str().to_string()),
        DispatchState::Rejected(reason) => Some(reason.as_str().to_string()),
        _ => None,
    }
}

/// Maps terminal provider failures onto the gate taxonomy.
fn provider_failure(request: &LookupRequest, failure: ProviderFailure) -> GateFailure {
    match failure {
        ProviderFailure::Unavailable {
            attempts,
            detail,
        } => {
            warn!(request_id = %request.request_id, attempts, detail = %detail, "provider unavailable");
            GateFailure::ProviderUnavailable {
                attempts,
            }
        }
        ProviderFailure::Rejected {
            status,
            detail,
            ..
        } => GateFailure::InvalidQuery {
            detail: format!("provider status {status}: {detail}"),
        },
        ProviderFailure::Unauthorized {
            status, ..
        } => GateFailure::internal(format!("provider refused credentials with status {status}")),
        ProviderFailure::Malformed {
            detail, ..
        } => GateFailure::MalformedResponse {
            detail,
        },
        ProviderFailure::Misconfigured(detail) => GateFailure::internal(detail),
    }
}

/// Maps an illegal transition onto an internal failure.
fn transition_failure(err: TransitionError) -> GateFailure {
    GateFailure::internal(err.to_string())
}

/// Emits one log event for the terminal state.
fn log_terminal(
    request: &LookupRequest,
    state: DispatchState,
    result: &Result<NormalizedResult, GateFailure>,
) {
    match result {
        Ok(normalized) => info!(
            request_id = %request.request_id,
            caller = %request.caller_id,
            kind = request.kind.as_str(),
            records = normalized.records.len(),
            "lookup completed"
        ),
        Err(failure @ GateFailure::MalformedResponse {
            ..
        }) => error!(
            request_id = %request.request_id,
            kind = request.kind.as_str(),
            error = %failure,
            "provider response malformed"
        ),
        Err(failure) => info!(
            request_id = %request.request_id,
            caller = %request.caller_id,
            kind = request.kind.as_str(),
            state = state.label(),
            code = failure.code(),
            "lookup ended without result"
        ),
    }
}

/// Returns elapsed milliseconds since `started`.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// crates/lookup-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Lookup Gate Test Fixtures
// Description: Shared fake providers and dispatcher harness for integration tests.
// ============================================================================
//! ## Overview
//! Scripted and gated providers plus a harness wiring them to the in-memory
//! store, audit log, and a manual clock.

#![allow(dead_code, reason = "Each test binary uses a different subset of fixtures.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use lookup_gate_core::AdmissionConfig;
use lookup_gate_core::CallerId;
use lookup_gate_core::DispatchConfig;
use lookup_gate_core::InMemoryAuditLog;
use lookup_gate_core::InMemorySubscriptionStore;
use lookup_gate_core::LookupDispatcher;
use lookup_gate_core::LookupKind;
use lookup_gate_core::LookupProvider;
use lookup_gate_core::LookupSubmission;
use lookup_gate_core::ManualClock;
use lookup_gate_core::ProviderFailure;
use lookup_gate_core::ProviderResponse;
use lookup_gate_core::QuotaWindow;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::TierId;
use lookup_gate_core::TierPolicy;
use lookup_gate_core::Timestamp;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Semaphore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed start time for manual clocks.
pub const START: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

// ============================================================================
// SECTION: Providers
// ============================================================================

/// Provider replaying scripted results, then a default payload.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderFailure>>>,
    fallback: Value,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(fallback: Value) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    pub fn push(&self, result: Result<ProviderResponse, ProviderFailure>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupProvider for ScriptedProvider {
    async fn call(
        &self,
        _kind: LookupKind,
        _query: &str,
    ) -> Result<ProviderResponse, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(ok_response(self.fallback.clone())))
    }
}

/// Provider that blocks every call until the test opens the gate.
pub struct GatedProvider {
    gate: Semaphore,
    entered: AtomicU32,
    payload: Value,
}

impl GatedProvider {
    pub fn new(payload: Value) -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: AtomicU32::new(0),
            payload,
        }
    }

    /// Lets `count` blocked calls finish.
    pub fn open(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn entered(&self) -> u32 {
        self.entered.load(Ordering::SeqCst)
    }

    /// Waits until `count` calls have reached the provider.
    pub async fn wait_entered(&self, count: u32) {
        for _ in 0 .. 500 {
            if self.entered() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("provider saw {} calls, expected {count}", self.entered());
    }
}

#[async_trait]
impl LookupProvider for GatedProvider {
    async fn call(
        &self,
        _kind: LookupKind,
        _query: &str,
    ) -> Result<ProviderResponse, ProviderFailure> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.unwrap();
        permit.forget();
        Ok(ok_response(self.payload.clone()))
    }
}

pub fn ok_response(payload: Value) -> ProviderResponse {
    ProviderResponse {
        payload,
        status: 200,
        attempts: 1,
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

pub fn phone_payload() -> Value {
    json!({
        "success": true,
        "data": [{"name": "Asha Verma", "mobile": "1234567890", "circle": "MH"}]
    })
}

pub fn aadhaar_payload() -> Value {
    json!({"data": {"name": "Asha Verma", "gender": "F", "state": "Maharashtra"}})
}

// ============================================================================
// SECTION: Harness
// ============================================================================

pub fn policy(quota: u32, per_minute: u32) -> SubscriptionPolicy {
    SubscriptionPolicy::new(QuotaWindow::daily(330), TierPolicy {
        id: TierId::new("free"),
        quota_per_window: quota,
        requests_per_minute: per_minute,
    })
    .with_tier(TierPolicy {
        id: TierId::new("premium"),
        quota_per_window: 500,
        requests_per_minute: 0,
    })
}

pub struct Harness {
    pub dispatcher: LookupDispatcher,
    pub store: Arc<InMemorySubscriptionStore>,
    pub audit: InMemoryAuditLog,
    pub clock: Arc<ManualClock>,
}

pub fn harness(
    policy: SubscriptionPolicy,
    provider: Arc<dyn LookupProvider>,
    admission: AdmissionConfig,
    config: DispatchConfig,
) -> Harness {
    let store = Arc::new(InMemorySubscriptionStore::new(policy));
    let audit = InMemoryAuditLog::new();
    let clock = Arc::new(ManualClock::new(START));
    let dispatcher = LookupDispatcher::new(
        store.clone(),
        provider,
        Arc::new(audit.clone()),
        clock.clone(),
        admission,
        config,
    );
    Harness {
        dispatcher,
        store,
        audit,
        clock,
    }
}

pub fn admission(max_inflight: usize, queue_timeout: Duration) -> AdmissionConfig {
    AdmissionConfig {
        max_inflight,
        queue_timeout,
        ..AdmissionConfig::default()
    }
}

pub fn submission(caller: &str, kind: LookupKind, query: &str) -> LookupSubmission {
    LookupSubmission {
        caller_id: CallerId::new(caller),
        kind,
        query: query.to_string(),
    }
}

/// Waits until the audit log holds `count` entries.
pub async fn wait_for_audit(audit: &InMemoryAuditLog, count: usize) {
    for _ in 0 .. 500 {
        if audit.entries().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("audit log holds {} entries, expected {count}", audit.entries().len());
}

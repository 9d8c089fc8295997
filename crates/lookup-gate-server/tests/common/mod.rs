// crates/lookup-gate-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Fixtures
// Description: Scripted provider and router harness for HTTP tests.
// ============================================================================
//! ## Overview
//! Builds a gateway over the in-memory store, an in-memory audit log, a
//! manual clock, and a scripted provider, then drives the router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use lookup_gate_core::AdmissionConfig;
use lookup_gate_core::CallerId;
use lookup_gate_core::DispatchConfig;
use lookup_gate_core::InMemoryAuditLog;
use lookup_gate_core::InMemorySubscriptionStore;
use lookup_gate_core::LookupDispatcher;
use lookup_gate_core::LookupKind;
use lookup_gate_core::LookupProvider;
use lookup_gate_core::ManualClock;
use lookup_gate_core::ProviderFailure;
use lookup_gate_core::ProviderResponse;
use lookup_gate_core::QuotaWindow;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::TierId;
use lookup_gate_core::TierPolicy;
use lookup_gate_core::Timestamp;
use lookup_gate_server::Gateway;
use lookup_gate_server::RouterSettings;
use lookup_gate_server::router;
use serde_json::Value;
use serde_json::json;
use tower::ServiceExt;

/// Fixed start time for manual clocks.
pub const START: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);
/// Bearer token used by harnesses that enable auth.
pub const TOKEN: &str = "tok-test";
/// Configured admin caller.
pub const ADMIN: &str = "1001";

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Provider replaying scripted results, then a phone payload.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderFailure>>>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
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
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ProviderResponse {
                payload: phone_payload(),
                status: 200,
                attempts: 1,
            })
        })
    }
}

pub fn phone_payload() -> Value {
    json!({
        "success": true,
        "data": [{"name": "Asha Verma", "mobile": "1234567890", "circle": "MH"}]
    })
}

// ============================================================================
// SECTION: Harness
// ============================================================================

pub fn policy(quota: u32) -> SubscriptionPolicy {
    SubscriptionPolicy::new(QuotaWindow::daily(-330), TierPolicy {
        id: TierId::new("free"),
        quota_per_window: quota,
        requests_per_minute: 0,
    })
    .with_tier(TierPolicy {
        id: TierId::new("premium"),
        quota_per_window: 500,
        requests_per_minute: 0,
    })
}

pub struct Harness {
    pub app: Router,
    pub gateway: Arc<Gateway>,
    pub store: Arc<InMemorySubscriptionStore>,
    pub audit: InMemoryAuditLog,
    pub clock: Arc<ManualClock>,
    pub provider: Arc<ScriptedProvider>,
}

pub struct HarnessOptions {
    pub quota: u32,
    pub bearer_token: Option<String>,
    pub auto_register: bool,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            quota: 3,
            bearer_token: None,
            auto_register: true,
            request_timeout: Duration::from_secs(5),
            max_body_bytes: 16 * 1024,
        }
    }
}

pub async fn harness(options: HarnessOptions) -> Harness {
    harness_with(options, Arc::new(ScriptedProvider::new())).await
}

pub async fn harness_with(options: HarnessOptions, provider: Arc<ScriptedProvider>) -> Harness {
    let store = Arc::new(InMemorySubscriptionStore::new(policy(options.quota)));
    let audit = InMemoryAuditLog::new();
    let clock = Arc::new(ManualClock::new(START));
    let dispatcher = LookupDispatcher::new(
        store.clone(),
        provider.clone(),
        Arc::new(audit.clone()),
        clock.clone(),
        AdmissionConfig::default(),
        DispatchConfig {
            auto_register: options.auto_register,
        },
    );
    let gateway =
        Arc::new(Gateway::new(dispatcher, [CallerId::new(ADMIN)], options.request_timeout));
    gateway.bootstrap_admins().await.unwrap();
    let app = router(Arc::clone(&gateway), RouterSettings {
        max_body_bytes: options.max_body_bytes,
        bearer_token: options.bearer_token,
    });
    Harness {
        app,
        gateway,
        store,
        audit,
        clock,
        provider,
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, headers: &[(&str, &str)], body: &Value) -> Request<Body> {
    post_raw(uri, headers, body.to_string())
}

pub fn post_raw(uri: &str, headers: &[(&str, &str)], body: String) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Sends one request and returns the status and JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

pub fn lookup_body(caller: &str, kind: &str, query: &str) -> Value {
    json!({"caller_id": caller, "kind": kind, "query": query})
}

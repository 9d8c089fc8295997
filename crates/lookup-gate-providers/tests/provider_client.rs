// crates/lookup-gate-providers/tests/provider_client.rs
// ============================================================================
// Module: Provider Client Tests
// Description: End-to-end client behavior against a local HTTP server.
// Purpose: Validate retry budgets, classification, limits, and key redaction.
// Dependencies: lookup-gate-providers, lookup-gate-core, tiny_http
// ============================================================================

//! ## Overview
//! Drives [`lookup_gate_providers::ProviderClient`] against scripted local
//! servers. Backoff delays are recorded, not slept, so retry schedules are
//! asserted exactly.
//!
//! Security posture: the provider is adversary-controlled; oversized and
//! malformed bodies must fail closed and the API key must never be observed.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::time::Duration;

use lookup_gate_core::LookupKind;
use lookup_gate_core::LookupProvider;
use lookup_gate_core::ProviderFailure;
use lookup_gate_providers::AttemptOutcome;
use lookup_gate_providers::HttpTransportConfig;
use lookup_gate_providers::RetryPolicy;
use serde_json::json;

use crate::common::Reply;
use crate::common::closed_url;
use crate::common::fixture;
use crate::common::local_transport;
use crate::common::spawn_server;

// ============================================================================
// SECTION: Happy Path
// ============================================================================

#[tokio::test]
async fn success_returns_payload_on_first_attempt() {
    let server = spawn_server(vec![Reply::new(200, r#"{"success":true,"data":[{"name":"A"}]}"#)]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    let response = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.payload, json!({"success": true, "data": [{"name": "A"}]}));
    assert!(fx.sleeper.delays().is_empty());
    server.handle.join().unwrap();
    assert_eq!(server.requests.lock().unwrap().clone(), vec!["/index.php?key=s3cret&number=9876543210".to_string()]);
}

#[tokio::test]
async fn each_kind_uses_its_query_parameter() {
    let server = spawn_server(vec![
        Reply::new(200, "{}"),
        Reply::new(200, "{}"),
        Reply::new(200, "{}"),
    ]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    fx.client.call(LookupKind::Vehicle, "MH12AB1234").await.unwrap();
    fx.client.call(LookupKind::Aadhaar, "123412341234").await.unwrap();
    fx.client.call(LookupKind::Upi, "name@bank").await.unwrap();

    server.handle.join().unwrap();
    let requests = server.requests.lock().unwrap().clone();
    assert!(requests[0].ends_with("vehicle=MH12AB1234"));
    assert!(requests[1].ends_with("aadhaar=123412341234"));
    assert!(requests[2].ends_with("upi=name%40bank"));
}

// ============================================================================
// SECTION: Retry Budget
// ============================================================================

#[tokio::test]
async fn transient_status_retries_until_success() {
    let server = spawn_server(vec![Reply::new(503, "busy"), Reply::new(200, r#"{"ok":true}"#)]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    let response = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap();

    assert_eq!(response.attempts, 2);
    assert_eq!(fx.sleeper.delays(), vec![Duration::from_millis(1_000)]);
    let labels: Vec<&str> = fx.observer.records().iter().map(|record| record.outcome.label()).collect();
    assert_eq!(labels, vec!["transient", "success"]);
    server.handle.join().unwrap();
}

#[tokio::test]
async fn exhausted_budget_reports_unavailable() {
    let server = spawn_server(vec![
        Reply::new(500, ""),
        Reply::new(429, ""),
        Reply::new(502, ""),
    ]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Unavailable { attempts: 3, .. }));
    assert_eq!(fx.sleeper.delays(), vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]);
    server.handle.join().unwrap();
    assert_eq!(server.requests.lock().unwrap().clone().len(), 3);
}

#[tokio::test]
async fn definitive_rejections_are_not_retried() {
    for (status, expect_rejected) in [
        (400, true),
        (404, true),
        (405, true),
        (409, true),
        (410, true),
        (413, true),
        (422, true),
        (401, false),
        (403, false),
    ] {
        let server = spawn_server(vec![Reply::new(status, "no such record")]);
        let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

        let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

        assert_eq!(failure.attempts(), 1, "status {status}");
        if expect_rejected {
            assert!(matches!(failure, ProviderFailure::Rejected { .. }), "status {status}");
        } else {
            assert!(matches!(failure, ProviderFailure::Unauthorized { .. }), "status {status}");
        }
        assert!(fx.sleeper.delays().is_empty());
        server.handle.join().unwrap();
    }
}

#[tokio::test]
async fn connection_refused_is_transient() {
    let fx = fixture(
        closed_url(),
        RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        },
        local_transport(),
    );

    let failure = fx.client.call(LookupKind::Upi, "name@bank").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Unavailable { attempts: 2, .. }));
    assert_eq!(fx.sleeper.delays().len(), 1);
}

#[tokio::test]
async fn slow_provider_times_out_per_attempt() {
    let server = spawn_server(vec![Reply::slow(200, "{}", Duration::from_millis(800))]);
    let fx = fixture(
        server.base_url.clone(),
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        HttpTransportConfig {
            timeout_ms: 200,
            ..local_transport()
        },
    );

    let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Unavailable { attempts: 1, .. }));
    server.handle.join().unwrap();
}

// ============================================================================
// SECTION: Response Limits
// ============================================================================

#[tokio::test]
async fn non_json_success_is_malformed() {
    let server = spawn_server(vec![Reply::new(200, "<html>maintenance</html>")]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Malformed { attempts: 1, .. }));
    server.handle.join().unwrap();
}

#[tokio::test]
async fn oversized_body_is_malformed() {
    let body = format!(r#"{{"data":"{}"}}"#, "x".repeat(256));
    let server = spawn_server(vec![Reply::new(200, &body)]);
    let fx = fixture(
        server.base_url.clone(),
        RetryPolicy::default(),
        HttpTransportConfig {
            max_response_bytes: 64,
            ..local_transport()
        },
    );

    let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Malformed { attempts: 1, .. }));
    server.handle.join().unwrap();
}

// ============================================================================
// SECTION: Policy and Redaction
// ============================================================================

#[tokio::test]
async fn cleartext_is_refused_unless_allowed() {
    let fx = fixture(closed_url(), RetryPolicy::default(), HttpTransportConfig::default());

    let failure = fx.client.call(LookupKind::Phone, "9876543210").await.unwrap_err();

    assert!(matches!(failure, ProviderFailure::Misconfigured(_)));
    assert_eq!(failure.attempts(), 0);
}

#[tokio::test]
async fn observed_endpoints_never_carry_the_key() {
    let server = spawn_server(vec![Reply::new(500, ""), Reply::new(200, "{}")]);
    let fx = fixture(server.base_url.clone(), RetryPolicy::default(), local_transport());

    fx.client.call(LookupKind::Phone, "9876543210").await.unwrap();

    let records = fx.observer.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.endpoint.contains("s3cret"));
        assert!(record.endpoint.contains("number=9876543210"));
    }
    assert!(matches!(records[1].outcome, AttemptOutcome::Success { status: 200 }));
    server.handle.join().unwrap();
}

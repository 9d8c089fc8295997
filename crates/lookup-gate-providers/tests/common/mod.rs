// crates/lookup-gate-providers/tests/common/mod.rs
// ============================================================================
// Module: Provider Test Helpers
// Description: Scripted HTTP server and recording seams for client tests.
// Purpose: Drive the provider client against a real local socket.
// Dependencies: lookup-gate-providers, tiny_http
// ============================================================================

//! ## Overview
//! Shared helpers for provider client tests: a scripted `tiny_http` server,
//! a sleeper that records delays instead of waiting, and an observer that
//! keeps every attempt record.

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use lookup_gate_providers::AttemptObserver;
use lookup_gate_providers::AttemptRecord;
use lookup_gate_providers::HttpTransportConfig;
use lookup_gate_providers::NoJitter;
use lookup_gate_providers::ProviderClient;
use lookup_gate_providers::ProviderClientConfig;
use lookup_gate_providers::RetryPolicy;
use lookup_gate_providers::Sleeper;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Scripted Server
// ============================================================================

/// One scripted server reply.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
    /// Delay before responding.
    pub delay: Duration,
}

impl Reply {
    /// Immediate reply.
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    /// Delayed reply.
    pub fn slow(status: u16, body: &str, delay: Duration) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay,
        }
    }
}

/// Running scripted server.
pub struct ScriptedServer {
    /// Base URL of the server.
    pub base_url: Url,
    /// Request targets received, in order.
    pub requests: Arc<Mutex<Vec<String>>>,
    /// Server thread.
    pub handle: thread::JoinHandle<()>,
}

impl ScriptedServer {
    /// Returns the request targets received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Spawns a server answering `replies` in order, then stopping.
pub fn spawn_server(replies: Vec<Reply>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base_url = Url::parse(&format!("http://{addr}/index.php")).unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    let handle = thread::spawn(move || {
        for reply in replies {
            let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(5)) else {
                return;
            };
            seen.lock().unwrap().push(request.url().to_string());
            if !reply.delay.is_zero() {
                thread::sleep(reply.delay);
            }
            let response = Response::from_string(reply.body).with_status_code(reply.status);
            let _ = request.respond(response);
        }
    });
    ScriptedServer {
        base_url,
        requests,
        handle,
    }
}

/// Returns a local URL with nothing listening on it.
pub fn closed_url() -> Url {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    drop(server);
    Url::parse(&format!("http://{addr}/index.php")).unwrap()
}

// ============================================================================
// SECTION: Recording Seams
// ============================================================================

/// Sleeper that records delays without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    /// Delays requested.
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Returns the delays requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
    }
}

/// Observer that keeps every record.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Records observed.
    pub records: Mutex<Vec<AttemptRecord>>,
}

impl RecordingObserver {
    /// Returns the records observed so far.
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AttemptObserver for RecordingObserver {
    fn observe(&self, record: &AttemptRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// ============================================================================
// SECTION: Client Builders
// ============================================================================

/// Client plus its recording seams.
pub struct Fixture {
    /// Client under test.
    pub client: ProviderClient,
    /// Recorded backoff delays.
    pub sleeper: Arc<RecordingSleeper>,
    /// Recorded attempts.
    pub observer: Arc<RecordingObserver>,
}

/// Builds a client against `base_url` with cleartext allowed.
pub fn fixture(base_url: Url, retry: RetryPolicy, transport: HttpTransportConfig) -> Fixture {
    let config = ProviderClientConfig {
        retry,
        ..ProviderClientConfig::new(base_url, Some("s3cret".to_string()))
    };
    let sleeper = Arc::new(RecordingSleeper::default());
    let observer = Arc::new(RecordingObserver::default());
    let client = ProviderClient::from_http(config, transport)
        .unwrap()
        .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>)
        .with_jitter(Arc::new(NoJitter))
        .with_observer(Arc::clone(&observer) as Arc<dyn AttemptObserver>);
    Fixture {
        client,
        sleeper,
        observer,
    }
}

/// Local transport settings with a short timeout.
pub fn local_transport() -> HttpTransportConfig {
    HttpTransportConfig {
        allow_http: true,
        timeout_ms: 2_000,
        connect_timeout_ms: 1_000,
        ..HttpTransportConfig::default()
    }
}

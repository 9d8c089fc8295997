// crates/lookup-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Lookup Gate configuration. The output is static and
//! must parse and validate with [`crate::LookupGateConfig::from_toml_str`].

/// Returns a canonical example `lookup-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 16384
request_timeout_ms = 120000
# bearer_token = "change-me"

[provider]
base_url = "https://provider.example/index.php"
# api_key is usually supplied via LOOKUP_GATE_PROVIDER_API_KEY
key_param = "key"
timeout_ms = 30000
connect_timeout_ms = 10000
max_response_bytes = 1048576

[provider.routes]
phone = { param = "number" }
vehicle = { param = "vehicle" }
aadhaar = { param = "aadhaar" }
upi = { param = "upi" }

[retry]
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 8000
multiplier = 2
jitter_percent = 20

[admission]
max_inflight = 16
queue_timeout_ms = 10000
max_tracked_callers = 10000

[subscription]
default_tier = "free"
window_hours = 24
window_offset_minutes = -330
grant_days = 21
auto_register = true

[[subscription.tiers]]
name = "free"
quota = 3
requests_per_minute = 10

[[subscription.tiers]]
name = "premium"
quota = 500
requests_per_minute = 60

[subscription.costs]
phone = 1
vehicle = 1
aadhaar = 1
upi = 1

[subscription.store]
type = "sqlite"
path = "lookup-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[admins]
ids = ["1001"]

[audit]
sink = "file"
path = "lookup-gate-audit.jsonl"

[logging]
level = "info"
format = "json"
"#,
    )
}

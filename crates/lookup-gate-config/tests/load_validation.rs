// crates/lookup-gate-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards, overrides, and section limits.
// Purpose: Ensure config input handling is strict and fail-closed.
// ============================================================================
//! ## Overview
//! Loads configuration from files and environment overrides and checks that
//! every malformed or unsafe input is rejected.

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

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use lookup_gate_config::AuditSinkType;
use lookup_gate_config::ConfigError;
use lookup_gate_config::LogFormat;
use lookup_gate_config::LookupGateConfig;
use lookup_gate_config::StoreType;
use lookup_gate_config::config_toml_example;
use lookup_gate_core::LookupKind;
use lookup_gate_core::TierId;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

const MINIMAL: &str = "[provider]\nbase_url = \"https://provider.example/index.php\"\n";

fn assert_invalid(result: Result<LookupGateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(name, value)| ((*name).to_string(), (*value).to_string())).collect()
}

fn write_config(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// SECTION: Load Guards
// ============================================================================

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(
        LookupGateConfig::load_with_env(Some(Path::new(&long_path)), &env(&[])),
        "config path exceeds max length",
    )
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        LookupGateConfig::load_with_env(Some(Path::new(&long_component)), &env(&[])),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let file = write_config(&vec![b'#'; 1024 * 1024 + 1]);
    assert_invalid(
        LookupGateConfig::load_with_env(Some(file.path()), &env(&[])),
        "config file exceeds size limit",
    )
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let file = write_config(&[0xff, 0xfe, 0x00]);
    assert_invalid(
        LookupGateConfig::load_with_env(Some(file.path()), &env(&[])),
        "config file must be utf-8",
    )
}

#[test]
fn missing_explicit_path_is_an_error() {
    let result = LookupGateConfig::load_with_env(
        Some(Path::new("/nonexistent/lookup-gate.toml")),
        &env(&[]),
    );
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn missing_env_path_is_an_error() {
    let overrides = env(&[("LOOKUP_GATE_CONFIG", "/nonexistent/lookup-gate.toml")]);
    let result = LookupGateConfig::load_with_env(None, &overrides);
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn missing_default_file_runs_from_environment() {
    let overrides = env(&[
        ("LOOKUP_GATE_PROVIDER_BASE_URL", "https://provider.example/index.php"),
        ("LOOKUP_GATE_PROVIDER_API_KEY", "s3cret"),
    ]);
    let config = LookupGateConfig::load_with_env(None, &overrides).unwrap();
    assert!(config.source.is_none());
    assert_eq!(config.provider.api_key.as_deref(), Some("s3cret"));
}

#[test]
fn missing_default_file_without_provider_fails_closed() -> TestResult {
    assert_invalid(LookupGateConfig::load_with_env(None, &env(&[])), "provider.base_url is required")
}

#[test]
fn load_reads_file_and_records_source() {
    let file = write_config(MINIMAL.as_bytes());
    let config = LookupGateConfig::load_with_env(Some(file.path()), &env(&[])).unwrap();
    assert_eq!(config.source.as_deref(), Some(file.path()));
    assert_eq!(config.server.bind, "127.0.0.1:8080");
}

// ============================================================================
// SECTION: Environment Overrides
// ============================================================================

#[test]
fn env_overrides_replace_file_values() {
    let file = write_config(MINIMAL.as_bytes());
    let overrides = env(&[
        ("LOOKUP_GATE_PROVIDER_BASE_URL", "https://other.example/api"),
        ("LOOKUP_GATE_ADMIN_IDS", "1001, 1002,,"),
        ("LOOKUP_GATE_BIND", "127.0.0.1:9090"),
        ("LOOKUP_GATE_MAX_INFLIGHT", "4"),
        ("LOOKUP_GATE_LOG_LEVEL", "debug"),
        ("LOOKUP_GATE_STORE_PATH", "/var/lib/lookup-gate/state.db"),
    ]);
    let config = LookupGateConfig::load_with_env(Some(file.path()), &overrides).unwrap();
    assert_eq!(config.provider.base_url.as_deref(), Some("https://other.example/api"));
    assert_eq!(config.admins.ids, vec!["1001".to_string(), "1002".to_string()]);
    assert_eq!(config.server.bind_addr().unwrap().port(), 9090);
    assert_eq!(config.admission_config().max_inflight, 4);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.subscription.store.store_type, StoreType::Sqlite);
    let sqlite = config.subscription.store.sqlite().unwrap();
    assert_eq!(sqlite.path, Path::new("/var/lib/lookup-gate/state.db"));
}

#[test]
fn blank_override_is_rejected() -> TestResult {
    let file = write_config(MINIMAL.as_bytes());
    assert_invalid(
        LookupGateConfig::load_with_env(Some(file.path()), &env(&[("LOOKUP_GATE_BIND", "  ")])),
        "LOOKUP_GATE_BIND must be non-empty",
    )
}

#[test]
fn non_numeric_inflight_override_is_rejected() -> TestResult {
    let file = write_config(MINIMAL.as_bytes());
    assert_invalid(
        LookupGateConfig::load_with_env(
            Some(file.path()),
            &env(&[("LOOKUP_GATE_MAX_INFLIGHT", "many")]),
        ),
        "LOOKUP_GATE_MAX_INFLIGHT must be a positive integer",
    )
}

#[test]
fn zero_inflight_override_fails_validation() -> TestResult {
    let file = write_config(MINIMAL.as_bytes());
    assert_invalid(
        LookupGateConfig::load_with_env(Some(file.path()), &env(&[("LOOKUP_GATE_MAX_INFLIGHT", "0")])),
        "admission.max_inflight",
    )
}

// ============================================================================
// SECTION: Section Validation
// ============================================================================

#[test]
fn cleartext_provider_requires_allow_http() -> TestResult {
    let text = "[provider]\nbase_url = \"http://127.0.0.1:9000/\"\n";
    assert_invalid(LookupGateConfig::from_toml_str(text), "must use https")?;
    let allowed = "[provider]\nbase_url = \"http://127.0.0.1:9000/\"\nallow_http = true\n";
    assert!(LookupGateConfig::from_toml_str(allowed).is_ok());
    Ok(())
}

#[test]
fn provider_url_must_not_embed_credentials_or_query() -> TestResult {
    assert_invalid(
        LookupGateConfig::from_toml_str("[provider]\nbase_url = \"https://u:p@provider.example/\"\n"),
        "must not embed credentials",
    )?;
    assert_invalid(
        LookupGateConfig::from_toml_str("[provider]\nbase_url = \"https://provider.example/?key=x\"\n"),
        "must not carry a query",
    )
}

#[test]
fn key_param_must_not_collide_with_route_param() -> TestResult {
    let text = format!("{MINIMAL}key_param = \"number\"\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "provider.key_param must differ")
}

#[test]
fn provider_timeouts_are_bounded() -> TestResult {
    let text = format!("{MINIMAL}timeout_ms = 50\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "provider.timeout_ms")?;
    let text = format!("{MINIMAL}connect_timeout_ms = 60001\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "provider.connect_timeout_ms")
}

#[test]
fn public_bind_requires_bearer_token() -> TestResult {
    let text = format!("{MINIMAL}[server]\nbind = \"0.0.0.0:8080\"\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "requires server.bearer_token")?;
    let text = format!("{MINIMAL}[server]\nbind = \"0.0.0.0:8080\"\nbearer_token = \"tok\"\n");
    assert!(LookupGateConfig::from_toml_str(&text).is_ok());
    Ok(())
}

#[test]
fn duplicate_tiers_are_rejected() -> TestResult {
    let text = format!(
        "{MINIMAL}[[subscription.tiers]]\nname = \"free\"\nquota = 3\n\
         [[subscription.tiers]]\nname = \"free\"\nquota = 9\n"
    );
    assert_invalid(LookupGateConfig::from_toml_str(&text), "duplicate subscription tier: free")
}

#[test]
fn default_tier_must_be_declared() -> TestResult {
    let text = format!(
        "{MINIMAL}[subscription]\ndefault_tier = \"basic\"\n\
         [[subscription.tiers]]\nname = \"free\"\nquota = 3\n"
    );
    assert_invalid(LookupGateConfig::from_toml_str(&text), "default_tier basic is not declared")
}

#[test]
fn zero_cost_is_rejected() -> TestResult {
    let text = format!("{MINIMAL}[subscription.costs]\nupi = 0\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "subscription.costs.upi")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let text = format!("{MINIMAL}[subscription.store]\ntype = \"sqlite\"\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "requires path")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let text = format!("{MINIMAL}[audit]\nsink = \"file\"\n");
    assert_invalid(LookupGateConfig::from_toml_str(&text), "requires audit.path")
}

#[test]
fn custom_tiers_and_costs_flow_into_policy() {
    let text = format!(
        "{MINIMAL}[subscription]\ndefault_tier = \"trial\"\ngrant_days = 30\n\
         [[subscription.tiers]]\nname = \"trial\"\nquota = 1\n\
         [[subscription.tiers]]\nname = \"gold\"\nquota = 50\nrequests_per_minute = 5\n\
         [subscription.costs]\naadhaar = 3\n"
    );
    let config = LookupGateConfig::from_toml_str(&text).unwrap();
    let policy = config.subscription_policy().unwrap();
    assert_eq!(policy.default_tier.id.as_str(), "trial");
    assert!(policy.has_tier(&TierId::new("gold")));
    assert_eq!(policy.resolve(&TierId::new("gold")).requests_per_minute, 5);
    assert_eq!(policy.cost_for(LookupKind::Aadhaar), 3);
    assert_eq!(policy.cost_for(LookupKind::Phone), 1);
    assert_eq!(policy.grant_days, 30);
}

// ============================================================================
// SECTION: Example
// ============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = LookupGateConfig::from_toml_str(&config_toml_example()).unwrap();
    assert_eq!(config.audit.sink, AuditSinkType::File);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.admin_ids().len(), 1);
    assert!(config.subscription.store.sqlite().is_some());
    let client = config.provider_client_config().unwrap();
    assert_eq!(client.routes.phone.param, "number");
    assert_eq!(client.retry.max_attempts, 3);
}

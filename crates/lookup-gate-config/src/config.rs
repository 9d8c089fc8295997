// crates/lookup-gate-config/src/config.rs
// ============================================================================
// Module: Lookup Gate Configuration
// Description: Configuration loading and validation for Lookup Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: lookup-gate-core, lookup-gate-providers, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits,
//! then overlaid with `LOOKUP_GATE_*` environment variables, then validated.
//! A missing default config file is allowed so deployments can run purely
//! from the environment; a missing explicit path is an error.
//! Security posture: config inputs are untrusted; invalid values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use lookup_gate_core::AdmissionConfig;
use lookup_gate_core::CallerId;
use lookup_gate_core::DispatchConfig;
use lookup_gate_core::LookupKind;
use lookup_gate_core::QuotaWindow;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::TierId;
use lookup_gate_core::TierPolicy;
use lookup_gate_core::runtime::rate_limit::DEFAULT_MAX_TRACKED_CALLERS;
use lookup_gate_providers::HttpTransportConfig;
use lookup_gate_providers::ProviderClientConfig;
use lookup_gate_providers::ProviderRoutes;
use lookup_gate_providers::RetryPolicy;
use lookup_gate_store_sqlite::SqliteStoreConfig;
use lookup_gate_store_sqlite::SqliteStoreMode;
use lookup_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::env::EnvSource;
use crate::env::ProcessEnv;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "lookup-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LOOKUP_GATE_CONFIG";
/// Override for the provider base URL.
pub const ENV_PROVIDER_BASE_URL: &str = "LOOKUP_GATE_PROVIDER_BASE_URL";
/// Override for the provider API key.
pub const ENV_PROVIDER_API_KEY: &str = "LOOKUP_GATE_PROVIDER_API_KEY";
/// Override for admin caller ids (comma-separated).
pub const ENV_ADMIN_IDS: &str = "LOOKUP_GATE_ADMIN_IDS";
/// Override for the server bind address.
pub const ENV_BIND: &str = "LOOKUP_GATE_BIND";
/// Override for the global in-flight ceiling.
pub const ENV_MAX_INFLIGHT: &str = "LOOKUP_GATE_MAX_INFLIGHT";
/// Override for the log filter.
pub const ENV_LOG_LEVEL: &str = "LOOKUP_GATE_LOG_LEVEL";
/// Override for the `SQLite` store path; selects the sqlite backend.
pub const ENV_STORE_PATH: &str = "LOOKUP_GATE_STORE_PATH";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum timeout accepted anywhere in the config.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum timeout accepted anywhere in the config.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Maximum retry attempts per provider call.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 10;
/// Maximum backoff multiplier.
pub(crate) const MAX_RETRY_MULTIPLIER: u32 = 10;
/// Maximum in-flight ceiling.
pub(crate) const MAX_INFLIGHT: usize = 4_096;
/// Maximum tracked rate-limit callers.
pub(crate) const MAX_TRACKED_CALLERS: usize = 1_000_000;
/// Maximum request body size accepted by the server.
pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum provider response size.
pub(crate) const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum bearer token length.
pub(crate) const MAX_TOKEN_LENGTH: usize = 256;
/// Maximum number of declared tiers.
pub(crate) const MAX_TIERS: usize = 64;
/// Maximum number of configured admins.
pub(crate) const MAX_ADMINS: usize = 256;
/// Maximum identifier length for tiers and admins.
pub(crate) const MAX_IDENTIFIER_LENGTH: usize = 128;
/// Maximum grant length in days.
pub(crate) const MAX_GRANT_DAYS: u32 = 3_650;
/// Maximum quota cost for one lookup.
pub(crate) const MAX_LOOKUP_COST: u32 = 1_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Lookup Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupGateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// External provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Provider retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Admission ceilings.
    #[serde(default)]
    pub admission: AdmissionLimitsConfig,
    /// Subscription tiers, costs, and storage.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    /// Configured admin callers.
    #[serde(default)]
    pub admins: AdminsConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Config file the values were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl LookupGateConfig {
    /// Loads configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, &ProcessEnv)
    }

    /// Loads configuration using an explicit override source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env(path: Option<&Path>, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path, env)?;
        validate_path(&resolved)?;
        let mut config = match fs::read(&resolved) {
            Ok(bytes) => {
                let mut config = Self::parse_bytes(&bytes)?;
                config.source = Some(resolved);
                config
            }
            Err(err) if err.kind() == ErrorKind::NotFound && !explicit => Self::default(),
            Err(err) => {
                return Err(ConfigError::Io(format!("{}: {err}", resolved.display())));
            }
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates configuration text without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_bytes(content.as_bytes())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses raw config bytes.
    fn parse_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `LOOKUP_GATE_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override cannot be applied.
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<(), ConfigError> {
        if let Some(value) = env.var(ENV_PROVIDER_BASE_URL)? {
            self.provider.base_url = Some(value);
        }
        if let Some(value) = env.var(ENV_PROVIDER_API_KEY)? {
            self.provider.api_key = Some(value);
        }
        if let Some(value) = env.var(ENV_ADMIN_IDS)? {
            self.admins.ids = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = env.var(ENV_BIND)? {
            self.server.bind = value;
        }
        if let Some(value) = env.var(ENV_MAX_INFLIGHT)? {
            self.admission.max_inflight = value.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_MAX_INFLIGHT} must be a positive integer"))
            })?;
        }
        if let Some(value) = env.var(ENV_LOG_LEVEL)? {
            self.logging.level = value;
        }
        if let Some(value) = env.var(ENV_STORE_PATH)? {
            self.subscription.store.store_type = StoreType::Sqlite;
            self.subscription.store.path = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.provider.validate()?;
        self.retry.validate()?;
        self.admission.validate()?;
        self.subscription.validate()?;
        self.admins.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Builds the subscription policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the subscription section is invalid.
    pub fn subscription_policy(&self) -> Result<SubscriptionPolicy, ConfigError> {
        self.subscription.policy()
    }

    /// Returns the admission settings.
    #[must_use]
    pub fn admission_config(&self) -> AdmissionConfig {
        self.admission.to_admission()
    }

    /// Returns the dispatch settings.
    #[must_use]
    pub const fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            auto_register: self.subscription.auto_register,
        }
    }

    /// Builds the provider client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the provider section is invalid.
    pub fn provider_client_config(&self) -> Result<ProviderClientConfig, ConfigError> {
        Ok(ProviderClientConfig {
            base_url: self.provider.url()?,
            api_key: self.provider.api_key.clone(),
            key_param: self.provider.key_param.clone(),
            routes: self.provider.routes.clone(),
            retry: self.retry.to_policy(),
        })
    }

    /// Returns the provider transport settings.
    #[must_use]
    pub fn http_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            allow_http: self.provider.allow_http,
            timeout_ms: self.provider.timeout_ms,
            connect_timeout_ms: self.provider.connect_timeout_ms,
            max_response_bytes: self.provider.max_response_bytes,
            user_agent: self.provider.user_agent.clone(),
        }
    }

    /// Returns configured admin callers.
    #[must_use]
    pub fn admin_ids(&self) -> Vec<CallerId> {
        self.admins.ids.iter().map(|id| CallerId::new(id.trim())).collect()
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Optional bearer token required on `/v1` routes.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Deadline for one lookup, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            bearer_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server.bind: {}", self.bind)))
    }

    /// Returns the per-lookup deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES}"
            )));
        }
        if let Some(token) = &self.bearer_token {
            let token = token.trim();
            if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "server.bearer_token must be 1 to {MAX_TOKEN_LENGTH} characters"
                )));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(
                    "server.bearer_token must not contain whitespace".to_string(),
                ));
            }
        } else if !addr.ip().is_loopback() {
            return Err(ConfigError::Invalid(
                "non-loopback server.bind requires server.bearer_token".to_string(),
            ));
        }
        validate_timeout_range(
            "server.request_timeout_ms",
            self.request_timeout_ms,
            MIN_TIMEOUT_MS,
            5 * MAX_TIMEOUT_MS,
        )
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// External provider configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider base URL (required).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Provider API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Query parameter carrying the API key.
    #[serde(default = "default_key_param")]
    pub key_param: String,
    /// Allow cleartext HTTP (local testing only).
    #[serde(default)]
    pub allow_http: bool,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Maximum provider response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Outbound user agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-kind routes.
    #[serde(default)]
    pub routes: ProviderRoutes,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            key_param: default_key_param(),
            allow_http: false,
            timeout_ms: default_provider_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
            routes: ProviderRoutes::default(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("key_param", &self.key_param)
            .field("allow_http", &self.allow_http)
            .field("timeout_ms", &self.timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("user_agent", &self.user_agent)
            .field("routes", &self.routes)
            .finish()
    }
}

impl ProviderConfig {
    /// Returns the parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is missing or malformed.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "provider.base_url is required (or set {ENV_PROVIDER_BASE_URL})"
            )));
        }
        Url::parse(raw).map_err(|err| ConfigError::Invalid(format!("invalid provider.base_url: {err}")))
    }

    /// Validates provider configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url()?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "provider.base_url must use https unless provider.allow_http is set"
                        .to_string(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "provider.base_url has unsupported scheme: {other}"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid("provider.base_url requires a host".to_string()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid(
                "provider.base_url must not embed credentials".to_string(),
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "provider.base_url must not carry a query or fragment".to_string(),
            ));
        }
        if self.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("provider.api_key must be non-empty".to_string()));
        }
        if self.key_param.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.key_param must be non-empty".to_string()));
        }
        validate_timeout_range("provider.timeout_ms", self.timeout_ms, MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)?;
        validate_timeout_range(
            "provider.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "provider.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.user_agent must be non-empty".to_string()));
        }
        if let Some(message) = self.routes.validate() {
            return Err(ConfigError::Invalid(format!("provider.routes: {message}")));
        }
        let params: BTreeSet<&str> = LookupKind::ALL
            .iter()
            .map(|kind| self.routes.route(*kind).param.as_str())
            .collect();
        if params.contains(self.key_param.as_str()) {
            return Err(ConfigError::Invalid(
                "provider.key_param must differ from every route parameter".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Retry
// ============================================================================

/// Provider retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Ceiling for one delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    /// Share of each delay removed at random, in percent.
    #[serde(default = "default_jitter_percent")]
    pub jitter_percent: u8,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay_ms,
            max_delay_ms: policy.max_delay_ms,
            multiplier: policy.multiplier,
            jitter_percent: policy.jitter_percent,
        }
    }
}

impl RetryConfig {
    /// Returns the retry policy.
    #[must_use]
    pub const fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            multiplier: self.multiplier,
            jitter_percent: self.jitter_percent,
        }
    }

    /// Validates retry configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}"
            )));
        }
        if self.base_delay_ms > MAX_TIMEOUT_MS || self.max_delay_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "retry delays must not exceed {MAX_TIMEOUT_MS} milliseconds"
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must be at least retry.base_delay_ms".to_string(),
            ));
        }
        if self.multiplier == 0 || self.multiplier > MAX_RETRY_MULTIPLIER {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be between 1 and {MAX_RETRY_MULTIPLIER}"
            )));
        }
        if self.jitter_percent > 100 {
            return Err(ConfigError::Invalid("retry.jitter_percent must be at most 100".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Admission
// ============================================================================

/// Admission ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionLimitsConfig {
    /// Global in-flight ceiling toward the provider.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Maximum wait for an in-flight permit, in milliseconds.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
    /// Maximum callers tracked by the per-minute limiter.
    #[serde(default = "default_max_tracked_callers")]
    pub max_tracked_callers: usize,
}

impl Default for AdmissionLimitsConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
            queue_timeout_ms: default_queue_timeout_ms(),
            max_tracked_callers: default_max_tracked_callers(),
        }
    }
}

impl AdmissionLimitsConfig {
    /// Returns the runtime admission settings.
    #[must_use]
    pub const fn to_admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            max_inflight: self.max_inflight,
            queue_timeout: Duration::from_millis(self.queue_timeout_ms),
            max_tracked_callers: self.max_tracked_callers,
        }
    }

    /// Validates admission configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 || self.max_inflight > MAX_INFLIGHT {
            return Err(ConfigError::Invalid(format!(
                "admission.max_inflight must be between 1 and {MAX_INFLIGHT}"
            )));
        }
        validate_timeout_range(
            "admission.queue_timeout_ms",
            self.queue_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        if self.max_tracked_callers == 0 || self.max_tracked_callers > MAX_TRACKED_CALLERS {
            return Err(ConfigError::Invalid(format!(
                "admission.max_tracked_callers must be between 1 and {MAX_TRACKED_CALLERS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Subscription configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    /// Tier assigned on first contact and after revocation.
    #[serde(default = "default_tier_name")]
    pub default_tier: String,
    /// Quota window length in hours.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Window boundary offset from UTC midnight, in minutes.
    #[serde(default = "default_window_offset_minutes")]
    pub window_offset_minutes: i32,
    /// Default admin grant length in days.
    #[serde(default = "default_grant_days")]
    pub grant_days: u32,
    /// Register unknown callers on first contact.
    #[serde(default = "default_true")]
    pub auto_register: bool,
    /// Declared tiers.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    /// Quota cost per lookup kind.
    #[serde(default)]
    pub costs: CostsConfig,
    /// Subscription storage backend.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            default_tier: default_tier_name(),
            window_hours: default_window_hours(),
            window_offset_minutes: default_window_offset_minutes(),
            grant_days: default_grant_days(),
            auto_register: true,
            tiers: default_tiers(),
            costs: CostsConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl SubscriptionConfig {
    /// Builds the subscription policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the default tier is not declared.
    pub fn policy(&self) -> Result<SubscriptionPolicy, ConfigError> {
        let default_name = self.default_tier.trim();
        let default_tier = self
            .tiers
            .iter()
            .find(|tier| tier.name.trim() == default_name)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "subscription.default_tier {default_name} is not declared in subscription.tiers"
                ))
            })?;
        let window = QuotaWindow::new(
            i64::from(self.window_hours) * 3_600_000,
            i64::from(self.window_offset_minutes) * 60_000,
        );
        let mut policy = SubscriptionPolicy::new(window, default_tier.to_policy());
        for tier in &self.tiers {
            if tier.name.trim() != default_name {
                policy = policy.with_tier(tier.to_policy());
            }
        }
        policy.costs = self.costs.to_map();
        policy.grant_days = self.grant_days;
        Ok(policy)
    }

    /// Validates subscription configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_hours == 0 || self.window_hours > 24 * 31 {
            return Err(ConfigError::Invalid(
                "subscription.window_hours must be between 1 and 744".to_string(),
            ));
        }
        if self.window_offset_minutes.unsigned_abs() >= self.window_hours * 60 {
            return Err(ConfigError::Invalid(
                "subscription.window_offset_minutes must be shorter than the window".to_string(),
            ));
        }
        if self.grant_days == 0 || self.grant_days > MAX_GRANT_DAYS {
            return Err(ConfigError::Invalid(format!(
                "subscription.grant_days must be between 1 and {MAX_GRANT_DAYS}"
            )));
        }
        if self.tiers.is_empty() || self.tiers.len() > MAX_TIERS {
            return Err(ConfigError::Invalid(format!(
                "subscription.tiers must declare between 1 and {MAX_TIERS} tiers"
            )));
        }
        let mut names = BTreeSet::new();
        for tier in &self.tiers {
            tier.validate()?;
            if !names.insert(tier.name.trim()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate subscription tier: {}",
                    tier.name.trim()
                )));
            }
        }
        self.costs.validate()?;
        self.store.validate()?;
        self.policy().map(|_| ())
    }
}

/// One declared tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Tier name.
    pub name: String,
    /// Quota units per window.
    pub quota: u32,
    /// Requests per minute; zero disables the per-minute ceiling.
    #[serde(default)]
    pub requests_per_minute: u32,
}

impl TierConfig {
    /// Returns the runtime tier policy.
    #[must_use]
    pub fn to_policy(&self) -> TierPolicy {
        TierPolicy {
            id: TierId::new(self.name.trim()),
            quota_per_window: self.quota,
            requests_per_minute: self.requests_per_minute,
        }
    }

    /// Validates one tier.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier("subscription.tiers.name", &self.name)
    }
}

/// Quota cost per lookup kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostsConfig {
    /// Phone lookup cost.
    #[serde(default = "default_cost")]
    pub phone: u32,
    /// Vehicle lookup cost.
    #[serde(default = "default_cost")]
    pub vehicle: u32,
    /// Aadhaar lookup cost.
    #[serde(default = "default_cost")]
    pub aadhaar: u32,
    /// UPI lookup cost.
    #[serde(default = "default_cost")]
    pub upi: u32,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            phone: default_cost(),
            vehicle: default_cost(),
            aadhaar: default_cost(),
            upi: default_cost(),
        }
    }
}

impl CostsConfig {
    /// Returns the cost for a kind.
    #[must_use]
    pub const fn cost(&self, kind: LookupKind) -> u32 {
        match kind {
            LookupKind::Phone => self.phone,
            LookupKind::Vehicle => self.vehicle,
            LookupKind::Aadhaar => self.aadhaar,
            LookupKind::Upi => self.upi,
        }
    }

    /// Returns costs keyed by kind.
    fn to_map(self) -> BTreeMap<LookupKind, u32> {
        LookupKind::ALL.into_iter().map(|kind| (kind, self.cost(kind))).collect()
    }

    /// Validates costs.
    fn validate(&self) -> Result<(), ConfigError> {
        for kind in LookupKind::ALL {
            let cost = self.cost(kind);
            if cost == 0 || cost > MAX_LOOKUP_COST {
                return Err(ConfigError::Invalid(format!(
                    "subscription.costs.{kind} must be between 1 and {MAX_LOOKUP_COST}"
                )));
            }
        }
        Ok(())
    }
}

/// Subscription store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` settings when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory subscription.store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite subscription.store requires path".to_string())
                })?;
                validate_store_path(path)?;
                validate_timeout_range(
                    "subscription.store.busy_timeout_ms",
                    self.busy_timeout_ms,
                    MIN_TIMEOUT_MS,
                    MAX_TIMEOUT_MS,
                )
            }
        }
    }
}

/// Subscription store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store; state is lost on restart.
    #[default]
    Memory,
    /// `SQLite` store.
    Sqlite,
}

// ============================================================================
// SECTION: Admins, Audit, Logging
// ============================================================================

/// Configured admin callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminsConfig {
    /// Admin caller ids.
    #[serde(default)]
    pub ids: Vec<String>,
}

impl AdminsConfig {
    /// Validates admin ids.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ids.len() > MAX_ADMINS {
            return Err(ConfigError::Invalid(format!("admins.ids exceeds {MAX_ADMINS} entries")));
        }
        for id in &self.ids {
            validate_identifier("admins.ids", id)?;
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit entries.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// File path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => validate_store_path(path),
            (AuditSinkType::Stderr | AuditSinkType::None, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid for the file sink".to_string(),
            )),
            (AuditSinkType::Stderr | AuditSinkType::None, None) => Ok(()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON lines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim();
        if level.is_empty() || level.len() > 1024 {
            return Err(ConfigError::Invalid("logging.level must be 1 to 1024 characters".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

const fn default_max_body_bytes() -> usize {
    16 * 1024
}

const fn default_request_timeout_ms() -> u64 {
    120_000
}

fn default_key_param() -> String {
    lookup_gate_providers::routes::DEFAULT_KEY_PARAM.to_string()
}

const fn default_provider_timeout_ms() -> u64 {
    30_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_user_agent() -> String {
    HttpTransportConfig::default().user_agent
}

const fn default_max_attempts() -> u32 {
    lookup_gate_providers::retry::DEFAULT_MAX_ATTEMPTS
}

const fn default_base_delay_ms() -> u64 {
    lookup_gate_providers::retry::DEFAULT_BASE_DELAY_MS
}

const fn default_max_delay_ms() -> u64 {
    lookup_gate_providers::retry::DEFAULT_MAX_DELAY_MS
}

const fn default_multiplier() -> u32 {
    2
}

const fn default_jitter_percent() -> u8 {
    20
}

const fn default_max_inflight() -> usize {
    16
}

const fn default_queue_timeout_ms() -> u64 {
    10_000
}

const fn default_max_tracked_callers() -> usize {
    DEFAULT_MAX_TRACKED_CALLERS
}

fn default_tier_name() -> String {
    "free".to_string()
}

const fn default_window_hours() -> u32 {
    24
}

/// IST midnight, the boundary the service's users see.
const fn default_window_offset_minutes() -> i32 {
    -330
}

const fn default_grant_days() -> u32 {
    lookup_gate_core::core::subscription::DEFAULT_GRANT_DAYS
}

const fn default_true() -> bool {
    true
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            name: "free".to_string(),
            quota: 3,
            requests_per_minute: 10,
        },
        TierConfig {
            name: "premium".to_string(),
            quota: 500,
            requests_per_minute: 60,
        },
    ]
}

const fn default_cost() -> u32 {
    1
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag reports whether it was explicit.
fn resolve_path(path: Option<&Path>, env: &dyn EnvSource) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Some(env_path) = env.var(CONFIG_ENV_VAR)? {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates store and audit file paths against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("file path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("file path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("file path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Validates tier names and admin ids.
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} entries must be 1 to {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} entries must not contain control characters")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/lookup-gate-server/src/server.rs
// ============================================================================
// Module: Lookup Server
// Description: Builds the gateway from configuration and serves HTTP.
// Purpose: Wire store, provider, audit, and router into one process.
// Dependencies: axum, lookup-gate-config, lookup-gate-providers, tokio
// ============================================================================

//! ## Overview
//! [`LookupServer::from_config`] validates configuration, opens the
//! subscription store, builds the provider client and audit sinks, and
//! registers configured admins. [`LookupServer::serve`] binds the HTTP
//! listener and runs until the shutdown signal resolves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lookup_gate_config::LookupGateConfig;
use lookup_gate_config::StoreType;
use lookup_gate_core::InMemorySubscriptionStore;
use lookup_gate_core::LookupDispatcher;
use lookup_gate_core::SubscriptionPolicy;
use lookup_gate_core::SubscriptionStore;
use lookup_gate_core::SystemClock;
use lookup_gate_providers::ProviderClient;
use lookup_gate_store_sqlite::SqliteSubscriptionStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;

use crate::audit::build_audit_sink;
use crate::gateway::Gateway;
use crate::routes::RouterSettings;
use crate::routes::router;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Lookup Gate server instance.
pub struct LookupServer {
    /// Validated configuration.
    config: LookupGateConfig,
    /// Gateway shared by handlers.
    gateway: Arc<Gateway>,
}

impl LookupServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or a component
    /// fails to initialize.
    pub async fn from_config(config: LookupGateConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let policy = config.subscription_policy().map_err(|err| ServerError::Config(err.to_string()))?;
        let store = build_store(&config, policy)?;
        let client_config =
            config.provider_client_config().map_err(|err| ServerError::Config(err.to_string()))?;
        let provider = ProviderClient::from_http(client_config, config.http_transport_config())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let audit = build_audit_sink(&config.audit)
            .map_err(|err| ServerError::Init(format!("audit sink: {err}")))?;
        let dispatcher = LookupDispatcher::new(
            store,
            Arc::new(provider),
            audit,
            Arc::new(SystemClock),
            config.admission_config(),
            config.dispatch_config(),
        );
        let gateway =
            Gateway::new(dispatcher, config.admin_ids(), config.server.request_timeout());
        gateway.bootstrap_admins().await.map_err(|err| ServerError::Init(err.to_string()))?;
        emit_cleartext_warning(&config);
        Ok(Self {
            config,
            gateway: Arc::new(gateway),
        })
    }

    /// Returns the gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Builds the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        router(
            Arc::clone(&self.gateway),
            RouterSettings {
                max_body_bytes: self.config.server.max_body_bytes,
                bearer_token: self.config.server.bearer_token.clone(),
            },
        )
    }

    /// Serves HTTP until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("ctrl-c handler unavailable; serving until the process is killed");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves HTTP until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed on {addr}: {err}")))?;
        let local = listener.local_addr().unwrap_or(addr);
        info!(addr = %local, "lookup gate listening");
        serve_listener(listener, self.router(), shutdown).await
    }
}

/// Serves a router on a bound listener.
async fn serve_listener<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))?;
    info!("lookup gate stopped");
    Ok(())
}

/// Builds the subscription store from configuration.
fn build_store(
    config: &LookupGateConfig,
    policy: SubscriptionPolicy,
) -> Result<Arc<dyn SubscriptionStore>, ServerError> {
    let store: Arc<dyn SubscriptionStore> = match config.subscription.store.store_type {
        StoreType::Memory => {
            warn!("subscription store is in memory; quota and grants reset on restart");
            Arc::new(InMemorySubscriptionStore::new(policy))
        }
        StoreType::Sqlite => {
            let sqlite = config.subscription.store.sqlite().ok_or_else(|| {
                ServerError::Config("sqlite subscription.store requires path".to_string())
            })?;
            let store = SqliteSubscriptionStore::open(sqlite, policy)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Warns when the provider is reached over cleartext HTTP.
fn emit_cleartext_warning(config: &LookupGateConfig) {
    if config.provider.allow_http {
        warn!("provider.allow_http is set; provider traffic and the api key may travel in cleartext");
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

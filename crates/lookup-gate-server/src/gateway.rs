// crates/lookup-gate-server/src/gateway.rs
// ============================================================================
// Module: Gateway
// Description: Transport-neutral lookup and subscription administration.
// Purpose: Bind the dispatcher to caller status and admin operations.
// Dependencies: lookup-gate-core, tracing
// ============================================================================

//! ## Overview
//! [`Gateway`] is what inbound transports talk to. Lookups go straight to the
//! [`LookupDispatcher`] under the configured caller deadline; status and
//! administration read and write the subscription store the dispatcher
//! enforces. Admin rights come from configuration or from the persisted admin
//! flag on a caller record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use lookup_gate_core::CallerId;
use lookup_gate_core::CallerStatus;
use lookup_gate_core::DeadlineElapsed;
use lookup_gate_core::DispatchOutcome;
use lookup_gate_core::LookupDispatcher;
use lookup_gate_core::LookupSubmission;
use lookup_gate_core::StoreError;
use lookup_gate_core::SubscriptionStats;
use lookup_gate_core::SubscriptionStore;
use lookup_gate_core::TierGrant;
use lookup_gate_core::TierId;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admin request to grant a tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantRequest {
    /// Caller receiving the tier.
    pub caller_id: CallerId,
    /// Tier to grant.
    pub tier: TierId,
    /// Grant length in days; the configured default when absent.
    #[serde(default)]
    pub days: Option<u32>,
    /// Payment reference recorded with the grant.
    #[serde(default)]
    pub payment_ref: Option<String>,
}

/// Gateway failures for status and administration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The acting caller lacks admin rights.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The target caller is not registered.
    #[error("not found: {0}")]
    NotFound(String),
    /// The request is invalid.
    #[error("invalid request: {0}")]
    Invalid(String),
    /// The store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for GatewayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UnknownCaller(caller) => Self::NotFound(format!("unknown caller: {caller}")),
            StoreError::UnknownTier(tier) => Self::Invalid(format!("unknown tier: {tier}")),
            StoreError::Invalid(message) => Self::Invalid(message),
            StoreError::Store(message) => Self::Store(message),
        }
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Transport-neutral gateway.
pub struct Gateway {
    /// Lookup dispatcher.
    dispatcher: LookupDispatcher,
    /// Admins named in configuration.
    configured_admins: BTreeSet<CallerId>,
    /// How long a caller waits for one lookup.
    request_timeout: Duration,
}

impl Gateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(
        dispatcher: LookupDispatcher,
        admins: impl IntoIterator<Item = CallerId>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            configured_admins: admins.into_iter().collect(),
            request_timeout,
        }
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &LookupDispatcher {
        &self.dispatcher
    }

    /// Returns the subscription store.
    fn store(&self) -> &Arc<dyn SubscriptionStore> {
        self.dispatcher.store()
    }

    /// Persists the admin flag for every configured admin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the store fails.
    pub async fn bootstrap_admins(&self) -> Result<(), GatewayError> {
        let now = self.dispatcher.clock().now();
        for admin in &self.configured_admins {
            self.store().set_admin(admin, true, now).await?;
            info!(caller_id = %admin, "configured admin registered");
        }
        Ok(())
    }

    /// Runs one lookup under the caller deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineElapsed`] when the lookup outlives the deadline.
    pub async fn lookup(&self, submission: LookupSubmission) -> Result<DispatchOutcome, DeadlineElapsed> {
        self.dispatcher.dispatch_within(submission, self.request_timeout).await
    }

    /// Returns a caller's own subscription status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for unregistered callers.
    pub async fn caller_status(&self, caller: &CallerId) -> Result<CallerStatus, GatewayError> {
        let record = self
            .store()
            .caller(caller)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("unknown caller: {caller}")))?;
        let now = self.dispatcher.clock().now();
        Ok(CallerStatus::from_record(&record, self.store().policy(), now))
    }

    /// Checks that `actor` holds admin rights.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] for non-admins.
    pub async fn authorize_admin(&self, actor: &CallerId) -> Result<(), GatewayError> {
        if self.configured_admins.contains(actor) || self.store().is_admin(actor).await? {
            return Ok(());
        }
        Err(GatewayError::Forbidden(format!("caller {actor} is not an admin")))
    }

    /// Grants a tier, registering the target caller when needed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the actor is not an admin, the tier is
    /// unknown, or the store fails.
    pub async fn grant(&self, actor: &CallerId, request: GrantRequest) -> Result<CallerStatus, GatewayError> {
        self.authorize_admin(actor).await?;
        if request.caller_id.as_str().trim().is_empty() {
            return Err(GatewayError::Invalid("caller_id must be non-empty".to_string()));
        }
        let policy = self.store().policy();
        if !policy.has_tier(&request.tier) {
            return Err(GatewayError::Invalid(format!("unknown tier: {}", request.tier)));
        }
        let days = request.days.unwrap_or(policy.grant_days);
        if days == 0 {
            return Err(GatewayError::Invalid("grant days must be positive".to_string()));
        }
        let now = self.dispatcher.clock().now();
        self.store().register(&request.caller_id, now).await?;
        let grant = TierGrant {
            caller_id: request.caller_id,
            tier: request.tier,
            days,
            payment_ref: request.payment_ref,
            granted_by: actor.clone(),
        };
        let record = self.store().grant_tier(&grant, now).await?;
        info!(
            caller_id = %grant.caller_id,
            tier = %grant.tier,
            days,
            granted_by = %actor,
            "tier granted"
        );
        Ok(CallerStatus::from_record(&record, self.store().policy(), now))
    }

    /// Returns a caller to the default tier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the actor is not an admin or the caller is
    /// unknown.
    pub async fn revoke(&self, actor: &CallerId, caller: &CallerId) -> Result<CallerStatus, GatewayError> {
        self.authorize_admin(actor).await?;
        let now = self.dispatcher.clock().now();
        let record = self.store().revoke_tier(caller, now).await?;
        info!(caller_id = %caller, revoked_by = %actor, "tier revoked");
        Ok(CallerStatus::from_record(&record, self.store().policy(), now))
    }

    /// Returns any caller's status on behalf of an admin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the actor is not an admin or the caller is
    /// unknown.
    pub async fn inspect(&self, actor: &CallerId, caller: &CallerId) -> Result<CallerStatus, GatewayError> {
        self.authorize_admin(actor).await?;
        self.caller_status(caller).await
    }

    /// Returns aggregate subscription statistics on behalf of an admin.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the actor is not an admin or the store
    /// fails.
    pub async fn stats(&self, actor: &CallerId) -> Result<SubscriptionStats, GatewayError> {
        self.authorize_admin(actor).await?;
        let now = self.dispatcher.clock().now();
        Ok(self.store().stats(now).await?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use lookup_gate_core::StoreError;

    use super::GatewayError;

    #[test]
    fn invalid_store_input_is_a_client_error() {
        let error = GatewayError::from(StoreError::Invalid("days must be positive".to_string()));
        assert_eq!(error, GatewayError::Invalid("days must be positive".to_string()));
    }

    #[test]
    fn store_errors_map_by_cause() {
        assert!(matches!(
            GatewayError::from(StoreError::UnknownCaller("7".to_string())),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            GatewayError::from(StoreError::UnknownTier("gold".to_string())),
            GatewayError::Invalid(_)
        ));
        assert_eq!(
            GatewayError::from(StoreError::Store("disk full".to_string())),
            GatewayError::Store("disk full".to_string())
        );
    }
}

// crates/lookup-gate-server/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: axum router for lookups, caller status, and administration.
// Purpose: Translate HTTP requests into gateway calls and typed responses.
// Dependencies: axum, lookup-gate-core, serde
// ============================================================================

//! ## Overview
//! The router exposes `POST /v1/lookups`, `GET /v1/callers/{id}`, the
//! `/v1/admin` routes, and the `/healthz` and `/readyz` probes. Probes never
//! touch the provider or the store. Request bodies are capped at the
//! configured size and every error is a JSON body with a stable code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Request;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use lookup_gate_core::AdmissionReason;
use lookup_gate_core::CallerId;
use lookup_gate_core::CallerStatus;
use lookup_gate_core::DispatchOutcome;
use lookup_gate_core::FailureReport;
use lookup_gate_core::GateFailure;
use lookup_gate_core::LookupKind;
use lookup_gate_core::LookupSubmission;
use lookup_gate_core::NormalizedResult;
use lookup_gate_core::RequestId;
use lookup_gate_core::SubscriptionStats;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::AuthError;
use crate::auth::acting_caller;
use crate::auth::authorize_bearer;
use crate::gateway::Gateway;
use crate::gateway::GatewayError;
use crate::gateway::GrantRequest;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Router settings taken from the server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Bearer token required on `/v1` routes.
    pub bearer_token: Option<String>,
}

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    /// Gateway handling requests.
    gateway: Arc<Gateway>,
    /// Bearer token required on `/v1` routes.
    bearer_token: Option<Arc<str>>,
}

/// Builds the HTTP router.
#[must_use]
pub fn router(gateway: Arc<Gateway>, settings: RouterSettings) -> Router {
    let state = AppState {
        gateway,
        bearer_token: settings.bearer_token.as_deref().map(str::trim).map(Arc::from),
    };
    let v1 = Router::new()
        .route("/v1/lookups", post(submit_lookup))
        .route("/v1/callers/{id}", get(caller_status))
        .route("/v1/admin/grants", post(grant_tier))
        .route("/v1/admin/revocations", post(revoke_tier))
        .route("/v1/admin/callers/{id}", get(inspect_caller))
        .route("/v1/admin/stats", get(subscription_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));
    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(health))
        .merge(v1)
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Lookup request body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupBody {
    /// Lookup kind label.
    kind: String,
    /// Raw query value.
    query: String,
    /// Caller submitting the lookup.
    caller_id: String,
}

/// Lookup response body.
#[derive(Debug, Serialize)]
struct LookupResponse {
    /// Request identifier.
    request_id: RequestId,
    /// Lookup kind.
    kind: LookupKind,
    /// Terminal state label.
    state: &'static str,
    /// Whether the admin override applied.
    admin: bool,
    /// Provider attempts performed.
    provider_attempts: u32,
    /// Quota units remaining, for non-admin callers.
    quota_remaining: Option<u32>,
    /// Canonical result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<NormalizedResult>,
    /// Failure report on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReport>,
}

impl From<DispatchOutcome> for LookupResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        let failure = outcome.report();
        Self {
            request_id: outcome.request_id,
            kind: outcome.kind,
            state: outcome.state.label(),
            admin: outcome.admin,
            provider_attempts: outcome.provider_attempts,
            quota_remaining: outcome.quota_remaining,
            result: outcome.result.ok(),
            failure,
        }
    }
}

/// Revocation request body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RevokeBody {
    /// Caller returning to the default tier.
    caller_id: CallerId,
}

/// Probe response body.
#[derive(Debug, Serialize)]
struct HealthBody {
    /// Fixed status label.
    status: &'static str,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable error code.
    code: &'static str,
    /// Human-readable message.
    message: String,
    /// Request identifier when a lookup was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<RequestId>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP error response.
#[derive(Debug)]
struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Stable error code.
    code: &'static str,
    /// Human-readable message.
    message: String,
    /// Request identifier when a lookup was started.
    request_id: Option<RequestId>,
}

impl ApiError {
    /// Builds an error without a request identifier.
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
            request_id: self.request_id,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated(message) => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Forbidden(message) => Self::new(StatusCode::FORBIDDEN, "forbidden", message),
            GatewayError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            GatewayError::Invalid(message) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
            }
            GatewayError::Store(message) => {
                tracing::error!(error = %message, "subscription store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

/// Maps a lookup failure to an HTTP status.
const fn failure_status(failure: &GateFailure) -> StatusCode {
    match failure {
        GateFailure::AdmissionDenied {
            reason, ..
        } => match reason {
            AdmissionReason::RateLimited | AdmissionReason::TierExhausted => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AdmissionReason::Saturated => StatusCode::SERVICE_UNAVAILABLE,
            AdmissionReason::TierExpired | AdmissionReason::UnknownCaller => StatusCode::FORBIDDEN,
        },
        GateFailure::ProviderUnavailable {
            ..
        } => StatusCode::SERVICE_UNAVAILABLE,
        GateFailure::InvalidQuery {
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        GateFailure::MalformedResponse {
            ..
        } => StatusCode::BAD_GATEWAY,
        GateFailure::Internal {
            ..
        } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Rejects `/v1` requests without the configured bearer token.
async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match authorize_bearer(state.bearer_token.as_deref(), request.headers()) {
        Ok(()) => next.run(request).await,
        Err(error) => ApiError::from(error).into_response(),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness and readiness probe.
async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
    })
}

/// Runs one lookup.
async fn submit_lookup(
    State(state): State<AppState>,
    payload: Result<Json<LookupBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let caller = body.caller_id.trim();
    if caller.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "caller_id must be non-empty",
        ));
    }
    let kind = body
        .kind
        .parse::<LookupKind>()
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "unsupported_kind", err.to_string()))?;
    let submission = LookupSubmission {
        caller_id: CallerId::new(caller),
        kind,
        query: body.query,
    };
    let outcome = state.gateway.lookup(submission).await.map_err(|elapsed| ApiError {
        status: StatusCode::GATEWAY_TIMEOUT,
        code: "deadline_elapsed",
        message: "The lookup is taking longer than expected. Please try again later.".to_string(),
        request_id: Some(elapsed.request_id),
    })?;
    let status = outcome.result.as_ref().err().map_or(StatusCode::OK, failure_status);
    let retry_after = outcome.report().and_then(|report| report.retry_after_ms);
    let mut response = (status, Json(LookupResponse::from(outcome))).into_response();
    if let Some(retry_after_ms) = retry_after {
        let seconds = retry_after_ms.div_ceil(1_000).max(1);
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(seconds));
    }
    Ok(response)
}

/// Returns the caller's own status.
async fn caller_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallerStatus>, ApiError> {
    Ok(Json(state.gateway.caller_status(&CallerId::new(id)).await?))
}

/// Grants a tier.
async fn grant_tier(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> Result<Json<CallerStatus>, ApiError> {
    let actor = acting_caller(&headers)?;
    let Json(request) = payload?;
    Ok(Json(state.gateway.grant(&actor, request).await?))
}

/// Revokes a tier.
async fn revoke_tier(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RevokeBody>, JsonRejection>,
) -> Result<Json<CallerStatus>, ApiError> {
    let actor = acting_caller(&headers)?;
    let Json(body) = payload?;
    Ok(Json(state.gateway.revoke(&actor, &body.caller_id).await?))
}

/// Returns any caller's status.
async fn inspect_caller(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CallerStatus>, ApiError> {
    let actor = acting_caller(&headers)?;
    Ok(Json(state.gateway.inspect(&actor, &CallerId::new(id)).await?))
}

/// Returns aggregate statistics.
async fn subscription_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionStats>, ApiError> {
    let actor = acting_caller(&headers)?;
    Ok(Json(state.gateway.stats(&actor).await?))
}

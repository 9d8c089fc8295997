// crates/lookup-gate-providers/src/routes.rs
// ============================================================================
// Module: Provider Routes
// Description: Per-kind endpoint paths and query parameter names.
// Purpose: Build provider endpoints from configuration without leaking secrets.
// Dependencies: lookup-gate-core, serde, url
// ============================================================================

//! ## Overview
//! Every lookup kind maps to a route on the provider base URL: an optional
//! path appended to the base and the query parameter carrying the value. The
//! API key travels as its own query parameter and is masked whenever an
//! endpoint is rendered for logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lookup_gate_core::LookupKind;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default query parameter carrying the API key.
pub const DEFAULT_KEY_PARAM: &str = "key";
/// Placeholder rendered in place of secrets.
pub const REDACTED: &str = "<redacted>";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Route for one lookup kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Path appended to the base URL; empty uses the base URL as is.
    #[serde(default)]
    pub path: String,
    /// Query parameter carrying the lookup value.
    pub param: String,
}

impl RouteSpec {
    /// Creates a route on the base URL itself.
    #[must_use]
    pub fn param(param: &str) -> Self {
        Self {
            path: String::new(),
            param: param.to_string(),
        }
    }
}

/// Routes for every lookup kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRoutes {
    /// Phone route.
    #[serde(default = "default_phone_route")]
    pub phone: RouteSpec,
    /// Vehicle route.
    #[serde(default = "default_vehicle_route")]
    pub vehicle: RouteSpec,
    /// Aadhaar route.
    #[serde(default = "default_aadhaar_route")]
    pub aadhaar: RouteSpec,
    /// UPI route.
    #[serde(default = "default_upi_route")]
    pub upi: RouteSpec,
}

impl Default for ProviderRoutes {
    fn default() -> Self {
        Self {
            phone: default_phone_route(),
            vehicle: default_vehicle_route(),
            aadhaar: default_aadhaar_route(),
            upi: default_upi_route(),
        }
    }
}

impl ProviderRoutes {
    /// Returns the route for a kind.
    #[must_use]
    pub const fn route(&self, kind: LookupKind) -> &RouteSpec {
        match kind {
            LookupKind::Phone => &self.phone,
            LookupKind::Vehicle => &self.vehicle,
            LookupKind::Aadhaar => &self.aadhaar,
            LookupKind::Upi => &self.upi,
        }
    }

    /// Returns an error message for the first unusable route.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        LookupKind::ALL.into_iter().find_map(|kind| {
            let route = self.route(kind);
            if route.param.trim().is_empty() {
                return Some(format!("route for {kind} needs a query parameter"));
            }
            if route.path.contains(['?', '#']) {
                return Some(format!("route path for {kind} must not carry a query or fragment"));
            }
            None
        })
    }
}

fn default_phone_route() -> RouteSpec {
    RouteSpec::param("number")
}

fn default_vehicle_route() -> RouteSpec {
    RouteSpec::param("vehicle")
}

fn default_aadhaar_route() -> RouteSpec {
    RouteSpec::param("aadhaar")
}

fn default_upi_route() -> RouteSpec {
    RouteSpec::param("upi")
}

// ============================================================================
// SECTION: Endpoint Construction
// ============================================================================

/// Builds the endpoint for one lookup.
///
/// # Errors
///
/// Returns a description when the route path cannot be joined to the base.
pub fn build_endpoint(
    base: &Url,
    route: &RouteSpec,
    key_param: &str,
    api_key: Option<&str>,
    query: &str,
) -> Result<Url, String> {
    let mut url = if route.path.is_empty() {
        base.clone()
    } else {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(route.path.trim_start_matches('/'))
            .map_err(|err| format!("invalid route path: {err}"))?
    };
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(key) = api_key {
            pairs.append_pair(key_param, key);
        }
        pairs.append_pair(&route.param, query);
    }
    Ok(url)
}

/// Renders an endpoint with the key parameter masked.
#[must_use]
pub fn redact_endpoint(url: &Url, key_param: &str) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == key_param { REDACTED.to_string() } else { value.into_owned() };
            (name.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.set_query(None);
    if !pairs.is_empty() {
        redacted.query_pairs_mut().extend_pairs(pairs);
    }
    redacted.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

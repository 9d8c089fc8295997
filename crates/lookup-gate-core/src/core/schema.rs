// crates/lookup-gate-core/src/core/schema.rs
// ============================================================================
// Module: Lookup Result Schemas
// Description: Declared per-kind field schemas and canonical result shapes.
// Purpose: Give every lookup kind a stable output schema independent of provider keys.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Each lookup kind declares an ordered list of canonical fields. A field
//! names the provider keys it may be sourced from (first present wins) and
//! whether it is required. Required fields that are missing are reported on
//! the result but never fail the lookup; the value renders as
//! [`FieldValue::NotAvailable`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::lookup::LookupKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Field Schemas
// ============================================================================

/// Display text for fields without a usable value.
pub const NOT_AVAILABLE: &str = "not available";

/// Canonical field declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical field name.
    pub name: &'static str,
    /// Provider keys consulted in order.
    pub sources: &'static [&'static str],
    /// Whether the field is required for a complete record.
    pub required: bool,
}

/// Shorthand constructor for schema tables.
const fn field(name: &'static str, sources: &'static [&'static str], required: bool) -> FieldSpec {
    FieldSpec {
        name,
        sources,
        required,
    }
}

/// Phone lookup schema.
const PHONE_FIELDS: &[FieldSpec] = &[
    field("name", &["name", "full_name", "subscriber_name"], true),
    field("father_name", &["father_name", "fname", "father"], false),
    field("mobile", &["mobile", "phone", "number", "msisdn"], true),
    field("alternate_mobile", &["alt", "alternate_mobile", "alt_mobile", "alternate"], false),
    field("address", &["address", "location"], false),
    field("circle", &["circle", "operator", "telecom_circle"], false),
    field("email", &["email", "mail"], false),
    field("id_number", &["id", "id_number", "document_id"], false),
];

/// Vehicle lookup schema.
const VEHICLE_FIELDS: &[FieldSpec] = &[
    field("owner", &["owner", "owner_name", "name"], true),
    field("father_name", &["father_name", "fname"], false),
    field(
        "vehicle_number",
        &["vehicle_number", "rc_number", "registration_number", "vehicle", "reg_no"],
        true,
    ),
    field("vehicle_type", &["vehicle_type", "vehicle_class", "class"], false),
    field("model", &["model", "maker_model", "maker"], false),
    field("registration_date", &["registration_date", "reg_date", "registered"], false),
    field("fuel_type", &["fuel_type", "fuel"], false),
    field("insurance_upto", &["insurance_upto", "insurance_expiry", "insurance_valid_till"], false),
    field("address", &["address", "present_address", "permanent_address"], false),
    field("city", &["city", "district"], false),
    field("state", &["state"], false),
];

/// Aadhaar lookup schema.
const AADHAAR_FIELDS: &[FieldSpec] = &[
    field("name", &["name", "full_name"], true),
    field("father_name", &["father_name", "fname", "care_of"], false),
    field("gender", &["gender", "sex"], false),
    field("dob", &["dob", "date_of_birth", "birth_date"], false),
    field("age", &["age"], false),
    field("address", &["address", "location"], false),
    field("city", &["city", "district"], false),
    field("state", &["state"], false),
    field("pincode", &["pincode", "pin", "zip"], false),
    field("mobile", &["mobile", "phone"], false),
    field("email", &["email", "mail"], false),
];

/// UPI lookup schema.
const UPI_FIELDS: &[FieldSpec] = &[
    field("name", &["name", "payee_name", "account_name"], true),
    field("upi_id", &["upi_id", "upi", "vpa"], true),
    field("bank", &["bank", "bank_name"], false),
    field("branch", &["branch", "branch_name"], false),
    field("ifsc", &["ifsc", "ifsc_code"], false),
    field("account_type", &["account_type"], false),
    field("mobile", &["mobile", "phone"], false),
    field("status", &["status", "active", "verified"], false),
];

/// Provider keys carrying envelope metadata rather than record fields.
pub const ENVELOPE_KEYS: &[&str] = &[
    "success",
    "message",
    "msg",
    "error",
    "errors",
    "timestamp",
    "updated_at",
    "last_updated",
    "code",
    "status_code",
    "credit",
    "credits",
    "developer",
];

/// Provider keys carrying record collections.
pub const COLLECTION_KEYS: &[&str] = &["data", "result", "results", "records"];

/// Provider keys carrying a provider-reported freshness timestamp.
pub const FRESHNESS_KEYS: &[&str] = &["timestamp", "updated_at", "last_updated"];

/// Returns the declared schema for a lookup kind.
#[must_use]
pub const fn schema_for(kind: LookupKind) -> &'static [FieldSpec] {
    match kind {
        LookupKind::Phone => PHONE_FIELDS,
        LookupKind::Vehicle => VEHICLE_FIELDS,
        LookupKind::Aadhaar => AADHAAR_FIELDS,
        LookupKind::Upi => UPI_FIELDS,
    }
}

// ============================================================================
// SECTION: Canonical Results
// ============================================================================

/// Canonical field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Value supplied by the provider.
    Present(String),
    /// Value missing, null, or blank.
    NotAvailable,
}

impl FieldValue {
    /// Returns the display text for the value.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            Self::Present(value) => value,
            Self::NotAvailable => NOT_AVAILABLE,
        }
    }

    /// Returns true when the provider supplied a value.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// One canonical field in a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedField {
    /// Canonical field name.
    pub name: String,
    /// Field value.
    pub value: FieldValue,
}

/// One normalized record.
///
/// # Invariants
/// - `fields` follows the declared schema order for the kind and always
///   contains every declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Declared fields in schema order.
    pub fields: Vec<NormalizedField>,
    /// Provider fields outside the declared schema, flattened to strings.
    pub extra: BTreeMap<String, String>,
}

impl NormalizedRecord {
    /// Returns the value of a declared field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.value)
    }
}

/// Source freshness marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    /// Time the gateway received the provider payload.
    pub fetched_at: Timestamp,
    /// Provider-reported timestamp, verbatim, when present.
    pub provider_reported_at: Option<String>,
}

/// Canonical lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResult {
    /// Lookup kind.
    pub kind: LookupKind,
    /// True when at least one record was found.
    pub success: bool,
    /// Normalized records.
    pub records: Vec<NormalizedRecord>,
    /// Source freshness marker.
    pub freshness: Freshness,
    /// Required fields missing from at least one record.
    pub missing_required: Vec<String>,
    /// Provider notice accompanying an empty result.
    pub notice: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

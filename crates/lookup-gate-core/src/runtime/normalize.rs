// crates/lookup-gate-core/src/runtime/normalize.rs
// ============================================================================
// Module: Response Normalizer
// Description: Maps raw provider payloads onto per-kind canonical schemas.
// Purpose: Give callers one stable result shape whatever the provider returns.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Normalization happens in two steps. [`classify`] inspects the raw JSON and
//! names its shape as a [`PayloadShape`]; [`normalize`] then maps every
//! record in that shape onto the declared schema for the lookup kind.
//!
//! Security posture: provider payloads are untrusted. Provider error text is
//! carried in [`NormalizeError`] for logs only, and the number of extra
//! fields copied into a record is bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::FieldSpec;
use crate::core::FieldValue;
use crate::core::Freshness;
use crate::core::GateFailure;
use crate::core::LookupKind;
use crate::core::NormalizedField;
use crate::core::NormalizedRecord;
use crate::core::NormalizedResult;
use crate::core::Timestamp;
use crate::core::schema::COLLECTION_KEYS;
use crate::core::schema::ENVELOPE_KEYS;
use crate::core::schema::FRESHNESS_KEYS;
use crate::core::schema::schema_for;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum provider fields kept outside the declared schema per record.
pub const MAX_EXTRA_FIELDS: usize = 32;
/// Keys carrying a provider-side error.
const ERROR_KEYS: &[&str] = &["error", "errors"];
/// Keys carrying a provider notice.
const NOTICE_KEYS: &[&str] = &["message", "msg"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Payload is absent, empty, or has no recognizable shape.
    #[error("malformed provider payload: {0}")]
    Malformed(String),
    /// Payload embeds a provider-side error.
    #[error("provider reported error: {0}")]
    ProviderError(String),
}

impl From<NormalizeError> for GateFailure {
    fn from(value: NormalizeError) -> Self {
        match value {
            NormalizeError::Malformed(detail) => Self::MalformedResponse {
                detail,
            },
            NormalizeError::ProviderError(detail) => Self::InvalidQuery {
                detail,
            },
        }
    }
}

// ============================================================================
// SECTION: Payload Shapes
// ============================================================================

/// Recognized provider payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape<'a> {
    /// Record objects from a collection key or a top-level array.
    Records(Vec<&'a Map<String, Value>>),
    /// One record object under a collection key.
    Single(&'a Map<String, Value>),
    /// Record fields at the top level of the payload.
    Flat(&'a Map<String, Value>),
    /// Explicit empty result.
    NoData {
        /// Provider notice, when present.
        notice: Option<String>,
    },
    /// Embedded provider error.
    ProviderError(String),
}

/// Classifies a raw provider payload.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] for null, scalar, or empty payloads
/// and for collections without any record objects.
pub fn classify(payload: &Value) -> Result<PayloadShape<'_>, NormalizeError> {
    match payload {
        Value::Object(map) => classify_object(map),
        Value::Array(items) => classify_items(items, None),
        Value::Null => Err(NormalizeError::Malformed("payload is null".to_string())),
        Value::String(text) if text.trim().is_empty() => {
            Err(NormalizeError::Malformed("payload is empty".to_string()))
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Err(NormalizeError::Malformed("payload is not an object or array".to_string()))
        }
    }
}

/// Classifies an object payload.
fn classify_object(map: &Map<String, Value>) -> Result<PayloadShape<'_>, NormalizeError> {
    if map.is_empty() {
        return Err(NormalizeError::Malformed("payload is an empty object".to_string()));
    }
    if let Some(detail) = provider_error(map) {
        return Ok(PayloadShape::ProviderError(detail));
    }
    let notice = notice(map);
    if let Some(collection) = COLLECTION_KEYS.iter().find_map(|key| map.get(*key)) {
        return match collection {
            Value::Array(items) => classify_items(items, notice),
            Value::Object(inner) if inner.is_empty() => Ok(PayloadShape::NoData {
                notice,
            }),
            Value::Object(inner) => Ok(PayloadShape::Single(inner)),
            Value::Null => Ok(PayloadShape::NoData {
                notice,
            }),
            Value::String(text) => {
                let text = text.trim();
                Ok(PayloadShape::NoData {
                    notice: if text.is_empty() { notice } else { Some(text.to_string()) },
                })
            }
            Value::Number(_) | Value::Bool(_) => {
                Err(NormalizeError::Malformed("collection key holds a scalar".to_string()))
            }
        };
    }
    if map.keys().all(|key| is_envelope_key(key)) {
        return Ok(PayloadShape::NoData {
            notice,
        });
    }
    Ok(PayloadShape::Flat(map))
}

/// Classifies an array of candidate records.
fn classify_items(
    items: &[Value],
    notice: Option<String>,
) -> Result<PayloadShape<'_>, NormalizeError> {
    if items.is_empty() {
        return Ok(PayloadShape::NoData {
            notice,
        });
    }
    let records: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
    if records.is_empty() {
        return Err(NormalizeError::Malformed("collection contains no record objects".to_string()));
    }
    Ok(PayloadShape::Records(records))
}

/// Returns the embedded provider error, if any.
fn provider_error(map: &Map<String, Value>) -> Option<String> {
    ERROR_KEYS.iter().filter_map(|key| map.get(*key)).find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Bool(true) => {
            Some(notice(map).unwrap_or_else(|| "provider reported an error".to_string()))
        }
        Value::Number(number) if number.as_f64().is_some_and(|n| n.abs() > f64::EPSILON) => {
            Some(format!("provider error code {number}"))
        }
        Value::Object(inner) if !inner.is_empty() => {
            Some(notice(inner).unwrap_or_else(|| value.to_string()))
        }
        Value::Array(items) if !items.is_empty() => Some(value.to_string()),
        _ => None,
    })
}

/// Returns the first non-empty provider notice.
fn notice(map: &Map<String, Value>) -> Option<String> {
    NOTICE_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Returns true for envelope metadata keys.
fn is_envelope_key(key: &str) -> bool {
    ENVELOPE_KEYS.iter().any(|envelope| envelope.eq_ignore_ascii_case(key))
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes a raw provider payload for `kind`.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] for unusable payloads and
/// [`NormalizeError::ProviderError`] for embedded provider errors.
pub fn normalize(
    kind: LookupKind,
    payload: &Value,
    fetched_at: Timestamp,
) -> Result<NormalizedResult, NormalizeError> {
    let shape = classify(payload)?;
    let (objects, notice) = match shape {
        PayloadShape::ProviderError(detail) => return Err(NormalizeError::ProviderError(detail)),
        PayloadShape::NoData {
            notice,
        } => (Vec::new(), notice),
        PayloadShape::Records(objects) => (objects, None),
        PayloadShape::Single(object) | PayloadShape::Flat(object) => (vec![object], None),
    };
    let schema = schema_for(kind);
    let mut missing_required: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(objects.len());
    for object in objects {
        let record = normalize_record(schema, object);
        for spec in schema.iter().filter(|spec| spec.required) {
            let present = record.get(spec.name).is_some_and(FieldValue::is_present);
            if !present && !missing_required.iter().any(|name| name == spec.name) {
                missing_required.push(spec.name.to_string());
            }
        }
        records.push(record);
    }
    Ok(NormalizedResult {
        kind,
        success: !records.is_empty(),
        records,
        freshness: Freshness {
            fetched_at,
            provider_reported_at: payload.as_object().and_then(provider_timestamp),
        },
        missing_required,
        notice,
    })
}

/// Maps one provider object onto the declared schema.
fn normalize_record(schema: &[FieldSpec], object: &Map<String, Value>) -> NormalizedRecord {
    let fields = schema
        .iter()
        .map(|spec| NormalizedField {
            name: spec.name.to_string(),
            value: spec
                .sources
                .iter()
                .filter_map(|source| lookup_key(object, source))
                .map(render)
                .find(FieldValue::is_present)
                .unwrap_or(FieldValue::NotAvailable),
        })
        .collect();
    let mut extra = BTreeMap::new();
    for (key, value) in object {
        if extra.len() >= MAX_EXTRA_FIELDS {
            break;
        }
        let claimed = schema
            .iter()
            .flat_map(|spec| spec.sources.iter())
            .any(|source| source.eq_ignore_ascii_case(key));
        if claimed || is_envelope_key(key) {
            continue;
        }
        if let FieldValue::Present(text) = render(value) {
            extra.insert(key.clone(), text);
        }
    }
    NormalizedRecord {
        fields,
        extra,
    }
}

/// Finds a provider key, ignoring ASCII case.
fn lookup_key<'a>(object: &'a Map<String, Value>, source: &str) -> Option<&'a Value> {
    object.get(source).or_else(|| {
        object.iter().find(|(key, _)| key.eq_ignore_ascii_case(source)).map(|(_, value)| value)
    })
}

/// Renders a provider value as display text.
fn render(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::NotAvailable,
        Value::String(text) => present(text.trim()),
        Value::Number(number) => FieldValue::Present(number.to_string()),
        Value::Bool(flag) => FieldValue::Present(flag.to_string()),
        Value::Array(items) => {
            if items.iter().any(|item| item.is_object() || item.is_array()) {
                return FieldValue::Present(value.to_string());
            }
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match render(item) {
                    FieldValue::Present(text) => Some(text),
                    FieldValue::NotAvailable => None,
                })
                .collect();
            present(&parts.join(", "))
        }
        Value::Object(map) if map.is_empty() => FieldValue::NotAvailable,
        Value::Object(_) => FieldValue::Present(value.to_string()),
    }
}

/// Wraps non-empty text.
fn present(text: &str) -> FieldValue {
    if text.is_empty() { FieldValue::NotAvailable } else { FieldValue::Present(text.to_string()) }
}

/// Returns the provider-reported timestamp, verbatim.
fn provider_timestamp(map: &Map<String, Value>) -> Option<String> {
    FRESHNESS_KEYS.iter().filter_map(|key| map.get(*key)).find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

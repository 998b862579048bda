//! Turns whatever the analysis service sent into a [`NormalizedAnalysis`].
//!
//! The service has answered with at least eight different shapes over time:
//! ids under `response_id` or `id`, timestamps as RFC 3339 text, naive
//! datetimes or Unix epochs, and the markdown body under `result`, `content`
//! or `response`, sometimes wrapped in another object. Each concern is one
//! rule in its own function so they can be tested in isolation. None of the
//! rules can fail; an unrecognized field just yields its default.

mod content;
mod payload;
mod timestamp;

use jiff::Timestamp;
use serde_json::{Map, Value};
use tracing::debug;

use crate::NormalizedAnalysis;

pub use payload::{decode_model_catalog, decode_model_switch, decode_sensor_readings};
pub(crate) use timestamp::parse_timestamp;

/// Analysis exactly as received from the service.
pub type RawAnalysisPayload = Value;

const RESPONSE_ID_KEYS: [&str; 2] = ["response_id", "id"];
const DATA_ID_KEYS: [&str; 1] = ["data_id"];

/// Normalize one analysis payload, resolving missing timestamps to now.
pub fn normalize(raw: Option<&RawAnalysisPayload>) -> NormalizedAnalysis {
    normalize_at(raw, Timestamp::now())
}

/// Normalize one analysis payload against a fixed "now".
pub fn normalize_at(raw: Option<&RawAnalysisPayload>, now: Timestamp) -> NormalizedAnalysis {
    let Some(raw) = raw else {
        return NormalizedAnalysis::default();
    };

    let Some(fields) = raw.as_object() else {
        if !raw.is_null() {
            debug!(kind = value_kind(raw), "analysis payload is not an object");
        }
        return NormalizedAnalysis::default();
    };

    NormalizedAnalysis {
        response_id: identifier(fields, &RESPONSE_ID_KEYS),
        data_id: identifier(fields, &DATA_ID_KEYS),
        message: message(fields),
        content: content::extract_content(fields),
        timestamp: Some(timestamp::resolve_timestamp(fields, now)),
    }
}

/// First non-null value among `keys`, coerced to an integer.
///
/// A present but non-numeric id does not fall through to the next key.
fn identifier(fields: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    let (key, value) = keys
        .iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()).map(|v| (*key, v)))?;

    let id = coerce_integer(value);
    if id.is_none() {
        debug!(key, kind = value_kind(value), "ignoring non-numeric identifier");
    }
    id
}

fn message(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("message") {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// Integer value of a JSON number or numeric string with no fractional part.
pub(crate) fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(integral)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value <= i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Loose truthiness used when picking between alternative fields: null,
/// `false`, zero and the empty string count as absent.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> Timestamp {
        Timestamp::from_second(1_750_000_000).unwrap()
    }

    #[test]
    fn missing_payload_yields_empty_record() {
        assert_eq!(normalize(None), NormalizedAnalysis::default());
        assert_eq!(normalize(Some(&Value::Null)), NormalizedAnalysis::default());
    }

    #[test]
    fn non_object_payload_yields_empty_record() {
        let raw = json!(["not", "an", "analysis"]);
        assert_eq!(normalize(Some(&raw)), NormalizedAnalysis::default());
    }

    #[test]
    fn typical_processing_response() {
        let raw = json!({
            "message": "Datos procesados correctamente",
            "data_id": 12,
            "response_id": 34,
            "response": "# Summary\n\nAll good."
        });

        let normalized = normalize_at(Some(&raw), now());

        assert_eq!(normalized.response_id, Some(34));
        assert_eq!(normalized.data_id, Some(12));
        assert_eq!(
            normalized.message.as_deref(),
            Some("Datos procesados correctamente")
        );
        assert_eq!(normalized.content, "# Summary\n\nAll good.");
        assert_eq!(normalized.timestamp, Some(now()));
    }

    #[test]
    fn id_is_used_when_response_id_is_missing() {
        let raw = json!({ "id": "7", "content": "x" });
        assert_eq!(normalize_at(Some(&raw), now()).response_id, Some(7));
    }

    #[test]
    fn response_id_wins_over_id() {
        let raw = json!({ "response_id": 3, "id": 9 });
        assert_eq!(normalize_at(Some(&raw), now()).response_id, Some(3));
    }

    #[test]
    fn non_numeric_identifier_is_dropped() {
        let raw = json!({ "response_id": "abc", "id": 9, "data_id": "x1" });
        let normalized = normalize_at(Some(&raw), now());

        assert_eq!(normalized.response_id, None);
        assert_eq!(normalized.data_id, None);
    }

    #[test]
    fn identifiers_coerce_from_numeric_like_values() {
        assert_eq!(coerce_integer(&json!(5)), Some(5));
        assert_eq!(coerce_integer(&json!(5.0)), Some(5));
        assert_eq!(coerce_integer(&json!(" 42 ")), Some(42));
        assert_eq!(coerce_integer(&json!("42.0")), Some(42));
        assert_eq!(coerce_integer(&json!(5.5)), None);
        assert_eq!(coerce_integer(&json!(true)), None);
        assert_eq!(coerce_integer(&json!({ "id": 1 })), None);
    }

    #[test]
    fn empty_message_is_absent() {
        let raw = json!({ "message": "" });
        assert_eq!(normalize_at(Some(&raw), now()).message, None);
    }

    #[test]
    fn payload_without_content_fields_has_empty_content() {
        let raw = json!({ "response_id": 1, "message": "done", "timestamp": "2024-01-01T00:00:00Z" });
        assert_eq!(normalize_at(Some(&raw), now()).content, "");
    }

    #[test]
    fn doubly_wrapped_response_is_unwrapped() {
        let raw = json!({ "response": { "response": { "content": "X" } } });
        assert_eq!(normalize_at(Some(&raw), now()).content, "X");
    }

    #[test]
    fn numeric_content_field_yields_empty_content() {
        let raw = json!({ "response_id": 4, "response": 17 });
        let normalized = normalize_at(Some(&raw), now());

        assert_eq!(normalized.response_id, Some(4));
        assert_eq!(normalized.content, "");
    }

    #[test]
    fn epoch_seconds_string_is_scaled() {
        let raw = json!({ "timestamp": "1700000000" });
        let normalized = normalize_at(Some(&raw), now());

        assert_eq!(
            normalized.timestamp,
            Some(Timestamp::from_second(1_700_000_000).unwrap())
        );
        assert_eq!(
            normalized.timestamp.unwrap().to_string(),
            "2023-11-14T22:13:20Z"
        );
    }

    #[test]
    fn epoch_milliseconds_string_is_kept() {
        let raw = json!({ "timestamp": "1700000000123" });
        assert_eq!(
            normalize_at(Some(&raw), now()).timestamp,
            Some(Timestamp::from_millisecond(1_700_000_000_123).unwrap())
        );
    }

    #[test]
    fn every_object_payload_gets_a_timestamp() {
        let raw = json!({ "date": "not a date at all" });
        assert_eq!(normalize_at(Some(&raw), now()).timestamp, Some(now()));

        let raw = json!({});
        assert_eq!(normalize_at(Some(&raw), now()).timestamp, Some(now()));
    }

    #[test]
    fn truthiness_matches_field_selection_rules() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
    }
}

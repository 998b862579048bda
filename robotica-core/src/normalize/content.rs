use serde_json::{Map, Value};

use super::is_truthy;

/// Top-level fields that may carry the analysis body, by precedence.
const CONTENT_KEYS: [&str; 3] = ["result", "content", "response"];

/// Keys looked up inside an object body, by precedence.
const PAYLOAD_KEYS: [&str; 3] = ["data", "content", "result"];

/// Resolve the display content of an analysis payload.
///
/// Empty when no rule finds a string or object to show.
pub(super) fn extract_content(fields: &Map<String, Value>) -> String {
    select_content_field(fields)
        .map(unwrap_nested_response)
        .map(unwrap_payload_key)
        .filter(|value| is_truthy(value))
        .or_else(|| nested_data_result(fields))
        .map(render_content)
        .unwrap_or_default()
}

/// First truthy value among `result`, `content` and `response`.
pub(super) fn select_content_field(fields: &Map<String, Value>) -> Option<&Value> {
    CONTENT_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| is_truthy(value))
}

/// `{"response": inner}` becomes `inner`. Applied once.
pub(super) fn unwrap_nested_response(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|object| object.get("response"))
        .unwrap_or(value)
}

/// Descend into `data`, `content` or `result` of an object body.
pub(super) fn unwrap_payload_key(value: &Value) -> &Value {
    let Some(object) = value.as_object() else {
        return value;
    };

    PAYLOAD_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .unwrap_or(value)
}

/// Older service builds put the body under `data.result`.
pub(super) fn nested_data_result(fields: &Map<String, Value>) -> Option<&Value> {
    fields
        .get("data")
        .and_then(Value::as_object)
        .and_then(|data| data.get("result"))
        .filter(|value| is_truthy(value))
}

/// Text to display for a content value. Structured bodies become JSON text.
pub(super) fn render_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
        Value::Null | Value::Bool(_) | Value::Number(_) => String::new(),
    }
}

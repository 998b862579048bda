use jiff::civil;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use serde_json::{Map, Value};
use tracing::debug;

use super::is_truthy;

/// Fields that may carry the creation time, by precedence.
const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "created_at", "date"];

/// Epochs rendered with at most this many characters are in seconds.
const EPOCH_SECONDS_MAX_DIGITS: usize = 10;

pub(super) fn resolve_timestamp(fields: &Map<String, Value>, now: Timestamp) -> Timestamp {
    let Some(candidate) = TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| is_truthy(value))
    else {
        return now;
    };

    parse_timestamp(candidate).unwrap_or_else(|| {
        debug!(%candidate, "unresolvable timestamp, using current time");
        now
    })
}

/// Interpret a wire timestamp: Unix epoch (number or numeric text), RFC 3339,
/// naive local datetime, date, or RFC 2822.
pub(crate) fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(text) => {
            let text = text.trim();
            match text.parse::<f64>() {
                Ok(epoch) if epoch.is_finite() => from_epoch(epoch),
                _ => parse_text(text),
            }
        }
        _ => None,
    }
}

fn from_epoch(epoch: f64) -> Option<Timestamp> {
    let millis = if epoch.to_string().len() <= EPOCH_SECONDS_MAX_DIGITS {
        epoch * 1000.0
    } else {
        epoch
    };

    if !millis.is_finite() {
        return None;
    }

    // `as` saturates; out-of-range values are rejected by jiff.
    Timestamp::from_millisecond(millis.trunc() as i64).ok()
}

fn parse_text(text: &str) -> Option<Timestamp> {
    if text.is_empty() {
        return None;
    }

    if let Ok(ts) = text.parse::<Timestamp>() {
        return Some(ts);
    }

    // A bare date means midnight UTC; a datetime without offset is local.
    if !text.contains(['T', 't', ' ']) {
        return text
            .parse::<civil::Date>()
            .ok()
            .and_then(|date| date.to_zoned(TimeZone::UTC).ok())
            .map(|zoned| zoned.timestamp());
    }

    if let Ok(datetime) = text.parse::<civil::DateTime>() {
        return datetime
            .to_zoned(TimeZone::system())
            .ok()
            .map(|zoned| zoned.timestamp());
    }

    jiff::fmt::rfc2822::parse(text)
        .ok()
        .map(|zoned| zoned.timestamp())
}

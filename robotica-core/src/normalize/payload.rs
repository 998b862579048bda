use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{coerce_integer, is_truthy, parse_timestamp, value_kind};
use crate::{GpsFix, ModelCatalog, ModelSwitch, SatelliteWeather, SensorGroup, SensorReading};

/// Prefix the sensor service puts in front of every sensor group.
const SENSOR_GROUP_PREFIX: &str = "sensor_";

const GPS_KEYS: [&str; 1] = ["gps"];
const SATELLITE_KEYS: [&str; 2] = ["clima_satelital", "satellite_weather"];

/// Decode a `/sensor-data` body.
///
/// Accepts `{"data": [...]}` and a bare array. Returns `None` when neither is
/// present; entries that are not objects are skipped.
pub fn decode_sensor_readings(body: &Value, now: Timestamp) -> Option<Vec<SensorReading>> {
    let items = body
        .as_array()
        .or_else(|| body.get("data").and_then(Value::as_array))?;

    let readings = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match item.as_object() {
            Some(fields) => Some(decode_reading(fields, now)),
            None => {
                warn!(index, kind = value_kind(item), "skipping malformed sensor reading");
                None
            }
        })
        .collect();

    Some(readings)
}

fn decode_reading(fields: &Map<String, Value>, now: Timestamp) -> SensorReading {
    let groups = fields
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(SENSOR_GROUP_PREFIX)?;
            let readings = value.as_object()?;
            Some((name.to_owned(), decode_group(readings)))
        })
        .collect();

    SensorReading {
        id: fields.get("id").and_then(coerce_integer).unwrap_or_default(),
        record_id: fields
            .get("record_id")
            .and_then(coerce_integer)
            .unwrap_or_default(),
        timestamp: fields
            .get("timestamp")
            .filter(|value| is_truthy(value))
            .and_then(parse_timestamp)
            .unwrap_or(now),
        groups,
        gps: first_decodable::<GpsFix>(fields, &GPS_KEYS),
        satellite_weather: first_decodable::<SatelliteWeather>(fields, &SATELLITE_KEYS),
    }
}

fn decode_group(readings: &Map<String, Value>) -> SensorGroup {
    readings
        .iter()
        .filter_map(|(name, value)| match value {
            Value::Number(n) => Some((name.clone(), n.as_f64())),
            Value::Null => Some((name.clone(), None)),
            _ => None,
        })
        .collect::<BTreeMap<_, _>>()
}

fn first_decodable<T>(fields: &Map<String, Value>, keys: &[&str]) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .filter(|value| !value.is_null())
        .find_map(|value| match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(error = %e, "ignoring undecodable sensor section");
                None
            }
        })
}

/// Decode a `/modelos` body and make the active flags agree with the
/// advertised active model.
pub fn decode_model_catalog(body: &Value) -> Option<ModelCatalog> {
    if !body.is_object() {
        return None;
    }

    let mut catalog = match ModelCatalog::deserialize(body) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "unrecognized model catalog");
            return None;
        }
    };

    match catalog.active_model.clone() {
        Some(name) if catalog.activate(&name) => {}
        _ => catalog.active_model = catalog.active().map(|m| m.name.clone()),
    }

    Some(catalog)
}

/// Decode a `/cambiar-modelo` acknowledgement. Missing fields default to the
/// requested model.
pub fn decode_model_switch(body: &Value, requested: &str) -> ModelSwitch {
    let text = |keys: &[&str]| {
        keys.iter()
            .filter_map(|key| body.get(*key))
            .find_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    ModelSwitch {
        message: text(&["mensaje", "message"])
            .unwrap_or_else(|| format!("Model switched to {requested}")),
        model: text(&["modelo", "model"]).unwrap_or_else(|| requested.to_owned()),
    }
}

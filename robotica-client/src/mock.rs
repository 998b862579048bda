//! Schema-correct stand-ins for every remote payload, served while the
//! analysis service is unreachable.

use std::collections::BTreeMap;

use jiff::{SignedDuration, Timestamp};
use rand::Rng;
use robotica_core::{ModelCatalog, ModelDescriptor, NormalizedAnalysis, SensorGroup, SensorReading};
use serde_json::{Map, Value};

pub const SENSOR_SET_SIZE: usize = 15;
pub const HISTORY_SIZE: usize = 5;

/// Seconds between two consecutive mock readings.
const READING_SPACING_SECS: i64 = 10 * 60;
const DAY_SECS: i64 = 24 * 60 * 60;

const ANALYSIS_CONTENT: &str = "# Environmental Data Analysis

## Summary
Sensor readings over the last hours show stable conditions with small variations.

## Temperature
Both temperature probes agree within half a degree, averaging around 24.5°C.
No abrupt changes were detected.

## Humidity and CO2
Relative humidity stays between 40% and 60%, a comfortable range.
CO2 concentration averages 450 ppm, typical of a ventilated indoor space.

## Light and UV
Illuminance is consistent with daylight through a window. The UV index is low.

## Recommendations
1. Keep the current ventilation schedule.
2. Review the CO2 trend if occupancy increases.
3. Recalibrate the pressure sensor within the next month.";

/// Readings spaced ten minutes apart going back from `now`, newest first.
pub fn sensor_readings(now: Timestamp) -> Vec<SensorReading> {
    let mut rng = rand::rng();

    (0..SENSOR_SET_SIZE)
        .map(|index| {
            let age = SignedDuration::from_secs(READING_SPACING_SECS * index as i64);
            let groups = BTreeMap::from([
                group(
                    "bmp390",
                    [
                        ("presion_hPa", rng.random_range(1010.0..1020.0)),
                        ("temperatura_a", rng.random_range(22.0..27.0)),
                    ],
                ),
                group(
                    "ltr390",
                    [
                        ("luz_cruda", rng.random_range(100.0..600.0)),
                        ("uv_crudo", rng.random_range(0.0..50.0)),
                        ("lux", rng.random_range(200.0..1200.0)),
                        ("indice_uv", rng.random_range(0.0..3.0)),
                    ],
                ),
                group(
                    "scd30",
                    [
                        ("co2_ppm", rng.random_range(400.0..600.0)),
                        ("temperatura_b", rng.random_range(22.0..27.0)),
                        ("humedad_pct", rng.random_range(40.0..60.0)),
                    ],
                ),
            ]);

            SensorReading {
                id: index as i64 + 1,
                record_id: index as i64 + 100,
                timestamp: now.checked_sub(age).unwrap_or(Timestamp::MIN),
                groups,
                gps: None,
                satellite_weather: None,
            }
        })
        .collect()
}

fn group<const N: usize>(name: &str, readings: [(&str, f64); N]) -> (String, SensorGroup) {
    let readings = readings
        .into_iter()
        .map(|(metric, value)| (metric.to_owned(), Some(round2(value))))
        .collect();
    (name.to_owned(), readings)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn analysis(now: Timestamp) -> NormalizedAnalysis {
    NormalizedAnalysis {
        response_id: Some(1),
        data_id: Some(1),
        message: Some("Analysis completed successfully".to_owned()),
        content: ANALYSIS_CONTENT.to_owned(),
        timestamp: Some(now),
    }
}

/// One analysis per day going back from `now`, newest first.
pub fn analysis_history(now: Timestamp) -> Vec<NormalizedAnalysis> {
    let mut rng = rand::rng();

    (1..=HISTORY_SIZE as i64)
        .map(|n| {
            let age = SignedDuration::from_secs(DAY_SECS * (n - 1));
            let temperature: f64 = rng.random_range(22.0..27.0);
            let humidity: f64 = rng.random_range(40.0..60.0);
            let co2: f64 = rng.random_range(400.0..600.0);

            NormalizedAnalysis {
                response_id: Some(n),
                data_id: Some(n),
                message: Some(format!("Historical analysis #{n}")),
                content: format!(
                    "# Data Analysis {n}\n\n\
                     Average temperature was {temperature:.1}°C.\n\
                     Relative humidity held at {humidity:.0}%.\n\
                     CO2 averaged {co2:.0} ppm."
                ),
                timestamp: Some(now.checked_sub(age).unwrap_or(Timestamp::MIN)),
            }
        })
        .collect()
}

pub fn model_catalog() -> ModelCatalog {
    let models = [
        ("gpt-3.5-turbo", "Fast general-purpose model"),
        ("gpt-4", "Most capable model for detailed analysis"),
        ("claude-instant", "Low-latency assistant model"),
        ("claude-2", "Long-context analysis model"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut details = Map::new();
        details.insert("description".to_owned(), Value::from(description));
        ModelDescriptor {
            name: name.to_owned(),
            active: false,
            details,
        }
    })
    .collect();

    let mut catalog = ModelCatalog {
        models,
        active_model: None,
    };
    catalog.activate("gpt-4");
    catalog
}

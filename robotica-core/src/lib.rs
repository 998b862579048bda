pub mod history;
pub mod normalize;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use history::{
    HistoryFilter, extract_preview, extract_title, filter_by_window, filter_by_window_at,
    has_displayable_content, is_same_record,
};
pub use normalize::{
    RawAnalysisPayload, decode_model_catalog, decode_model_switch, decode_sensor_readings,
    normalize,
};

/// Named numeric readings reported by one physical sensor.
///
/// `None` means the sensor reported the reading as `null`.
pub type SensorGroup = BTreeMap<String, Option<f64>>;

/// One timestamped sample set uploaded by a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Row id assigned by the remote service.
    pub id: i64,
    /// Id of the upload record this sample belongs to.
    pub record_id: i64,
    /// Capture time. Always a valid instant.
    pub timestamp: jiff::Timestamp,
    /// Sensor groups keyed by sensor name (`bmp390`, `scd30`, ...).
    pub groups: BTreeMap<String, SensorGroup>,
    /// Station position, when the GPS module had a fix.
    pub gps: Option<GpsFix>,
    /// Satellite weather snapshot for the station's position.
    pub satellite_weather: Option<SatelliteWeather>,
}

/// Position reported by the station GPS module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(alias = "latitud")]
    pub latitude: f64,
    #[serde(alias = "longitud")]
    pub longitude: f64,
}

/// Satellite-derived weather parameters, keyed by their upstream names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct SatelliteWeather {
    /// Air temperature at 2 m (°C).
    pub t2m: Option<f64>,
    pub t2m_max: Option<f64>,
    pub t2m_min: Option<f64>,
    pub t2m_range: Option<f64>,
    /// Bias-corrected precipitation (mm/day).
    pub prectotcorr: Option<f64>,
    /// Relative humidity at 2 m (%).
    pub rh2m: Option<f64>,
    /// Specific humidity at 2 m (g/kg).
    pub qv2m: Option<f64>,
    /// Wind speed at 10 m (m/s).
    pub ws10m: Option<f64>,
    pub ws10m_max: Option<f64>,
    pub ws10m_min: Option<f64>,
    /// Dew/frost point at 2 m (°C).
    pub t2mdew: Option<f64>,
    /// Wet bulb temperature at 2 m (°C).
    pub t2mwet: Option<f64>,
    /// Earth skin temperature (°C).
    pub ts: Option<f64>,
    pub allsky_sfc_lw_dwn: Option<f64>,
    pub allsky_sfc_sw_dwn: Option<f64>,
    pub clrsky_sfc_sw_dwn: Option<f64>,
    /// Clearness index.
    pub allsky_kt: Option<f64>,
    /// Evaporation from land (kg/m²/s).
    pub evland: Option<f64>,
    /// Surface pressure (kPa).
    pub ps: Option<f64>,
}

/// Canonical form of one AI analysis, whatever shape the service sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Markdown, stringified JSON, or empty when there is nothing to show.
    #[serde(default)]
    pub content: String,
    /// Present for every payload that was an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<jiff::Timestamp>,
}

/// An AI model the analysis service can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "activo", default)]
    pub active: bool,
    #[serde(alias = "detalles", default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Models known to the analysis service. At most one is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(alias = "modelos", default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(alias = "modelo_activo", default)]
    pub active_model: Option<String>,
}

impl ModelCatalog {
    /// Mark `name` as the only active model.
    ///
    /// Returns `false` and leaves the catalog untouched when no model has
    /// that name.
    pub fn activate(&mut self, name: &str) -> bool {
        if !self.models.iter().any(|m| m.name == name) {
            return false;
        }

        for model in &mut self.models {
            model.active = model.name == name;
        }
        self.active_model = Some(name.to_owned());

        true
    }

    pub fn active(&self) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.active)
    }

    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Acknowledgement of a model switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSwitch {
    #[serde(alias = "mensaje")]
    pub message: String,
    #[serde(alias = "modelo")]
    pub model: String,
}

/// Time window used to narrow the analysis history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Last 24 hours.
    #[default]
    Recent,
    /// Since local midnight.
    Day,
    /// Last 7 days.
    Week,
    /// No filtering.
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Recent => "recent",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time window '{0}' (expected recent, day, week or all)")]
pub struct ParseWindowError(pub String);

impl FromStr for TimeWindow {
    type Err = ParseWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(TimeWindow::Recent),
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "all" => Ok(TimeWindow::All),
            _ => Err(ParseWindowError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        let model = |name: &str, active: bool| ModelDescriptor {
            name: name.to_owned(),
            active,
            details: serde_json::Map::new(),
        };

        ModelCatalog {
            models: vec![model("a", true), model("b", false), model("c", false)],
            active_model: Some("a".to_owned()),
        }
    }

    #[test]
    fn activate_moves_the_single_active_flag() {
        let mut catalog = catalog();

        assert!(catalog.activate("c"));

        let active: Vec<_> = catalog.models.iter().filter(|m| m.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "c");
        assert_eq!(catalog.active_model.as_deref(), Some("c"));
    }

    #[test]
    fn activate_unknown_model_is_a_no_op() {
        let mut catalog = catalog();
        let before = catalog.clone();

        assert!(!catalog.activate("zzz"));
        assert_eq!(catalog, before);
    }

    #[test]
    fn time_window_parses_case_insensitively() {
        assert_eq!("Week".parse::<TimeWindow>(), Ok(TimeWindow::Week));
        assert_eq!(" all ".parse::<TimeWindow>(), Ok(TimeWindow::All));
        assert!("month".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn catalog_accepts_upstream_field_names() {
        let body = serde_json::json!({
            "modelos": [
                { "nombre": "gemma3:4b", "activo": true, "detalles": { "size": "4b" } }
            ],
            "modelo_activo": "gemma3:4b"
        });

        let catalog: ModelCatalog = serde_json::from_value(body).unwrap();
        assert_eq!(catalog.models[0].name, "gemma3:4b");
        assert!(catalog.models[0].active);
        assert_eq!(catalog.active_model.as_deref(), Some("gemma3:4b"));
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use jiff::Timestamp;
use robotica_core::{
    ModelCatalog, ModelSwitch, NormalizedAnalysis, SensorReading, decode_model_catalog,
    decode_model_switch, decode_sensor_readings, normalize,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::mock;
use crate::transport::Transport;

const SENSOR_DATA_PATH: &str = "/sensor-data";
const ANALYSIS_PATH: &str = "/procesar-datos";
const HISTORY_PATH: &str = "/respuestas";
const MODELS_PATH: &str = "/modelos";
const SWITCH_MODEL_PATH: &str = "/cambiar-modelo";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("record id must not be negative, got {0}")]
    InvalidRecordId(i64),
    #[error("invalid model name '{0}'")]
    InvalidModelName(String),
}

/// Shared "serving mock data" flag.
///
/// Clones observe the same flag, so a UI can hold one while the service
/// flips it.
#[derive(Debug, Clone, Default)]
pub struct DegradationState {
    degraded: Arc<AtomicBool>,
}

impl DegradationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn mark_degraded(&self) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!("analysis service unreachable, switching to mock data");
        }
    }

    pub fn clear(&self) {
        if self.degraded.swap(false, Ordering::AcqRel) {
            info!("analysis service reachable again");
        }
    }
}

/// When the degraded flag goes back to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradationPolicy {
    /// Once set, the flag stays set for the life of the service.
    #[default]
    Sticky,
    /// Any successful remote call clears the flag.
    PerCall,
}

/// Access to sensor data and AI analyses that never surfaces transport
/// failures: when the remote service cannot be reached, mock data is
/// returned and the degraded flag is raised.
pub struct DataAccessService<T> {
    transport: Arc<T>,
    degradation: DegradationState,
    policy: DegradationPolicy,
    mock_catalog: Arc<Mutex<ModelCatalog>>,
}

impl<T> Clone for DataAccessService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            degradation: self.degradation.clone(),
            policy: self.policy,
            mock_catalog: Arc::clone(&self.mock_catalog),
        }
    }
}

impl<T: Transport> DataAccessService<T> {
    pub fn new(transport: T) -> Self {
        Self::with_state(transport, DegradationState::new(), DegradationPolicy::default())
    }

    pub fn with_policy(transport: T, policy: DegradationPolicy) -> Self {
        Self::with_state(transport, DegradationState::new(), policy)
    }

    pub fn with_state(transport: T, degradation: DegradationState, policy: DegradationPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            degradation,
            policy,
            mock_catalog: Arc::new(Mutex::new(mock::model_catalog())),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation.is_degraded()
    }

    pub fn degradation(&self) -> DegradationState {
        self.degradation.clone()
    }

    pub fn policy(&self) -> DegradationPolicy {
        self.policy
    }

    fn served_live(&self) {
        if self.policy == DegradationPolicy::PerCall {
            self.degradation.clear();
        }
    }

    fn fall_back(&self, operation: &'static str, reason: impl fmt::Display) {
        warn!(operation, reason = %reason, "serving mock data");
        self.degradation.mark_degraded();
    }

    /// Latest sensor readings, newest first, at most `limit` of them.
    pub async fn fetch_sensor_readings(&self, limit: usize) -> Vec<SensorReading> {
        let query = [("limit", limit.to_string())];

        match self.transport.get(SENSOR_DATA_PATH, &query).await {
            Ok(body) => match decode_sensor_readings(&body, Timestamp::now()) {
                Some(mut readings) => {
                    readings.truncate(limit);
                    info!(count = readings.len(), "sensor readings received");
                    self.served_live();
                    return readings;
                }
                None => self.fall_back("fetch_sensor_readings", "body has no readings array"),
            },
            Err(e) => self.fall_back("fetch_sensor_readings", e),
        }

        let mut readings = mock::sensor_readings(Timestamp::now());
        readings.truncate(limit);
        readings
    }

    /// Ask the service to analyze the latest readings. This can take up to a
    /// minute.
    pub async fn trigger_analysis(&self) -> NormalizedAnalysis {
        match self.transport.get(ANALYSIS_PATH, &[]).await {
            Ok(body) => {
                self.served_live();
                let analysis = normalize(Some(&body));
                info!(response_id = ?analysis.response_id, "analysis completed");
                analysis
            }
            Err(e) => {
                self.fall_back("trigger_analysis", e);
                mock::analysis(Timestamp::now())
            }
        }
    }

    /// Past analyses, newest first, at most `limit` of them.
    pub async fn list_analysis_history(&self, limit: usize) -> Vec<NormalizedAnalysis> {
        let query = [("limit", limit.to_string())];

        match self.transport.get(HISTORY_PATH, &query).await {
            Ok(body) => {
                self.served_live();
                let Some(items) = body
                    .as_array()
                    .or_else(|| body.get("data").and_then(Value::as_array))
                else {
                    warn!("history response is not a list");
                    return Vec::new();
                };

                let history: Vec<_> = items
                    .iter()
                    .take(limit)
                    .map(|item| normalize(Some(item)))
                    .collect();
                debug!(count = history.len(), "analysis history received");
                history
            }
            Err(e) => {
                self.fall_back("list_analysis_history", e);
                let mut history = mock::analysis_history(Timestamp::now());
                history.truncate(limit);
                history
            }
        }
    }

    pub async fn fetch_analysis_by_id(&self, id: i64) -> Result<NormalizedAnalysis, ServiceError> {
        if id < 0 {
            return Err(ServiceError::InvalidRecordId(id));
        }

        let path = format!("{HISTORY_PATH}/{id}");
        match self.transport.get(&path, &[]).await {
            Ok(body) => {
                self.served_live();
                Ok(normalize(Some(&body)))
            }
            Err(e) => {
                self.fall_back("fetch_analysis_by_id", e);
                let mut history = mock::analysis_history(Timestamp::now());
                let index = history
                    .iter()
                    .position(|item| item.response_id == Some(id))
                    .unwrap_or(0);
                Ok(history.swap_remove(index))
            }
        }
    }

    pub async fn list_models(&self) -> ModelCatalog {
        match self.transport.get(MODELS_PATH, &[]).await {
            Ok(body) => match decode_model_catalog(&body) {
                Some(catalog) => {
                    info!(
                        count = catalog.models.len(),
                        active = ?catalog.active_model,
                        "model catalog received"
                    );
                    self.served_live();
                    return catalog;
                }
                None => self.fall_back("list_models", "unrecognized catalog body"),
            },
            Err(e) => self.fall_back("list_models", e),
        }

        self.mock_catalog.lock().await.clone()
    }

    /// Switch the active analysis model, optionally asking the service to
    /// download it first.
    pub async fn select_model(&self, name: &str, download: bool) -> Result<ModelSwitch, ServiceError> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '?', '#']) {
            return Err(ServiceError::InvalidModelName(name.to_owned()));
        }

        let path = format!("{SWITCH_MODEL_PATH}/{name}");
        let query = [("descargar", download.to_string())];

        match self.transport.post(&path, &query).await {
            Ok(body) => {
                self.served_live();
                let switch = decode_model_switch(&body, name);
                info!(model = %switch.model, "active model switched");
                Ok(switch)
            }
            Err(e) => {
                self.fall_back("select_model", e);
                if !self.mock_catalog.lock().await.activate(name) {
                    debug!(model = name, "model not in mock catalog");
                }
                Ok(ModelSwitch {
                    message: format!("Model switched to {name} (simulated)"),
                    model: name.to_owned(),
                })
            }
        }
    }
}

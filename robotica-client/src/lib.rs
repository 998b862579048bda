pub mod config;
pub mod history_loader;
pub mod mock;
pub mod service;
pub mod transport;

pub use config::{ApiConfig, Config, ConfigError, HistoryConfig, ServiceConfig};
pub use history_loader::{HistoryLoader, HistoryView, LoadOutcome};
pub use service::{DataAccessService, DegradationPolicy, DegradationState, ServiceError};
pub use transport::{HttpTransport, Transport, TransportError};

//! FinSight prediction core crate.
//!
//! Current implemented scope:
//! - transaction batch preprocessing into a time-ordered feature table
//! - stochastic balance projection over a fixed daily horizon
//! - random-sample anomaly scoring behind a pluggable detector contract
//!
//! The HTTP routing layer is an external collaborator; this crate only
//! exposes the payload contract it consumes.

mod anomaly;
mod features;
mod forecast;
mod observability;
mod payload;

pub use anomaly::{
    detect, detect_with, AnomalyDetector, AnomalyReason, AnomalyRecord, RandomSampleDetector,
    TransactionId, DEFAULT_CONTAMINATION,
};
pub use features::{
    preprocess, BalanceSource, FeatureRow, FeatureStep, FeatureTable, PreprocessReport,
    STARTING_BALANCE,
};
pub use forecast::{
    forecast, forecast_with, BalanceProjector, ForecastPoint, RandomWalkProjector, BALANCE_FLOOR,
    DEFAULT_HORIZON_DAYS, FALLBACK_STARTING_BALANCE,
};
pub use observability::{
    init_logging, log_service_start, logging_config_from_env, LogFormat, LoggingConfig,
    LoggingInitError,
};
pub use payload::{transactions_field, PayloadError};

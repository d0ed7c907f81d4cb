pub mod calibration;
pub mod config;
pub mod error;
pub mod features;
pub mod feed;
pub mod historical_dataset;
pub mod identity;
pub mod live;
pub mod live_client;
pub mod model;
pub mod offline;
pub mod predictor;
pub mod schema;
pub mod telemetry;

pub use error::{Result, WinProbError};

/// Installs the `RUST_LOG`-driven subscriber used by every binary.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rift_winprob=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

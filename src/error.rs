use thiserror::Error;

/// Error taxonomy for the feature and prediction pipeline.
///
/// Degraded inputs (missing features, unknown observer, telemetry timeouts) are
/// handled by fallbacks and never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WinProbError {
    // Joinability defects in historical data.
    #[error("data integrity error in match {match_id}: {reason}")]
    DataIntegrity { match_id: u64, reason: String },

    #[error("missing win flag for match {match_id}")]
    MissingTarget { match_id: u64 },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl WinProbError {
    pub fn integrity(match_id: u64, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            match_id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WinProbError>;

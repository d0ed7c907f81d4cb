use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::calibration::{CalibrationConfig, Calibrator};
use crate::config::AppConfig;
use crate::error::Result;
use crate::features::{Feature, FeatureSchema, FeatureVector};
use crate::live::LiveFeatureExtractor;
use crate::model::LogisticWinModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionDetail {
    /// Model output for the vector as given.
    pub raw: f64,
    /// Model output for the sign-flipped vector.
    pub raw_mirror: f64,
    pub probability: f64,
}

/// Trained model plus calibration, answering "what is my win probability".
#[derive(Debug, Clone)]
pub struct WinPredictor {
    model: LogisticWinModel,
    calibrator: Calibrator,
    defaults: FeatureVector,
}

impl WinPredictor {
    pub fn new(model: LogisticWinModel, calibration: CalibrationConfig) -> Result<Self> {
        let defaults = model.default_vector()?;
        let calibrator = Calibrator::new(calibration)?;
        Ok(Self {
            model,
            calibrator,
            defaults,
        })
    }

    /// Baseline from the config when set, otherwise the one measured at training.
    pub fn from_config(model: LogisticWinModel, cfg: &AppConfig) -> Result<Self> {
        let baseline = match cfg.calibration_baseline {
            Some(b) => b,
            None => model.measured_baseline()?,
        };
        let calibration = CalibrationConfig {
            baseline,
            compress_exponent: cfg.compress_exponent,
            boost_exponent: cfg.boost_exponent,
        };
        Self::new(model, calibration)
    }

    pub fn model(&self) -> &LogisticWinModel {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.model.schema()
    }

    pub fn calibration(&self) -> &CalibrationConfig {
        self.calibrator.config()
    }

    pub fn extractor(&self) -> Result<LiveFeatureExtractor> {
        LiveFeatureExtractor::new(self.model.schema())
    }

    pub fn predict_features(&self, features: &FeatureVector) -> Result<f64> {
        Ok(self.predict_detailed(features)?.probability)
    }

    /// Averages the calibrated output with the complement of its mirror so
    /// that `p(F) + p(-F) == 1` and an all-zero input is exactly 0.5.
    pub fn predict_detailed(&self, features: &FeatureVector) -> Result<PredictionDetail> {
        let raw = self.model.predict_one(features)?;
        let raw_mirror = self.model.predict_one(&features.negated())?;
        let mine = self.calibrator.calibrate(raw);
        let theirs = self.calibrator.calibrate(raw_mirror);
        let probability = (0.5 + 0.5 * (mine - theirs)).clamp(0.0, 1.0);
        Ok(PredictionDetail {
            raw,
            raw_mirror,
            probability,
        })
    }

    /// Any subset of feature names; absent ones take the model defaults.
    pub fn predict_named(&self, values: &HashMap<String, f64>) -> Result<f64> {
        let mut features = self.defaults;
        for (name, value) in values {
            let Some(feature) = Feature::from_name(name) else {
                warn!(name = %name, "ignoring unknown feature");
                continue;
            };
            if !value.is_finite() {
                debug!(name = %name, "ignoring non-finite value");
                continue;
            }
            features.set(feature, *value);
        }
        self.predict_features(&features)
    }

    pub fn defaults(&self) -> &FeatureVector {
        &self.defaults
    }
}

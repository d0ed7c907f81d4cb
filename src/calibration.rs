use serde::{Deserialize, Serialize};

use crate::error::{Result, WinProbError};

pub const DEFAULT_COMPRESS_EXPONENT: f64 = 0.8;
pub const DEFAULT_BOOST_EXPONENT: f64 = 0.5;
pub const FLOOR_CUTOFF: f64 = 0.01;
pub const CEIL_CUTOFF: f64 = 0.99;

/// Piecewise power-curve remap around the model's neutral output `baseline`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub baseline: f64,
    /// Applied below the baseline.
    pub compress_exponent: f64,
    /// Applied above the baseline.
    pub boost_exponent: f64,
}

impl CalibrationConfig {
    pub fn with_baseline(baseline: f64) -> Self {
        Self {
            baseline,
            compress_exponent: DEFAULT_COMPRESS_EXPONENT,
            boost_exponent: DEFAULT_BOOST_EXPONENT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.baseline.is_finite()
            || self.baseline <= FLOOR_CUTOFF
            || self.baseline >= CEIL_CUTOFF
        {
            return Err(WinProbError::InvalidConfig(format!(
                "calibration baseline {} outside ({FLOOR_CUTOFF}, {CEIL_CUTOFF})",
                self.baseline
            )));
        }
        for (name, v) in [
            ("compress exponent", self.compress_exponent),
            ("boost exponent", self.boost_exponent),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(WinProbError::InvalidConfig(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Maps the baseline to exactly 0.5, monotone non-decreasing in `p`.
    pub fn calibrate(&self, p: f64) -> f64 {
        if p.is_nan() {
            return 0.5;
        }
        if p <= FLOOR_CUTOFF {
            return 0.0;
        }
        if p >= CEIL_CUTOFF {
            return 1.0;
        }
        let b = self.config.baseline;
        let out = if p < b {
            0.5 * (p / b).powf(self.config.compress_exponent)
        } else {
            0.5 + 0.5 * ((p - b) / (1.0 - b)).powf(self.config.boost_exponent)
        };
        out.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

impl Metrics {
    fn empty() -> Self {
        Self {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// Brier, log loss and accuracy of positive-class probabilities.
pub fn evaluate_probs(predictions: &[f64], outcomes: &[bool]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::empty();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, won) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let y = if *won { 1.0 } else { 0.0 };
        brier_sum += (p - y).powi(2);
        let actual_prob = (if *won { p } else { 1.0 - p }).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();
        if (p >= 0.5) == *won {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn calibration_bins(
    predictions: &[f64],
    outcomes: &[bool],
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, won) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if *won {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: i as f64 / bins as f64,
            bucket_end: (i + 1) as f64 / bins as f64,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal(b: f64) -> Calibrator {
        Calibrator::new(CalibrationConfig::with_baseline(b)).unwrap()
    }

    #[test]
    fn baseline_maps_to_half_and_cutoffs_saturate() {
        let c = cal(0.42);
        assert_eq!(c.calibrate(0.42), 0.5);
        assert_eq!(c.calibrate(0.005), 0.0);
        assert_eq!(c.calibrate(0.01), 0.0);
        assert_eq!(c.calibrate(0.99), 1.0);
        assert_eq!(c.calibrate(0.999), 1.0);
    }

    #[test]
    fn calibration_is_monotone() {
        for b in [0.2, 0.5, 0.73] {
            let c = cal(b);
            let mut prev = c.calibrate(0.0);
            for step in 1..=1000 {
                let p = step as f64 / 1000.0;
                let q = c.calibrate(p);
                assert!(q + 1e-12 >= prev, "b={b} p={p} q={q} prev={prev}");
                assert!((0.0..=1.0).contains(&q));
                prev = q;
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Calibrator::new(CalibrationConfig::with_baseline(0.0)).is_err());
        assert!(Calibrator::new(CalibrationConfig::with_baseline(0.995)).is_err());
        let mut c = CalibrationConfig::with_baseline(0.5);
        c.boost_exponent = -1.0;
        assert!(matches!(Calibrator::new(c), Err(WinProbError::InvalidConfig(_))));
    }

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let m = evaluate_probs(&[1.0, 0.0, 1.0], &[true, false, true]);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
        let bins = calibration_bins(&[0.05, 0.95], &[false, true], 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].actual_rate, 1.0);
    }
}

//! L2-regularized logistic regression over the feature schema, persisted as a
//! JSON artifact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calibration::{Metrics, evaluate_probs};
use crate::error::{Result, WinProbError};
use crate::features::{Feature, FeatureSchema, FeatureVector, REPRESENTATIVE_DURATION_SECS};

pub const ARTIFACT_VERSION: u32 = 1;

const TRAIN_SPLIT: f64 = 0.80;
const MIN_TRAIN_SAMPLES: usize = 20;
const L2_REG: f64 = 0.01;
const MAX_ITERS: usize = 2500;
const LR_START: f64 = 0.5;
const IMPROVEMENT_EPS: f64 = 1e-6;
const DEFAULT_SEED: u64 = 0x5eed_2024;
// Keeps the measured baseline inside the calibrator's valid range.
const BASELINE_BOUNDS: (f64, f64) = (0.05, 0.95);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    pub intercept: f64,
    /// Value used when a prediction request omits a feature.
    pub feature_defaults: Vec<f64>,
    /// Raw probability of an all-zero input at the representative duration.
    pub measured_baseline: f64,
    #[serde(default)]
    pub l2: f64,
    #[serde(default)]
    pub train_log_loss: f64,
    #[serde(default)]
    pub val_log_loss: f64,
    #[serde(default)]
    pub baseline_val_log_loss: f64,
    #[serde(default)]
    pub train_samples: usize,
    #[serde(default)]
    pub val_samples: usize,
}

impl ModelArtifact {
    fn check(&self) -> Result<FeatureSchema> {
        if self.version != ARTIFACT_VERSION {
            return Err(WinProbError::SchemaMismatch(format!(
                "artifact version {} (expected {ARTIFACT_VERSION})",
                self.version
            )));
        }
        let schema = FeatureSchema::from_names(self.schema_version, &self.feature_names)?;
        let k = schema.len();
        for (name, len) in [
            ("feature_means", self.feature_means.len()),
            ("feature_stds", self.feature_stds.len()),
            ("coeffs", self.coeffs.len()),
            ("feature_defaults", self.feature_defaults.len()),
        ] {
            if len != k {
                return Err(WinProbError::SchemaMismatch(format!(
                    "{name} has {len} entries for {k} features"
                )));
            }
        }
        Ok(schema)
    }

    fn raw_probability(&self, x: &[f64]) -> f64 {
        let mut z = self.intercept;
        for i in 0..x.len() {
            z += self.coeffs[i] * standardized(x[i], self.feature_means[i], self.feature_stds[i]);
        }
        sigmoid(z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    pub train: Metrics,
    pub validation: Metrics,
    pub baseline_val_log_loss: f64,
    pub iterations: usize,
    pub measured_baseline: f64,
}

#[derive(Debug, Clone)]
pub struct LogisticWinModel {
    path: PathBuf,
    schema: FeatureSchema,
    seed: u64,
    artifact: Option<ModelArtifact>,
}

impl LogisticWinModel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_schema(path, FeatureSchema::canonical())
    }

    pub fn with_schema(path: impl Into<PathBuf>, schema: FeatureSchema) -> Self {
        Self {
            path: path.into(),
            schema,
            seed: DEFAULT_SEED,
            artifact: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.artifact.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    fn require(&self) -> Result<&ModelArtifact> {
        self.artifact.as_ref().ok_or_else(|| {
            WinProbError::ModelUnavailable(format!(
                "no trained model (expected artifact at {})",
                self.path.display()
            ))
        })
    }

    pub fn train(&mut self, rows: &[FeatureVector], labels: &[bool]) -> Result<TrainReport> {
        if rows.len() != labels.len() {
            return Err(WinProbError::InvalidTrainingData(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if rows.len() < MIN_TRAIN_SAMPLES {
            return Err(WinProbError::InvalidTrainingData(format!(
                "insufficient training samples: {} (need at least {MIN_TRAIN_SAMPLES})",
                rows.len()
            )));
        }
        let wins = labels.iter().filter(|w| **w).count();
        if wins == 0 || wins == labels.len() {
            return Err(WinProbError::InvalidTrainingData(
                "labels contain a single class".to_string(),
            ));
        }

        let k = self.schema.len();
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let mut xs: Vec<Vec<f64>> = order.iter().map(|i| rows[*i].project(&self.schema)).collect();
        let ys: Vec<bool> = order.iter().map(|i| labels[*i]).collect();
        let split_idx = split_train_index(xs.len());

        let (means, stds) = feature_norm_stats(&xs[..split_idx], k);
        for x in &mut xs {
            for i in 0..k {
                x[i] = standardized(x[i], means[i], stds[i]);
            }
        }
        let (train_x, val_x) = xs.split_at(split_idx);
        let (train_y, val_y) = ys.split_at(split_idx);

        let base_rate = train_y.iter().filter(|w| **w).count() as f64 / train_y.len() as f64;
        let baseline_val = evaluate_probs(&vec![base_rate; val_y.len()], val_y).log_loss;

        let (coeffs, intercept, iterations) = fit_coeffs(train_x, train_y, val_x, val_y, L2_REG);
        let train_metrics =
            evaluate_probs(&probs_standardized(&coeffs, intercept, train_x), train_y);
        let val_metrics = evaluate_probs(&probs_standardized(&coeffs, intercept, val_x), val_y);

        let feature_defaults: Vec<f64> = self
            .schema
            .features()
            .iter()
            .zip(&means)
            .map(|(f, mean)| if f.is_differential() { 0.0 } else { *mean })
            .collect();

        let mut artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            schema_version: self.schema.version(),
            feature_names: self.schema.names().iter().map(|s| s.to_string()).collect(),
            feature_means: means,
            feature_stds: stds,
            coeffs,
            intercept,
            feature_defaults,
            measured_baseline: 0.5,
            l2: L2_REG,
            train_log_loss: train_metrics.log_loss,
            val_log_loss: val_metrics.log_loss,
            baseline_val_log_loss: baseline_val,
            train_samples: train_x.len(),
            val_samples: val_x.len(),
        };
        let neutral = FeatureVector::neutral(REPRESENTATIVE_DURATION_SECS).project(&self.schema);
        let measured = artifact.raw_probability(&neutral);
        if !(BASELINE_BOUNDS.0..=BASELINE_BOUNDS.1).contains(&measured) {
            warn!(measured, "neutral-state probability is extreme, clamping baseline");
        }
        artifact.measured_baseline = measured.clamp(BASELINE_BOUNDS.0, BASELINE_BOUNDS.1);

        info!(
            train = train_x.len(),
            val = val_x.len(),
            iterations,
            train_log_loss = train_metrics.log_loss,
            val_log_loss = val_metrics.log_loss,
            baseline_val_log_loss = baseline_val,
            measured_baseline = artifact.measured_baseline,
            "trained win model"
        );

        let report = TrainReport {
            train: train_metrics,
            validation: val_metrics,
            baseline_val_log_loss: baseline_val,
            iterations,
            measured_baseline: artifact.measured_baseline,
        };
        self.artifact = Some(artifact);
        Ok(report)
    }

    /// Positive-class (my side wins) probability per row.
    pub fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        let artifact = self.require()?;
        Ok(rows
            .iter()
            .map(|r| artifact.raw_probability(&r.project(&self.schema)))
            .collect())
    }

    pub fn predict_one(&self, row: &FeatureVector) -> Result<f64> {
        let artifact = self.require()?;
        Ok(artifact.raw_probability(&row.project(&self.schema)))
    }

    /// Defaults for every schema feature; features outside the schema stay 0.
    pub fn default_vector(&self) -> Result<FeatureVector> {
        let artifact = self.require()?;
        let mut out = FeatureVector::neutral(REPRESENTATIVE_DURATION_SECS);
        for (f, v) in self.schema.features().iter().zip(&artifact.feature_defaults) {
            out.set(*f, *v);
        }
        Ok(out)
    }

    pub fn measured_baseline(&self) -> Result<f64> {
        Ok(self.require()?.measured_baseline)
    }

    /// Features ranked by absolute standardized coefficient.
    pub fn feature_weights(&self) -> Vec<(Feature, f64)> {
        let Some(artifact) = self.artifact.as_ref() else {
            return Vec::new();
        };
        let mut out: Vec<(Feature, f64)> = self
            .schema
            .features()
            .iter()
            .copied()
            .zip(artifact.coeffs.iter().copied())
            .collect();
        out.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));
        out
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let artifact = self.require()?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(artifact).context("serialize model artifact")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).context("swap model artifact")?;
        info!(path = %self.path.display(), "model artifact written");
        Ok(())
    }

    /// `false` when no usable artifact exists at the model path.
    pub fn load(&mut self) -> bool {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "no model artifact");
                return false;
            }
        };
        let artifact = match serde_json::from_str::<ModelArtifact>(&raw) {
            Ok(a) => a,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "unparsable model artifact");
                return false;
            }
        };
        match artifact.check() {
            Ok(schema) => {
                info!(
                    path = %self.path.display(),
                    features = schema.len(),
                    generated_at = %artifact.generated_at,
                    "model artifact loaded"
                );
                self.schema = schema;
                self.artifact = Some(artifact);
                true
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    %err,
                    "model artifact does not match this build"
                );
                false
            }
        }
    }
}

fn split_train_index(n: usize) -> usize {
    let idx = ((n as f64) * TRAIN_SPLIT).round() as usize;
    idx.clamp(1, n.saturating_sub(1).max(1))
}

fn feature_norm_stats(rows: &[Vec<f64>], k: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mean = vec![0.0; k];
    let mut var = vec![0.0; k];
    if rows.is_empty() {
        return (mean, vec![1.0; k]);
    }
    let n = rows.len() as f64;
    for x in rows {
        for i in 0..k {
            mean[i] += x[i];
        }
    }
    for v in &mut mean {
        *v /= n;
    }
    for x in rows {
        for i in 0..k {
            let d = x[i] - mean[i];
            var[i] += d * d;
        }
    }
    for v in &mut var {
        *v = (*v / n).sqrt().max(1e-6);
    }
    (mean, var)
}

fn standardized(x: f64, mean: f64, std: f64) -> f64 {
    (x - mean) / std.max(1e-6)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn probs_standardized(coeffs: &[f64], intercept: f64, xs: &[Vec<f64>]) -> Vec<f64> {
    xs.iter()
        .map(|x| sigmoid(intercept + coeffs.iter().zip(x).map(|(c, v)| c * v).sum::<f64>()))
        .collect()
}

fn log_loss(coeffs: &[f64], intercept: f64, xs: &[Vec<f64>], ys: &[bool]) -> f64 {
    evaluate_probs(&probs_standardized(coeffs, intercept, xs), ys).log_loss
}

fn fit_coeffs(
    train_x: &[Vec<f64>],
    train_y: &[bool],
    val_x: &[Vec<f64>],
    val_y: &[bool],
    l2: f64,
) -> (Vec<f64>, f64, usize) {
    let k = train_x.first().map(|x| x.len()).unwrap_or(0);
    let mut coeffs = vec![0.0; k];
    let mut intercept = 0.0;
    let mut best = (coeffs.clone(), intercept);
    let mut best_val = log_loss(&coeffs, intercept, val_x, val_y);
    let mut no_improve = 0usize;
    let mut iterations = 0usize;
    let n = train_x.len().max(1) as f64;

    for iter in 0..MAX_ITERS {
        iterations = iter + 1;
        let mut grad = vec![0.0; k];
        let mut grad_b = 0.0;
        for (x, won) in train_x.iter().zip(train_y) {
            let z = intercept + coeffs.iter().zip(x).map(|(c, v)| c * v).sum::<f64>();
            let dz = sigmoid(z) - if *won { 1.0 } else { 0.0 };
            grad_b += dz;
            for j in 0..k {
                grad[j] += dz * x[j];
            }
        }

        let lr = LR_START / (1.0 + (iter as f64 * 0.003));
        for j in 0..k {
            coeffs[j] -= lr * (grad[j] / n + l2 * coeffs[j]);
        }
        intercept -= lr * grad_b / n;

        if iter % 20 == 0 || iter + 1 == MAX_ITERS {
            let val_ll = log_loss(&coeffs, intercept, val_x, val_y);
            if val_ll + IMPROVEMENT_EPS < best_val {
                best_val = val_ll;
                best = (coeffs.clone(), intercept);
                no_improve = 0;
            } else {
                no_improve = no_improve.saturating_add(1);
                if no_improve >= 20 {
                    break;
                }
            }
        }
    }

    (best.0, best.1, iterations)
}

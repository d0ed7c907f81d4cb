//! Background polling loop: fetch, extract, predict, publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, WinProbError};
use crate::features::FeatureVector;
use crate::identity::PerspectiveConfidence;
use crate::live::LiveFeatureExtractor;
use crate::predictor::WinPredictor;
use crate::schema::Side;
use crate::telemetry::TelemetrySource;

const STOP_CHECK: Duration = Duration::from_millis(250);
/// Below this the model has little signal (few objectives taken yet).
pub const EARLY_GAME_SECS: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivePrediction {
    pub win_probability: f64,
    pub observer_side: Side,
    pub confidence: PerspectiveConfidence,
    pub game_time: f64,
    pub early_game: bool,
    pub uncounted_events: usize,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Nothing published yet.
    Idle,
    NoGame { reason: String },
    Prediction(LivePrediction),
    ModelUnavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    pub cycle: u64,
    pub published_at: DateTime<Utc>,
    pub status: FeedStatus,
}

/// Single-slot, last-writer-wins holder of the latest result.
#[derive(Debug)]
pub struct PredictionCell {
    slot: Mutex<Arc<PublishedState>>,
}

impl Default for PredictionCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionCell {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Arc::new(PublishedState {
                cycle: 0,
                published_at: Utc::now(),
                status: FeedStatus::Idle,
            })),
        }
    }

    pub fn publish(&self, state: PublishedState) {
        let next = Arc::new(state);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = next;
    }

    pub fn latest(&self) -> Arc<PublishedState> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&slot)
    }
}

/// One fetch-to-prediction pass. Telemetry failures degrade to `NoGame`.
pub fn run_cycle(
    source: &dyn TelemetrySource,
    extractor: &LiveFeatureExtractor,
    predictor: &WinPredictor,
) -> FeedStatus {
    if !source.is_game_running() {
        return FeedStatus::NoGame {
            reason: "no game running".to_string(),
        };
    }
    let snapshot = match source.fetch_snapshot() {
        Ok(s) => s,
        Err(err) => {
            debug!(%err, "snapshot fetch failed");
            return FeedStatus::NoGame {
                reason: err.to_string(),
            };
        }
    };
    let extraction = extractor.extract(&snapshot);
    match predictor.predict_features(&extraction.features) {
        Ok(p) => FeedStatus::Prediction(LivePrediction {
            win_probability: p,
            observer_side: extraction.observer_side,
            confidence: extraction.confidence,
            game_time: extraction.game_time,
            early_game: extraction.game_time < EARLY_GAME_SECS,
            uncounted_events: extraction.uncounted_events,
            features: extraction.features,
        }),
        Err(err) => FeedStatus::ModelUnavailable {
            reason: err.to_string(),
        },
    }
}

pub struct FeedHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Signals the loop and waits for it to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("feed thread panicked");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub fn spawn_feed<S>(
    source: S,
    predictor: WinPredictor,
    interval: Duration,
    cell: Arc<PredictionCell>,
) -> Result<FeedHandle>
where
    S: TelemetrySource + Send + 'static,
{
    let extractor = predictor.extractor()?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let join = thread::Builder::new()
        .name("winprob-feed".to_string())
        .spawn(move || {
            let mut cycle = 0u64;
            let mut next_due = Instant::now();
            while !stop_flag.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now >= next_due {
                    cycle += 1;
                    let status = run_cycle(&source, &extractor, &predictor);
                    log_status(cycle, &status);
                    cell.publish(PublishedState {
                        cycle,
                        published_at: Utc::now(),
                        status,
                    });
                    next_due = Instant::now() + interval;
                    continue;
                }
                thread::sleep(STOP_CHECK.min(next_due - now));
            }
            debug!(cycles = cycle, "feed stopped");
        })
        .map_err(|err| WinProbError::Telemetry(format!("spawn feed thread: {err}")))?;

    Ok(FeedHandle {
        stop,
        join: Some(join),
    })
}

fn log_status(cycle: u64, status: &FeedStatus) {
    match status {
        FeedStatus::Prediction(p) => info!(
            cycle,
            win_probability = p.win_probability,
            side = ?p.observer_side,
            confidence = ?p.confidence,
            game_time = p.game_time,
            early_game = p.early_game,
            "prediction published"
        ),
        FeedStatus::NoGame { reason } => debug!(cycle, %reason, "no game"),
        FeedStatus::ModelUnavailable { reason } => warn!(cycle, %reason, "model unavailable"),
        FeedStatus::Idle => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_last_writer_wins() {
        let cell = PredictionCell::new();
        assert_eq!(cell.latest().status, FeedStatus::Idle);
        for cycle in 1..=3 {
            cell.publish(PublishedState {
                cycle,
                published_at: Utc::now(),
                status: FeedStatus::NoGame {
                    reason: format!("c{cycle}"),
                },
            });
        }
        let held = cell.latest();
        assert_eq!(held.cycle, 3);
        cell.publish(PublishedState {
            cycle: 4,
            published_at: Utc::now(),
            status: FeedStatus::Idle,
        });
        assert_eq!(held.cycle, 3);
        assert_eq!(cell.latest().cycle, 4);
    }
}

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rift_winprob::config::AppConfig;
use rift_winprob::feed::{FeedStatus, PredictionCell, run_cycle, spawn_feed};
use rift_winprob::live_client::ReplaySource;
use rift_winprob::predictor::WinPredictor;
use rift_winprob::schema::Side;
use rift_winprob::telemetry::{LiveSnapshot, TelemetrySource};
use rift_winprob::{Result, WinProbError};

struct OfflineClient;

impl TelemetrySource for OfflineClient {
    fn is_game_running(&self) -> bool {
        false
    }

    fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        Err(WinProbError::Telemetry("connection refused".to_string()))
    }
}

struct FlakyClient;

impl TelemetrySource for FlakyClient {
    fn is_game_running(&self) -> bool {
        true
    }

    fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        Err(WinProbError::Telemetry("read timed out".to_string()))
    }
}

fn predictor() -> WinPredictor {
    let model = common::trained_model(common::temp_path("feed_unused.json"));
    WinPredictor::from_config(model, &AppConfig::default()).unwrap()
}

fn wait_for_cycle(cell: &PredictionCell, cycle: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while cell.latest().cycle < cycle {
        assert!(Instant::now() < deadline, "feed never reached cycle {cycle}");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn unreachable_client_reports_no_game() {
    let p = predictor();
    let extractor = p.extractor().unwrap();
    assert!(matches!(
        run_cycle(&OfflineClient, &extractor, &p),
        FeedStatus::NoGame { .. }
    ));
    match run_cycle(&FlakyClient, &extractor, &p) {
        FeedStatus::NoGame { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn replay_feed_publishes_prediction() {
    let source = ReplaySource::from_file(&common::fixture("live_snapshot.json")).unwrap();
    let cell = Arc::new(PredictionCell::new());
    let handle = spawn_feed(
        source,
        predictor(),
        Duration::from_millis(20),
        Arc::clone(&cell),
    )
    .unwrap();
    wait_for_cycle(&cell, 2);
    handle.stop();

    let state = cell.latest();
    match &state.status {
        FeedStatus::Prediction(p) => {
            assert_eq!(p.observer_side, Side::Red);
            assert!(p.win_probability < 0.5, "red trails in the replay: {}", p.win_probability);
            assert!(!p.early_game);
            assert_eq!(p.uncounted_events, 1);
        }
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn failing_source_keeps_publishing_no_game() {
    let cell = Arc::new(PredictionCell::new());
    let handle = spawn_feed(
        OfflineClient,
        predictor(),
        Duration::from_millis(10),
        Arc::clone(&cell),
    )
    .unwrap();
    wait_for_cycle(&cell, 3);
    assert!(!handle.is_finished());
    handle.stop();
    assert!(matches!(cell.latest().status, FeedStatus::NoGame { .. }));
}

#[test]
fn stop_does_not_wait_for_the_next_poll() {
    let cell = Arc::new(PredictionCell::new());
    let handle = spawn_feed(
        OfflineClient,
        predictor(),
        Duration::from_secs(60),
        Arc::clone(&cell),
    )
    .unwrap();
    wait_for_cycle(&cell, 1);
    let started = Instant::now();
    handle.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(cell.latest().cycle, 1);
}

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use rift_winprob::WinProbError;
use rift_winprob::config::AppConfig;
use rift_winprob::feed::{FeedHandle, FeedStatus, PredictionCell, spawn_feed};
use rift_winprob::live_client::{ReplaySource, live_client};
use rift_winprob::model::LogisticWinModel;
use rift_winprob::predictor::WinPredictor;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    rift_winprob::init_logging();

    let cfg = AppConfig::from_env();
    let mut model = LogisticWinModel::new(&cfg.model_path);
    if !model.load() {
        return Err(WinProbError::ModelUnavailable(format!(
            "no usable model at {} (run `train` first)",
            cfg.model_path.display()
        ))
        .into());
    }
    let predictor = WinPredictor::from_config(model, &cfg)?;
    let cell = Arc::new(PredictionCell::new());

    let handle: FeedHandle = match parse_replay_arg() {
        Some(path) => {
            info!(path = %path.display(), "replaying recorded snapshots");
            spawn_feed(
                ReplaySource::from_file(&path)?,
                predictor,
                cfg.poll_interval,
                Arc::clone(&cell),
            )?
        }
        None => {
            info!(
                url = %cfg.live_url,
                interval_secs = cfg.poll_interval.as_secs(),
                "polling live client"
            );
            spawn_feed(
                live_client(&cfg)?,
                predictor,
                cfg.poll_interval,
                Arc::clone(&cell),
            )?
        }
    };

    println!("Live win probability. Type q + Enter to quit.");
    let (quit_tx, quit_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        let _ = quit_tx.send(());
    });

    let mut last_cycle = 0u64;
    loop {
        match quit_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        let state = cell.latest();
        if state.cycle == last_cycle {
            continue;
        }
        last_cycle = state.cycle;
        let stamp = state.published_at.format("%H:%M:%S");
        match &state.status {
            FeedStatus::Prediction(p) => {
                let verdict = if p.win_probability > 0.70 {
                    "WINNING"
                } else if p.win_probability < 0.30 {
                    "LOSING"
                } else {
                    "CLOSE GAME"
                };
                println!(
                    "[{stamp}] {:.2}% ({verdict}) side={:?} t={:.0}s",
                    p.win_probability * 100.0,
                    p.observer_side,
                    p.game_time
                );
                if p.early_game {
                    println!("[{stamp}] early game, prediction is mostly baseline");
                }
            }
            FeedStatus::NoGame { .. } => println!("[{stamp}] No game running"),
            FeedStatus::ModelUnavailable { reason } => {
                println!("[{stamp}] Model unavailable: {reason}")
            }
            FeedStatus::Idle => {}
        }
    }

    handle.stop();
    Ok(())
}

fn parse_replay_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix("--replay=") {
            if !v.trim().is_empty() {
                return Some(PathBuf::from(v.trim()));
            }
        }
        if arg == "--replay"
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next));
        }
    }
    None
}

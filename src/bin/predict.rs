use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use rift_winprob::config::AppConfig;
use rift_winprob::model::LogisticWinModel;
use rift_winprob::predictor::WinPredictor;
use rift_winprob::telemetry::LiveSnapshot;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    rift_winprob::init_logging();

    let cfg = AppConfig::from_env();
    let model_path = parse_arg("--model")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.model_path.clone());
    let mut model = LogisticWinModel::new(&model_path);
    if !model.load() {
        return Err(anyhow!("no usable model at {} (run `train` first)", model_path.display()));
    }
    let predictor = WinPredictor::from_config(model, &cfg)?;

    if let Some(path) = parse_arg("--snapshot") {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
        let snapshot: LiveSnapshot =
            serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;
        let extraction = predictor.extractor()?.extract(&snapshot);
        let detail = predictor.predict_detailed(&extraction.features)?;
        println!("Side: {:?} ({:?})", extraction.observer_side, extraction.confidence);
        println!("Game time: {:.0}s", extraction.game_time);
        for (name, value) in &extraction.named {
            println!("  {name:18} {value:+.1}");
        }
        if extraction.uncounted_events > 0 {
            println!("Uncounted objective events: {}", extraction.uncounted_events);
        }
        println!("Raw: {:.4} (mirror {:.4})", detail.raw, detail.raw_mirror);
        println!("Win probability: {:.2}%", detail.probability * 100.0);
        return Ok(());
    }

    let mut values: HashMap<String, f64> = HashMap::new();
    if let Some(path) = parse_arg("--features") {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
        values = serde_json::from_str(&raw).with_context(|| format!("parse {path}"))?;
    }
    for arg in std::env::args().skip(1) {
        let Some((name, value)) = arg.split_once('=') else {
            continue;
        };
        if name.starts_with("--") {
            continue;
        }
        let value = value.trim().parse::<f64>().with_context(|| format!("parse value for {name}"))?;
        values.insert(name.trim().to_string(), value);
    }

    let p = predictor.predict_named(&values)?;
    println!("Baseline: {:.4}", predictor.calibration().baseline);
    println!("Win probability: {:.2}%", p * 100.0);
    Ok(())
}

fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix) {
            if !v.trim().is_empty() {
                return Some(v.trim().to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

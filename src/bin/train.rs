use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use rift_winprob::calibration::calibration_bins;
use rift_winprob::config::{AppConfig, parse_rank_tiers};
use rift_winprob::historical_dataset;
use rift_winprob::model::LogisticWinModel;
use rift_winprob::offline;
use rift_winprob::schema::{self, MatchFilter, RawTables};

const IMPROVEMENT_EPS: f64 = 1e-4;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    rift_winprob::init_logging();

    let cfg = AppConfig::from_env();
    let out_path = parse_arg("--out").map(PathBuf::from).unwrap_or_else(|| cfg.model_path.clone());
    let force = has_flag("--force");
    let rank_tiers = parse_arg("--ranks")
        .map(|raw| parse_rank_tiers(&raw))
        .or(cfg.rank_tiers.clone());
    let filter = MatchFilter { rank_tiers };

    let raw = match parse_arg("--dump") {
        Some(dump) => {
            let text = std::fs::read_to_string(&dump).with_context(|| format!("read {dump}"))?;
            serde_json::from_str::<RawTables>(&text).with_context(|| format!("parse {dump}"))?
        }
        None => {
            let db_path = parse_arg("--db")
                .map(PathBuf::from)
                .unwrap_or_else(|| cfg.db_path.clone());
            let conn = historical_dataset::open_db(&db_path)?;
            historical_dataset::load_tables(&conn, &filter)?
        }
    };

    let normalized = schema::normalize(&raw, &filter);
    let set = offline::engineer(&normalized);
    let r = set.report;
    println!("Historical feature set");
    println!(
        "candidates={} kept={} rejected={} orphaned_player_rows={}",
        r.candidates, r.kept, r.rejected_matches, normalized.orphaned_player_rows
    );
    println!(
        "dropped: no_blue={} no_red={} no_team_row={} missing_target={} partial_sides={}",
        r.dropped_no_blue_rows,
        r.dropped_no_red_rows,
        r.dropped_no_team_row,
        r.dropped_missing_target,
        r.partial_sides
    );
    for err in normalized.rejected.iter().take(6) {
        println!("  - {err}");
    }
    if set.is_empty() {
        return Err(anyhow!("no usable matches after filtering"));
    }

    let mut model = LogisticWinModel::new(&out_path);
    if let Some(seed) = parse_arg("--seed").and_then(|v| v.parse::<u64>().ok()) {
        model = model.with_seed(seed);
    }
    let report = model.train(&set.rows, &set.labels)?;
    println!();
    println!(
        "train log_loss={:.6} brier={:.6} acc={:.3} n={}",
        report.train.log_loss, report.train.brier, report.train.accuracy, report.train.samples
    );
    println!(
        "val   log_loss={:.6} brier={:.6} acc={:.3} n={} (base-rate log_loss={:.6})",
        report.validation.log_loss,
        report.validation.brier,
        report.validation.accuracy,
        report.validation.samples,
        report.baseline_val_log_loss
    );
    println!("iterations={} measured_baseline={:.4}", report.iterations, report.measured_baseline);

    println!();
    println!("Feature weights (standardized):");
    for (feature, coeff) in model.feature_weights() {
        println!("  {:18} coeff={:+.4}", feature.name(), coeff);
    }

    let probs = model.predict(&set.rows)?;
    println!();
    println!("Reliability (all rows):");
    for bin in calibration_bins(&probs, &set.labels, 10) {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  [{:.1}, {:.1}) n={:5} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    if !(report.validation.log_loss + IMPROVEMENT_EPS < report.baseline_val_log_loss) && !force {
        return Err(anyhow!(
            "validation log-loss did not improve (pass --force to still write artifact)"
        ));
    }
    model.save()?;
    println!();
    println!("artifact written: {}", out_path.display());
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

fn has_flag(flag: &str) -> bool {
    std::env::args().skip(1).any(|a| a == flag)
}

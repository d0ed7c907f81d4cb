use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::calibration::{DEFAULT_BOOST_EXPONENT, DEFAULT_COMPRESS_EXPONENT};
use crate::schema::RankTier;

const APP_DIR: &str = "rift_winprob";
pub const DEFAULT_LIVE_URL: &str = "https://127.0.0.1:2999/liveclientdata";
pub const DEFAULT_POLL_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub live_url: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub model_path: PathBuf,
    pub db_path: PathBuf,
    pub rank_tiers: Option<BTreeSet<u8>>,
    /// Overrides the baseline measured at training time.
    pub calibration_baseline: Option<f64>,
    pub compress_exponent: f64,
    pub boost_exponent: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let live_url = get("WINPROB_LIVE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_LIVE_URL.to_string());
        let poll_secs = get("WINPROB_POLL_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_SECS)
            .clamp(5, 120);
        let timeout_secs = get("WINPROB_FETCH_TIMEOUT_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS)
            .clamp(1, 10);

        let data_dir = app_data_dir_from(&lookup).unwrap_or_else(|| PathBuf::from("."));
        let model_path = get("WINPROB_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("win_model.json"));
        let db_path = get("WINPROB_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("historical_matches.sqlite"));

        let rank_tiers = get("WINPROB_RANK_TIERS").map(|raw| parse_rank_tiers(&raw));
        let calibration_baseline =
            get("WINPROB_CAL_BASELINE").and_then(|v| v.trim().parse::<f64>().ok());
        let compress_exponent = get("WINPROB_CAL_ALPHA")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_COMPRESS_EXPONENT);
        let boost_exponent = get("WINPROB_CAL_BETA")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(DEFAULT_BOOST_EXPONENT);

        Self {
            live_url,
            poll_interval: Duration::from_secs(poll_secs),
            fetch_timeout: Duration::from_secs(timeout_secs),
            model_path,
            db_path,
            rank_tiers,
            calibration_baseline,
            compress_exponent,
            boost_exponent,
        }
    }
}

/// Comma separated tier names or ids. A trailing `~` widens a tier to its
/// neighbours, e.g. `gold~` is silver, gold and platinum.
pub fn parse_rank_tiers(raw: &str) -> BTreeSet<u8> {
    let mut out = BTreeSet::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, widen) = match part.strip_suffix('~') {
            Some(name) => (name, true),
            None => (part, false),
        };
        match RankTier::from_name(name) {
            Some(tier) if widen => out.extend(tier.window()),
            Some(tier) => {
                out.insert(tier.id());
            }
            None => warn!(tier = part, "ignoring unknown rank tier"),
        }
    }
    out
}

fn app_data_dir_from<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    // Prefer XDG cache.
    if let Some(base) = lookup("XDG_CACHE_HOME").filter(|b| !b.trim().is_empty()) {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = lookup("HOME").filter(|h| !h.trim().is_empty())?;
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

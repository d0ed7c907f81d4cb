use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Result, WinProbError};
use crate::telemetry::{ActivePlayer, LiveSnapshot, TelemetrySource};

static DEFAULT_CLIENT: OnceCell<LiveClient> = OnceCell::new();

/// Process-wide client, built from the first config it is asked for.
pub fn live_client(cfg: &AppConfig) -> anyhow::Result<&'static LiveClient> {
    DEFAULT_CLIENT.get_or_try_init(|| LiveClient::new(&cfg.live_url, cfg.fetch_timeout))
}

/// Blocking client for the in-game live-client data API.
#[derive(Debug, Clone)]
pub struct LiveClient {
    base_url: String,
    http: Client,
}

impl LiveClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        // The game serves a self-signed certificate on localhost.
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build live client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}/{endpoint}", self.base_url);
        self.http
            .get(&url)
            .send()
            .and_then(|res| res.error_for_status())
            .and_then(|res| res.json::<Value>())
            .map_err(|err| WinProbError::Telemetry(format!("{url}: {err}")))
    }

    pub fn active_player_name(&self) -> Result<String> {
        let v = self.get_json("activeplayername")?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| WinProbError::Telemetry("activeplayername is not a string".to_string()))
    }
}

impl TelemetrySource for LiveClient {
    fn is_game_running(&self) -> bool {
        let url = format!("{}/activeplayername", self.base_url);
        match self.http.get(&url).send() {
            Ok(res) => res.status().is_success(),
            Err(err) => {
                debug!(%err, "live client not reachable");
                false
            }
        }
    }

    fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        let raw = self.get_json("allgamedata")?;
        let mut snapshot: LiveSnapshot = serde_json::from_value(raw)
            .map_err(|err| WinProbError::Telemetry(format!("allgamedata: {err}")))?;
        let has_identity = snapshot
            .active_player
            .as_ref()
            .is_some_and(|a| {
                a.summoner_name.is_some() || a.riot_id.is_some() || a.riot_id_game_name.is_some()
            });
        if !has_identity {
            if let Ok(name) = self.active_player_name() {
                let active = snapshot.active_player.get_or_insert_with(ActivePlayer::default);
                active.riot_id = Some(name);
            }
        }
        Ok(snapshot)
    }
}

/// Recorded snapshots served in order; the last one repeats.
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: Vec<LiveSnapshot>,
    cursor: AtomicUsize,
}

impl ReplaySource {
    pub fn new(frames: Vec<LiveSnapshot>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// A single snapshot object or an array of them.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let value: Value =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        let frames = match value {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value::<LiveSnapshot>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("decode replay frames")?,
            Value::Object(_) => vec![serde_json::from_value(value).context("decode snapshot")?],
            _ => return Err(anyhow!("{} holds neither a snapshot nor a list", path.display())),
        };
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl TelemetrySource for ReplaySource {
    fn is_game_running(&self) -> bool {
        !self.frames.is_empty()
    }

    fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        let last = self
            .frames
            .len()
            .checked_sub(1)
            .ok_or_else(|| WinProbError::Telemetry("replay has no frames".to_string()))?;
        Ok(self.frames[idx.min(last)].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::GameData;

    fn frame(t: f64) -> LiveSnapshot {
        LiveSnapshot {
            game_data: GameData { game_time: t },
            ..Default::default()
        }
    }

    #[test]
    fn replay_advances_then_repeats_last_frame() {
        let src = ReplaySource::new(vec![frame(60.0), frame(120.0)]);
        assert!(src.is_game_running());
        assert_eq!(src.fetch_snapshot().unwrap().game_data.game_time, 60.0);
        assert_eq!(src.fetch_snapshot().unwrap().game_data.game_time, 120.0);
        assert_eq!(src.fetch_snapshot().unwrap().game_data.game_time, 120.0);
    }

    #[test]
    fn empty_replay_reports_no_game() {
        let src = ReplaySource::default();
        assert!(!src.is_game_running());
        assert!(matches!(src.fetch_snapshot(), Err(WinProbError::Telemetry(_))));
    }

    #[test]
    fn unreachable_endpoint_is_not_running() {
        let client = LiveClient::new(
            "https://127.0.0.1:9/liveclientdata/",
            Duration::from_millis(200),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://127.0.0.1:9/liveclientdata");
        assert!(!client.is_game_running());
        assert!(client.fetch_snapshot().is_err());
    }
}

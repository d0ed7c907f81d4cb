//! Live-client snapshot payload (`/allgamedata`) and the source trait the
//! polling loop reads from.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const TEAM_ORDER: &str = "ORDER";
pub const TEAM_CHAOS: &str = "CHAOS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    #[serde(default)]
    pub active_player: Option<ActivePlayer>,
    #[serde(default)]
    pub all_players: Vec<LivePlayer>,
    #[serde(default)]
    pub events: EventLog,
    #[serde(default)]
    pub game_data: GameData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlayer {
    #[serde(default)]
    pub summoner_name: Option<String>,
    #[serde(default)]
    pub riot_id: Option<String>,
    #[serde(default)]
    pub riot_id_game_name: Option<String>,
    #[serde(default)]
    pub riot_id_tag_line: Option<String>,
    #[serde(default)]
    pub current_gold: Option<f64>,
    #[serde(default)]
    pub level: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePlayer {
    #[serde(default)]
    pub summoner_name: Option<String>,
    #[serde(default)]
    pub riot_id: Option<String>,
    #[serde(default)]
    pub riot_id_game_name: Option<String>,
    #[serde(default)]
    pub riot_id_tag_line: Option<String>,
    #[serde(default)]
    pub champion_name: Option<String>,
    /// `ORDER` or `CHAOS`.
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub total_gold: Option<f64>,
    #[serde(default)]
    pub current_gold: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    #[serde(default)]
    pub kills: f64,
    #[serde(default)]
    pub deaths: f64,
    #[serde(default)]
    pub assists: f64,
    #[serde(default)]
    pub creep_score: f64,
    #[serde(default)]
    pub ward_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, rename = "itemID")]
    pub item_id: u32,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "one")]
    pub count: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(default, rename = "Events")]
    pub events: Vec<LiveEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LiveEvent {
    #[serde(default, rename = "EventID")]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub event_time: Option<f64>,
    #[serde(default)]
    pub killer_name: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
}

impl LiveEvent {
    /// The identity credited with the event.
    pub fn actor(&self) -> Option<&str> {
        self.killer_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.recipient.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    Tower,
    Dragon,
    Baron,
    Herald,
    Inhibitor,
}

impl ObjectiveKind {
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "TurretKilled" => Some(Self::Tower),
            "DragonKill" => Some(Self::Dragon),
            "BaronKill" => Some(Self::Baron),
            "HeraldKill" => Some(Self::Herald),
            "InhibKilled" => Some(Self::Inhibitor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    #[serde(default)]
    pub game_time: f64,
}

/// Anything that can hand the polling loop a snapshot.
pub trait TelemetrySource {
    /// Cheap liveness check; `false` on any failure.
    fn is_game_running(&self) -> bool;

    fn fetch_snapshot(&self) -> Result<LiveSnapshot>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for &T {
    fn is_game_running(&self) -> bool {
        (**self).is_game_running()
    }

    fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        (**self).fetch_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_live_client_payload() {
        let raw = r#"{
            "activePlayer": {"summonerName": "Me", "currentGold": 512.5},
            "allPlayers": [{
                "summonerName": "Me", "championName": "Ahri", "team": "ORDER", "level": 9,
                "scores": {
                    "kills": 3, "deaths": 1, "assists": 4, "creepScore": 80, "wardScore": 12.5
                },
                "items": [
                    {"itemID": 1055, "price": 450, "count": 1},
                    {"itemID": 2003, "price": 50}
                ]
            }],
            "events": {"Events": [
                {"EventID": 7, "EventName": "DragonKill", "EventTime": 601.2, "KillerName": "Me"}
            ]},
            "gameData": {"gameTime": 812.4, "gameMode": "CLASSIC"}
        }"#;
        let snap: LiveSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snap.all_players.len(), 1);
        let p = &snap.all_players[0];
        assert_eq!(p.scores.creep_score, 80.0);
        assert_eq!(p.items[1].count, 1.0);
        assert_eq!(snap.events.events[0].actor(), Some("Me"));
        assert_eq!(
            ObjectiveKind::from_event_name(&snap.events.events[0].event_name),
            Some(ObjectiveKind::Dragon)
        );
        assert_eq!(snap.game_data.game_time, 812.4);
    }

    #[test]
    fn actor_falls_back_to_recipient() {
        let e = LiveEvent {
            event_name: "HeraldKill".to_string(),
            killer_name: Some("  ".to_string()),
            recipient: Some("Jungler".to_string()),
            ..Default::default()
        };
        assert_eq!(e.actor(), Some("Jungler"));
        assert_eq!(ObjectiveKind::from_event_name("ChampionKill"), None);
    }
}

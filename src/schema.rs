//! Raw historical tables and the normalizer that joins player rows to a side.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, WinProbError};

pub const CLASSIC_QUEUE: &str = "CLASSIC";
pub const TEAM_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RankTier {
    Iron = 1,
    Bronze = 2,
    Silver = 3,
    Gold = 4,
    Platinum = 5,
    Emerald = 6,
    Diamond = 7,
    Master = 8,
    Grandmaster = 9,
    Challenger = 10,
}

impl RankTier {
    pub const ALL: [RankTier; 10] = [
        RankTier::Iron,
        RankTier::Bronze,
        RankTier::Silver,
        RankTier::Gold,
        RankTier::Platinum,
        RankTier::Emerald,
        RankTier::Diamond,
        RankTier::Master,
        RankTier::Grandmaster,
        RankTier::Challenger,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        if let Ok(id) = key.parse::<u8>() {
            return Self::from_id(id);
        }
        let tier = match key.as_str() {
            "iron" => RankTier::Iron,
            "bronze" => RankTier::Bronze,
            "silver" => RankTier::Silver,
            "gold" => RankTier::Gold,
            "platinum" => RankTier::Platinum,
            "emerald" => RankTier::Emerald,
            "diamond" => RankTier::Diamond,
            "master" => RankTier::Master,
            "grandmaster" => RankTier::Grandmaster,
            "challenger" => RankTier::Challenger,
            _ => return None,
        };
        Some(tier)
    }

    /// This tier plus its direct neighbours.
    pub fn window(self) -> BTreeSet<u8> {
        let id = self.id();
        (id.saturating_sub(1).max(1)..=(id + 1).min(10)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: u64,
    #[serde(default)]
    pub game_duration: Option<f64>,
    pub queue_type: String,
    #[serde(default)]
    pub rank_tier: Option<u8>,
}

impl MatchRecord {
    pub fn is_classic(&self) -> bool {
        self.queue_type.trim().eq_ignore_ascii_case(CLASSIC_QUEUE)
    }
}

/// Authoritative team-level counts for one side. `None` means the source did
/// not record the column.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamSideTotals {
    #[serde(default)]
    pub kills: Option<f64>,
    #[serde(default)]
    pub deaths: Option<f64>,
    #[serde(default)]
    pub dragon_kills: Option<f64>,
    #[serde(default)]
    pub baron_kills: Option<f64>,
    #[serde(default)]
    pub tower_kills: Option<f64>,
    #[serde(default)]
    pub herald_kills: Option<f64>,
    #[serde(default)]
    pub inhib_kills: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMatchRow {
    pub match_id: u64,
    pub blue_roster: [u32; TEAM_SIZE],
    pub red_roster: [u32; TEAM_SIZE],
    #[serde(default)]
    pub blue: TeamSideTotals,
    #[serde(default)]
    pub red: TeamSideTotals,
    #[serde(default)]
    pub blue_win: Option<bool>,
    #[serde(default)]
    pub red_win: Option<bool>,
}

impl TeamMatchRow {
    pub fn roster(&self, side: Side) -> &[u32; TEAM_SIZE] {
        match side {
            Side::Blue => &self.blue_roster,
            Side::Red => &self.red_roster,
        }
    }

    pub fn totals(&self, side: Side) -> &TeamSideTotals {
        match side {
            Side::Blue => &self.blue,
            Side::Red => &self.red,
        }
    }

    /// Resolved BLUE outcome. `Ok(None)` when neither flag was recorded;
    /// an error when the flags contradict each other.
    pub fn blue_win_label(&self) -> Result<Option<bool>> {
        match (self.blue_win, self.red_win) {
            (Some(b), Some(r)) if b == r => Err(WinProbError::integrity(
                self.match_id,
                format!("win flags are not exclusive (blue={b}, red={r})"),
            )),
            (Some(b), _) => Ok(Some(b)),
            (None, Some(r)) => Ok(Some(!r)),
            (None, None) => Ok(None),
        }
    }
}

/// Links a player stat row to its match and champion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonerMatchRow {
    pub summoner_match_id: u64,
    pub match_id: u64,
    pub champion_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub kills: Option<f64>,
    #[serde(default)]
    pub deaths: Option<f64>,
    #[serde(default)]
    pub assists: Option<f64>,
    #[serde(default)]
    pub total_gold: Option<f64>,
    #[serde(default)]
    pub minions_killed: Option<f64>,
    #[serde(default)]
    pub vision_score: Option<f64>,
    #[serde(default)]
    pub champ_level: Option<f64>,
    #[serde(default)]
    pub dragon_kills: Option<f64>,
    #[serde(default)]
    pub baron_kills: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatRow {
    pub summoner_match_id: u64,
    #[serde(flatten)]
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerObservation {
    pub match_id: u64,
    pub summoner_match_id: u64,
    pub champion_id: u32,
    pub side: Side,
    pub stats: PlayerStats,
}

/// The four historical sources as loaded from storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTables {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub teams: Vec<TeamMatchRow>,
    #[serde(default)]
    pub summoner_matches: Vec<SummonerMatchRow>,
    #[serde(default)]
    pub player_stats: Vec<PlayerStatRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    /// Closed set of eligible tier ids. `None` keeps every tier, including unranked.
    pub rank_tiers: Option<BTreeSet<u8>>,
}

impl MatchFilter {
    pub fn classic_only() -> Self {
        Self::default()
    }

    pub fn with_rank_tiers(tiers: impl IntoIterator<Item = u8>) -> Self {
        Self {
            rank_tiers: Some(tiers.into_iter().collect()),
        }
    }

    pub fn allows(&self, m: &MatchRecord) -> bool {
        if !m.is_classic() {
            return false;
        }
        match (&self.rank_tiers, m.rank_tier) {
            (None, _) => true,
            (Some(allowed), Some(tier)) => allowed.contains(&tier),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTables {
    pub matches: HashMap<u64, MatchRecord>,
    pub teams: HashMap<u64, TeamMatchRow>,
    pub observations: Vec<PlayerObservation>,
    /// One entry per aborted match, ordered by match id.
    pub rejected: Vec<WinProbError>,
    /// Player rows with no join row; dropped individually.
    pub orphaned_player_rows: usize,
}

impl NormalizedTables {
    pub fn rejected_match_ids(&self) -> Vec<u64> {
        self.rejected
            .iter()
            .filter_map(|e| match e {
                WinProbError::DataIntegrity { match_id, .. } => Some(*match_id),
                _ => None,
            })
            .collect()
    }
}

/// BLUE if the champion is on the blue roster, RED if on the red roster.
/// Anything else is a joinability defect.
pub fn assign_side(champion_id: u32, team: &TeamMatchRow) -> Result<Side> {
    let in_blue = team.blue_roster.contains(&champion_id);
    let in_red = team.red_roster.contains(&champion_id);
    match (in_blue, in_red) {
        (true, false) => Ok(Side::Blue),
        (false, true) => Ok(Side::Red),
        (true, true) => Err(WinProbError::integrity(
            team.match_id,
            format!("champion {champion_id} is listed on both rosters"),
        )),
        (false, false) => Err(WinProbError::integrity(
            team.match_id,
            format!("champion {champion_id} matches neither roster"),
        )),
    }
}

pub fn normalize(raw: &RawTables, filter: &MatchFilter) -> NormalizedTables {
    let mut rejected: BTreeMap<u64, WinProbError> = BTreeMap::new();

    let matches: HashMap<u64, MatchRecord> = raw
        .matches
        .iter()
        .filter(|m| filter.allows(m))
        .map(|m| (m.match_id, m.clone()))
        .collect();

    let mut teams: HashMap<u64, TeamMatchRow> = HashMap::new();
    for row in &raw.teams {
        if !matches.contains_key(&row.match_id) {
            continue;
        }
        if teams.contains_key(&row.match_id) {
            rejected.entry(row.match_id).or_insert_with(|| {
                WinProbError::integrity(row.match_id, "more than one team row for match")
            });
            continue;
        }
        if let Err(err) = row.blue_win_label() {
            rejected.entry(row.match_id).or_insert(err);
        }
        teams.insert(row.match_id, row.clone());
    }

    let links: HashMap<u64, &SummonerMatchRow> = raw
        .summoner_matches
        .iter()
        .map(|l| (l.summoner_match_id, l))
        .collect();

    let mut observations = Vec::new();
    let mut first_seen: HashMap<u64, PlayerStats> = HashMap::new();
    let mut orphaned = 0usize;
    for row in &raw.player_stats {
        let Some(link) = links.get(&row.summoner_match_id) else {
            orphaned += 1;
            continue;
        };
        if !matches.contains_key(&link.match_id) {
            continue;
        }
        // Without a team row there is no roster; the validity filter drops these.
        let Some(team) = teams.get(&link.match_id) else {
            continue;
        };
        if let Some(first) = first_seen.get(&row.summoner_match_id) {
            if *first != row.stats {
                rejected.entry(link.match_id).or_insert_with(|| {
                    WinProbError::integrity(
                        link.match_id,
                        format!(
                            "conflicting stat rows for summoner match {}",
                            row.summoner_match_id
                        ),
                    )
                });
            }
            continue;
        }
        first_seen.insert(row.summoner_match_id, row.stats);
        match assign_side(link.champion_id, team) {
            Ok(side) => observations.push(PlayerObservation {
                match_id: link.match_id,
                summoner_match_id: row.summoner_match_id,
                champion_id: link.champion_id,
                side,
                stats: row.stats,
            }),
            Err(err) => {
                rejected.entry(link.match_id).or_insert(err);
            }
        }
    }

    if orphaned > 0 {
        warn!(orphaned, "player rows without a match link were dropped");
    }
    for err in rejected.values() {
        warn!(%err, "match rejected");
    }

    observations.retain(|o| !rejected.contains_key(&o.match_id));
    teams.retain(|id, _| !rejected.contains_key(id));
    debug!(
        matches = matches.len(),
        teams = teams.len(),
        observations = observations.len(),
        "normalized historical tables"
    );

    NormalizedTables {
        matches,
        teams,
        observations,
        rejected: rejected.into_values().collect(),
        orphaned_player_rows: orphaned,
    }
}

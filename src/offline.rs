//! Historical feature engineering: per-side aggregates to `(X, y)`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::features::FeatureVector;
use crate::schema::{
    NormalizedTables, PlayerObservation, PlayerStats, Side, TEAM_SIZE, TeamMatchRow, TeamSideTotals,
};

/// Per-side totals for one match. `None` until zero-fill.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeamAggregate {
    pub kills: Option<f64>,
    pub deaths: Option<f64>,
    pub assists: Option<f64>,
    pub gold: Option<f64>,
    pub creep_score: Option<f64>,
    pub vision_score: Option<f64>,
    pub level: Option<f64>,
    pub dragons: Option<f64>,
    pub barons: Option<f64>,
    pub heralds: Option<f64>,
    pub towers: Option<f64>,
    pub inhibitors: Option<f64>,
    pub win: Option<bool>,
    /// Distinct player rows behind the player-level sums.
    pub observed_players: usize,
}

impl TeamAggregate {
    /// Sums the side's distinct players and scales every player-level sum by
    /// `5/N`. A team-row total is used instead only when the row carries it
    /// for both sides, so both halves of a differential share one source.
    pub fn build(side: Side, players: &[&PlayerObservation], team: &TeamMatchRow) -> Self {
        let mut seen: HashSet<u64> = HashSet::new();
        let distinct: Vec<&PlayerObservation> = players
            .iter()
            .copied()
            .filter(|p| seen.insert(p.summoner_match_id))
            .collect();
        let n = distinct.len();
        let scaled = |f: fn(&PlayerStats) -> Option<f64>| -> Option<f64> {
            distinct
                .iter()
                .filter_map(|p| f(&p.stats))
                .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
                .map(|total| scale_partial(total, n))
        };
        let authoritative = |f: fn(&TeamSideTotals) -> Option<f64>| -> Option<f64> {
            f(&team.blue)?;
            f(&team.red)?;
            f(team.totals(side))
        };

        let win = team.blue_win_label().ok().flatten().map(|blue| match side {
            Side::Blue => blue,
            Side::Red => !blue,
        });

        Self {
            kills: authoritative(|t| t.kills).or_else(|| scaled(|s| s.kills)),
            deaths: authoritative(|t| t.deaths).or_else(|| scaled(|s| s.deaths)),
            assists: scaled(|s| s.assists),
            gold: scaled(|s| s.total_gold),
            creep_score: scaled(|s| s.minions_killed),
            vision_score: scaled(|s| s.vision_score),
            level: scaled(|s| s.champ_level),
            dragons: authoritative(|t| t.dragon_kills).or_else(|| scaled(|s| s.dragon_kills)),
            barons: authoritative(|t| t.baron_kills).or_else(|| scaled(|s| s.baron_kills)),
            heralds: team.totals(side).herald_kills,
            towers: team.totals(side).tower_kills,
            inhibitors: team.totals(side).inhib_kills,
            win,
            observed_players: n,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.observed_players < TEAM_SIZE
    }
}

/// Extrapolates a partial-side total to a full team of five. `n == 0` is
/// treated as one observed player.
pub fn scale_partial(total: f64, n: usize) -> f64 {
    total * TEAM_SIZE as f64 / n.max(1) as f64
}

fn diff(blue: Option<f64>, red: Option<f64>) -> f64 {
    match (blue, red) {
        (Some(b), Some(r)) => b - r,
        _ => 0.0,
    }
}

/// BLUE minus RED for every differential, zero where either side is missing.
pub fn differential_features(
    blue: &TeamAggregate,
    red: &TeamAggregate,
    game_duration: Option<f64>,
) -> FeatureVector {
    FeatureVector {
        kill_diff: diff(blue.kills, red.kills),
        assist_diff: diff(blue.assists, red.assists),
        gold_diff: diff(blue.gold, red.gold),
        cs_diff: diff(blue.creep_score, red.creep_score),
        ward_score_diff: diff(blue.vision_score, red.vision_score),
        level_diff: diff(blue.level, red.level),
        dragon_diff: diff(blue.dragons, red.dragons),
        baron_diff: diff(blue.barons, red.barons),
        tower_diff: diff(blue.towers, red.towers),
        herald_diff: diff(blue.heralds, red.heralds),
        inhib_diff: diff(blue.inhibitors, red.inhibitors),
        game_duration: game_duration.filter(|d| d.is_finite()).unwrap_or(0.0),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineerReport {
    pub candidates: usize,
    pub kept: usize,
    pub dropped_no_blue_rows: usize,
    pub dropped_no_red_rows: usize,
    pub dropped_no_team_row: usize,
    pub dropped_missing_target: usize,
    pub partial_sides: usize,
    pub rejected_matches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub match_ids: Vec<u64>,
    pub rows: Vec<FeatureVector>,
    /// `true` when BLUE won.
    pub labels: Vec<bool>,
    pub report: EngineerReport,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

enum MatchOutcome {
    Kept {
        match_id: u64,
        features: FeatureVector,
        blue_win: bool,
        partial_sides: usize,
    },
    NoBlueRows,
    NoRedRows,
    NoTeamRow,
    MissingTarget(u64),
}

pub fn engineer(tables: &NormalizedTables) -> TrainingSet {
    let mut by_match: BTreeMap<u64, (Vec<&PlayerObservation>, Vec<&PlayerObservation>)> =
        BTreeMap::new();
    for obs in &tables.observations {
        let entry = by_match.entry(obs.match_id).or_default();
        match obs.side {
            Side::Blue => entry.0.push(obs),
            Side::Red => entry.1.push(obs),
        }
    }

    let candidates: BTreeSet<u64> = by_match
        .keys()
        .copied()
        .chain(tables.teams.keys().copied())
        .collect();
    let candidates: Vec<u64> = candidates.into_iter().collect();
    let empty: (Vec<&PlayerObservation>, Vec<&PlayerObservation>) = (Vec::new(), Vec::new());

    let outcomes: Vec<MatchOutcome> = candidates
        .par_iter()
        .map(|match_id| {
            let (blue_rows, red_rows) = by_match.get(match_id).unwrap_or(&empty);
            if blue_rows.is_empty() {
                return MatchOutcome::NoBlueRows;
            }
            if red_rows.is_empty() {
                return MatchOutcome::NoRedRows;
            }
            let Some(team) = tables.teams.get(match_id) else {
                return MatchOutcome::NoTeamRow;
            };
            let blue = TeamAggregate::build(Side::Blue, blue_rows, team);
            let red = TeamAggregate::build(Side::Red, red_rows, team);
            let Some(blue_win) = blue.win else {
                return MatchOutcome::MissingTarget(*match_id);
            };
            let duration = tables.matches.get(match_id).and_then(|m| m.game_duration);
            MatchOutcome::Kept {
                match_id: *match_id,
                features: differential_features(&blue, &red, duration),
                blue_win,
                partial_sides: usize::from(blue.is_partial()) + usize::from(red.is_partial()),
            }
        })
        .collect();

    let mut out = TrainingSet {
        report: EngineerReport {
            candidates: candidates.len(),
            rejected_matches: tables.rejected.len(),
            ..Default::default()
        },
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            MatchOutcome::Kept {
                match_id,
                features,
                blue_win,
                partial_sides,
            } => {
                out.match_ids.push(match_id);
                out.rows.push(features);
                out.labels.push(blue_win);
                out.report.partial_sides += partial_sides;
            }
            MatchOutcome::NoBlueRows => out.report.dropped_no_blue_rows += 1,
            MatchOutcome::NoRedRows => out.report.dropped_no_red_rows += 1,
            MatchOutcome::NoTeamRow => out.report.dropped_no_team_row += 1,
            MatchOutcome::MissingTarget(match_id) => {
                debug!(match_id, "dropping match without a win flag");
                out.report.dropped_missing_target += 1;
            }
        }
    }
    out.report.kept = out.rows.len();
    info!(
        candidates = out.report.candidates,
        kept = out.report.kept,
        partial_sides = out.report.partial_sides,
        "engineered historical features"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: u64, side: Side, gold: f64) -> PlayerObservation {
        PlayerObservation {
            match_id: 1,
            summoner_match_id: id,
            champion_id: id as u32,
            side,
            stats: PlayerStats {
                kills: Some(2.0),
                total_gold: Some(gold),
                dragon_kills: Some(1.0),
                ..Default::default()
            },
        }
    }

    fn team() -> TeamMatchRow {
        TeamMatchRow {
            match_id: 1,
            blue_roster: [1, 2, 3, 4, 5],
            red_roster: [6, 7, 8, 9, 10],
            blue: TeamSideTotals {
                kills: Some(20.0),
                ..Default::default()
            },
            red: TeamSideTotals::default(),
            blue_win: None,
            red_win: Some(false),
        }
    }

    #[test]
    fn scale_partial_handles_three_and_zero() {
        assert!((scale_partial(3000.0, 3) - 5000.0).abs() < 1e-9);
        let z = scale_partial(1234.0, 0);
        assert!(z.is_finite());
        assert_eq!(z, 6170.0);
    }

    #[test]
    fn one_sided_team_total_falls_back_to_scaled_player_sums() {
        let t = team();
        let a = obs(1, Side::Blue, 1000.0);
        let b = obs(2, Side::Blue, 2000.0);
        let blue = TeamAggregate::build(Side::Blue, &[&a, &b], &t);
        // Red carries no team-level kills, so the blue total is not used.
        assert_eq!(blue.kills, Some(10.0));
        assert_eq!(blue.gold, Some(7500.0));
        assert_eq!(blue.dragons, Some(5.0));
        assert_eq!(blue.win, Some(true));
        assert!(blue.is_partial());

        let red = TeamAggregate::build(Side::Red, &[&a], &t);
        assert_eq!(red.kills, Some(10.0));
        assert_eq!(red.win, Some(false));
    }

    #[test]
    fn team_totals_win_when_both_sides_have_them() {
        let mut t = team();
        t.red.kills = Some(14.0);
        let a = obs(1, Side::Blue, 1000.0);
        assert_eq!(TeamAggregate::build(Side::Blue, &[&a], &t).kills, Some(20.0));
        assert_eq!(TeamAggregate::build(Side::Red, &[&a], &t).kills, Some(14.0));
    }

    #[test]
    fn three_players_without_team_kills_scale_to_five() {
        let mut t = team();
        t.blue.kills = None;
        let rows: Vec<PlayerObservation> = (1..=3)
            .map(|id| {
                let mut o = obs(id, Side::Blue, 3000.0);
                o.stats.kills = Some(3.0);
                o
            })
            .collect();
        let refs: Vec<&PlayerObservation> = rows.iter().collect();
        let agg = TeamAggregate::build(Side::Blue, &refs, &t);
        assert_eq!(agg.observed_players, 3);
        assert!((agg.kills.unwrap() - 15.0).abs() < 1e-9);
        assert!((agg.gold.unwrap() - 15000.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_player_rows_count_once() {
        let t = team();
        let a = obs(1, Side::Blue, 1000.0);
        let agg = TeamAggregate::build(Side::Blue, &[&a, &a], &t);
        assert_eq!(agg.observed_players, 1);
        assert_eq!(agg.gold, Some(5000.0));
        assert_eq!(agg.kills, Some(10.0));
    }

    #[test]
    fn missing_side_value_gives_zero_diff() {
        let blue = TeamAggregate {
            level: Some(40.0),
            gold: Some(100.0),
            ..Default::default()
        };
        let red = TeamAggregate {
            gold: Some(50.0),
            ..Default::default()
        };
        let f = differential_features(&blue, &red, None);
        assert_eq!(f.level_diff, 0.0);
        assert_eq!(f.gold_diff, 50.0);
        assert_eq!(f.game_duration, 0.0);
    }
}

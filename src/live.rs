//! Feature extraction from a live-client snapshot, oriented to the local player.

use tracing::debug;

use crate::error::{Result, WinProbError};
use crate::features::{FeatureSchema, FeatureVector, SCHEMA_VERSION};
use crate::identity::{PerspectiveConfidence, TeamIdentities, orient, side_for_team_tag};
use crate::schema::Side;
use crate::telemetry::{LivePlayer, LiveSnapshot, ObjectiveKind};

/// Gold held by one player: explicit total, then current gold, then the
/// value of their items. The first available source wins.
pub fn player_gold(player: &LivePlayer) -> f64 {
    if let Some(total) = player.total_gold.filter(|g| g.is_finite()) {
        return total;
    }
    if let Some(current) = player.current_gold.filter(|g| g.is_finite()) {
        return current;
    }
    player.items.iter().map(|i| i.price * i.count).sum()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SideTotals {
    kills: f64,
    assists: f64,
    gold: f64,
    cs: f64,
    ward_score: f64,
    level: f64,
    dragons: f64,
    barons: f64,
    towers: f64,
    heralds: f64,
    inhibitors: f64,
}

impl SideTotals {
    fn add_player(&mut self, p: &LivePlayer) {
        self.kills += p.scores.kills;
        self.assists += p.scores.assists;
        self.gold += player_gold(p);
        self.cs += p.scores.creep_score;
        self.ward_score += p.scores.ward_score;
        self.level += p.level.unwrap_or(0.0);
    }

    fn add_objective(&mut self, kind: ObjectiveKind) {
        let slot = match kind {
            ObjectiveKind::Tower => &mut self.towers,
            ObjectiveKind::Dragon => &mut self.dragons,
            ObjectiveKind::Baron => &mut self.barons,
            ObjectiveKind::Herald => &mut self.heralds,
            ObjectiveKind::Inhibitor => &mut self.inhibitors,
        };
        *slot += 1.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveExtraction {
    /// Observer minus opponent, every canonical feature.
    pub features: FeatureVector,
    /// The model's columns, in the model's order.
    pub named: Vec<(String, f64)>,
    pub observer_side: Side,
    pub confidence: PerspectiveConfidence,
    /// Objective events whose actor matched neither team.
    pub uncounted_events: usize,
    pub game_time: f64,
}

#[derive(Debug, Clone)]
pub struct LiveFeatureExtractor {
    schema: FeatureSchema,
}

impl LiveFeatureExtractor {
    pub fn new(schema: &FeatureSchema) -> Result<Self> {
        if schema.version() != SCHEMA_VERSION {
            return Err(WinProbError::SchemaMismatch(format!(
                "extractor built for schema {} but model uses {}",
                SCHEMA_VERSION,
                schema.version()
            )));
        }
        if schema.is_empty() {
            return Err(WinProbError::SchemaMismatch("model has no features".to_string()));
        }
        Ok(Self { schema: schema.clone() })
    }

    pub fn canonical() -> Self {
        Self {
            schema: FeatureSchema::canonical(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn extract(&self, snapshot: &LiveSnapshot) -> LiveExtraction {
        let teams = TeamIdentities::from_players(&snapshot.all_players);
        let (observer_side, confidence) = teams.resolve_observer(snapshot.active_player.as_ref());

        let mut blue = SideTotals::default();
        let mut red = SideTotals::default();
        for p in &snapshot.all_players {
            match side_for_team_tag(&p.team) {
                Some(Side::Blue) => blue.add_player(p),
                Some(Side::Red) => red.add_player(p),
                None => debug!(team = %p.team, "player without a known team tag"),
            }
        }

        let mut uncounted_events = 0usize;
        for event in &snapshot.events.events {
            let Some(kind) = ObjectiveKind::from_event_name(&event.event_name) else {
                continue;
            };
            match event.actor().and_then(|a| teams.attribute(a)) {
                Some(Side::Blue) => blue.add_objective(kind),
                Some(Side::Red) => red.add_objective(kind),
                None => uncounted_events += 1,
            }
        }
        if uncounted_events > 0 {
            debug!(uncounted_events, "objective events not attributed to either team");
        }

        let game_time = if snapshot.game_data.game_time.is_finite() {
            snapshot.game_data.game_time.max(0.0)
        } else {
            0.0
        };
        let order_minus_chaos = FeatureVector {
            kill_diff: blue.kills - red.kills,
            assist_diff: blue.assists - red.assists,
            gold_diff: blue.gold - red.gold,
            cs_diff: blue.cs - red.cs,
            ward_score_diff: blue.ward_score - red.ward_score,
            level_diff: blue.level - red.level,
            dragon_diff: blue.dragons - red.dragons,
            baron_diff: blue.barons - red.barons,
            tower_diff: blue.towers - red.towers,
            herald_diff: blue.heralds - red.heralds,
            inhib_diff: blue.inhibitors - red.inhibitors,
            game_duration: game_time,
        };
        let features = orient(order_minus_chaos, observer_side);
        let named = self
            .schema
            .features()
            .iter()
            .map(|f| (f.name().to_string(), features.get(*f)))
            .collect();

        LiveExtraction {
            features,
            named,
            observer_side,
            confidence,
            uncounted_events,
            game_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Item;

    #[test]
    fn gold_uses_first_available_source() {
        let mut p = LivePlayer {
            items: vec![
                Item {
                    price: 400.0,
                    count: 2.0,
                    ..Default::default()
                },
                Item {
                    price: 100.0,
                    count: 1.0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(player_gold(&p), 900.0);
        p.current_gold = Some(250.0);
        assert_eq!(player_gold(&p), 250.0);
        p.total_gold = Some(5000.0);
        assert_eq!(player_gold(&p), 5000.0);
    }

    #[test]
    fn schema_subset_limits_named_output() {
        let schema =
            FeatureSchema::from_names(SCHEMA_VERSION, &["tower_diff", "game_duration"]).unwrap();
        let ex = LiveFeatureExtractor::new(&schema).unwrap();
        let out = ex.extract(&LiveSnapshot::default());
        let names: Vec<&str> = out.named.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["tower_diff", "game_duration"]);
        assert_eq!(out.confidence, PerspectiveConfidence::Defaulted);
        assert_eq!(out.features, FeatureVector::neutral(0.0));
    }
}

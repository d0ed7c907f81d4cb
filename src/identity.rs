//! Team membership by normalized identity, and which side the local player is on.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::FeatureVector;
use crate::schema::Side;
use crate::telemetry::{ActivePlayer, LivePlayer, TEAM_CHAOS, TEAM_ORDER};

/// Lower-cased with every non-alphanumeric character removed, so
/// `"Faker#KR1"`, `"faker kr1"` and `"FAKERKR1"` compare equal.
pub fn normalize_identity(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn side_for_team_tag(team: &str) -> Option<Side> {
    let tag = team.trim();
    if tag.eq_ignore_ascii_case(TEAM_ORDER) {
        Some(Side::Blue)
    } else if tag.eq_ignore_ascii_case(TEAM_CHAOS) {
        Some(Side::Red)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveConfidence {
    Resolved,
    /// Observer matched neither side (or both); side A was assumed.
    Defaulted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    ids: HashSet<String>,
}

impl IdentitySet {
    pub fn insert(&mut self, raw: &str) {
        let id = normalize_identity(raw);
        if !id.is_empty() {
            self.ids.insert(id);
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        let id = normalize_identity(raw);
        !id.is_empty() && self.ids.contains(&id)
    }

    pub fn contains_any<'a>(&self, raws: impl IntoIterator<Item = &'a str>) -> bool {
        raws.into_iter().any(|r| self.contains(r))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Every identifier format a name can show up under in events and the active
/// player block.
fn name_variants(
    summoner_name: Option<&str>,
    riot_id: Option<&str>,
    game_name: Option<&str>,
    tag_line: Option<&str>,
) -> Vec<String> {
    let mut out = Vec::with_capacity(6);
    if let Some(name) = summoner_name {
        out.push(name.to_string());
        if let Some((head, _)) = name.split_once('#') {
            out.push(head.to_string());
        }
    }
    if let Some(id) = riot_id {
        out.push(id.to_string());
        if let Some((head, _)) = id.split_once('#') {
            out.push(head.to_string());
        }
    }
    if let Some(game) = game_name {
        out.push(game.to_string());
        if let Some(tag) = tag_line {
            out.push(format!("{game}#{tag}"));
        }
    }
    out
}

pub fn player_identifiers(player: &LivePlayer) -> Vec<String> {
    let mut out = name_variants(
        player.summoner_name.as_deref(),
        player.riot_id.as_deref(),
        player.riot_id_game_name.as_deref(),
        player.riot_id_tag_line.as_deref(),
    );
    if let Some(champ) = player.champion_name.as_deref() {
        out.push(champ.to_string());
    }
    out
}

pub fn active_identifiers(active: &ActivePlayer) -> Vec<String> {
    name_variants(
        active.summoner_name.as_deref(),
        active.riot_id.as_deref(),
        active.riot_id_game_name.as_deref(),
        active.riot_id_tag_line.as_deref(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamIdentities {
    pub blue: IdentitySet,
    pub red: IdentitySet,
}

impl TeamIdentities {
    pub fn from_players(players: &[LivePlayer]) -> Self {
        let mut out = Self::default();
        for p in players {
            let set = match side_for_team_tag(&p.team) {
                Some(Side::Blue) => &mut out.blue,
                Some(Side::Red) => &mut out.red,
                None => continue,
            };
            for id in player_identifiers(p) {
                set.insert(&id);
            }
        }
        out
    }

    pub fn set(&self, side: Side) -> &IdentitySet {
        match side {
            Side::Blue => &self.blue,
            Side::Red => &self.red,
        }
    }

    /// The side an event actor belongs to. `None` when the actor is in neither
    /// set or in both.
    pub fn attribute(&self, actor: &str) -> Option<Side> {
        match (self.blue.contains(actor), self.red.contains(actor)) {
            (true, false) => Some(Side::Blue),
            (false, true) => Some(Side::Red),
            _ => None,
        }
    }

    pub fn resolve_observer(&self, active: Option<&ActivePlayer>) -> (Side, PerspectiveConfidence) {
        let ids = active.map(active_identifiers).unwrap_or_default();
        let in_blue = self.blue.contains_any(ids.iter().map(String::as_str));
        let in_red = self.red.contains_any(ids.iter().map(String::as_str));
        match (in_blue, in_red) {
            (true, false) => (Side::Blue, PerspectiveConfidence::Resolved),
            (false, true) => (Side::Red, PerspectiveConfidence::Resolved),
            _ => {
                debug!(candidates = ids.len(), "observer side unresolved, assuming ORDER");
                (Side::Blue, PerspectiveConfidence::Defaulted)
            }
        }
    }
}

/// Turns an ORDER-minus-CHAOS vector into observer-minus-opponent.
pub fn orient(features: FeatureVector, observer: Side) -> FeatureVector {
    match observer {
        Side::Blue => features,
        Side::Red => features.negated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, champ: &str, team: &str) -> LivePlayer {
        LivePlayer {
            summoner_name: Some(name.to_string()),
            champion_name: Some(champ.to_string()),
            team: team.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(normalize_identity("Faker#KR1"), "fakerkr1");
        assert_eq!(normalize_identity(" faker kr1 "), "fakerkr1");
        assert_eq!(normalize_identity("Kai'Sa"), "kaisa");
        assert_eq!(normalize_identity("#!"), "");
    }

    #[test]
    fn riot_id_formats_resolve_to_the_same_player() {
        let mut p = player("Faker#KR1", "Ahri", "ORDER");
        p.riot_id_game_name = Some("Faker".to_string());
        p.riot_id_tag_line = Some("KR1".to_string());
        let teams = TeamIdentities::from_players(&[p, player("Other", "Zed", "CHAOS")]);
        assert_eq!(teams.attribute("faker"), Some(Side::Blue));
        assert_eq!(teams.attribute("FAKER#kr1"), Some(Side::Blue));
        assert_eq!(teams.attribute("Ahri"), Some(Side::Blue));
        assert_eq!(teams.attribute("zed"), Some(Side::Red));
        assert_eq!(teams.attribute("Turret_T1_L_03_A"), None);
    }

    #[test]
    fn shared_identity_is_not_attributed() {
        let teams = TeamIdentities::from_players(&[
            player("Twin", "Ahri", "ORDER"),
            player("Twin", "Zed", "CHAOS"),
        ]);
        assert_eq!(teams.attribute("twin"), None);
    }

    #[test]
    fn observer_resolution_and_default() {
        let teams = TeamIdentities::from_players(&[
            player("Blue1", "Ahri", "ORDER"),
            player("Red1", "Zed", "CHAOS"),
        ]);
        let me = ActivePlayer {
            riot_id: Some("Red1#EUW".to_string()),
            ..Default::default()
        };
        assert_eq!(teams.resolve_observer(Some(&me)), (Side::Red, PerspectiveConfidence::Resolved));
        let stranger = ActivePlayer {
            summoner_name: Some("Spectator".to_string()),
            ..Default::default()
        };
        assert_eq!(
            teams.resolve_observer(Some(&stranger)),
            (Side::Blue, PerspectiveConfidence::Defaulted)
        );
        assert_eq!(teams.resolve_observer(None), (Side::Blue, PerspectiveConfidence::Defaulted));
    }
}

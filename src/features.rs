//! Canonical feature schema shared by the historical and live paths.
//!
//! Every differential is "my side minus the other side": BLUE minus RED when
//! built from match tables, observer minus opponent when built from telemetry.
//! `game_duration` is the only absolute value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WinProbError};

/// Bumped whenever a feature is added, removed, renamed or changes meaning.
pub const SCHEMA_VERSION: u32 = 2;

pub const FEATURE_COUNT: usize = 12;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "kill_diff",
    "assist_diff",
    "gold_diff",
    "cs_diff",
    "ward_score_diff",
    "level_diff",
    "dragon_diff",
    "baron_diff",
    "tower_diff",
    "herald_diff",
    "inhib_diff",
    "game_duration",
];

/// Mid-game duration (seconds) used to measure the neutral baseline.
pub const REPRESENTATIVE_DURATION_SECS: f64 = 1200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    KillDiff,
    AssistDiff,
    GoldDiff,
    CsDiff,
    WardScoreDiff,
    LevelDiff,
    DragonDiff,
    BaronDiff,
    TowerDiff,
    HeraldDiff,
    InhibDiff,
    GameDuration,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::KillDiff,
        Feature::AssistDiff,
        Feature::GoldDiff,
        Feature::CsDiff,
        Feature::WardScoreDiff,
        Feature::LevelDiff,
        Feature::DragonDiff,
        Feature::BaronDiff,
        Feature::TowerDiff,
        Feature::HeraldDiff,
        Feature::InhibDiff,
        Feature::GameDuration,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim();
        Self::ALL.iter().copied().find(|f| f.name() == key)
    }

    pub fn is_differential(self) -> bool {
        self != Feature::GameDuration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub kill_diff: f64,
    pub assist_diff: f64,
    pub gold_diff: f64,
    pub cs_diff: f64,
    pub ward_score_diff: f64,
    pub level_diff: f64,
    pub dragon_diff: f64,
    pub baron_diff: f64,
    pub tower_diff: f64,
    pub herald_diff: f64,
    pub inhib_diff: f64,
    pub game_duration: f64,
}

impl FeatureVector {
    /// All differentials zero at the given elapsed time.
    pub fn neutral(game_duration: f64) -> Self {
        Self {
            game_duration,
            ..Default::default()
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::KillDiff => self.kill_diff,
            Feature::AssistDiff => self.assist_diff,
            Feature::GoldDiff => self.gold_diff,
            Feature::CsDiff => self.cs_diff,
            Feature::WardScoreDiff => self.ward_score_diff,
            Feature::LevelDiff => self.level_diff,
            Feature::DragonDiff => self.dragon_diff,
            Feature::BaronDiff => self.baron_diff,
            Feature::TowerDiff => self.tower_diff,
            Feature::HeraldDiff => self.herald_diff,
            Feature::InhibDiff => self.inhib_diff,
            Feature::GameDuration => self.game_duration,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::KillDiff => &mut self.kill_diff,
            Feature::AssistDiff => &mut self.assist_diff,
            Feature::GoldDiff => &mut self.gold_diff,
            Feature::CsDiff => &mut self.cs_diff,
            Feature::WardScoreDiff => &mut self.ward_score_diff,
            Feature::LevelDiff => &mut self.level_diff,
            Feature::DragonDiff => &mut self.dragon_diff,
            Feature::BaronDiff => &mut self.baron_diff,
            Feature::TowerDiff => &mut self.tower_diff,
            Feature::HeraldDiff => &mut self.herald_diff,
            Feature::InhibDiff => &mut self.inhib_diff,
            Feature::GameDuration => &mut self.game_duration,
        };
        *slot = value;
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        Feature::from_name(name).map(|f| self.get(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (f, v) in self.iter() {
            out[f.index()] = v;
        }
        out
    }

    /// Every differential sign-flipped; duration unchanged.
    pub fn negated(&self) -> Self {
        let mut out = *self;
        for f in Feature::ALL {
            if f.is_differential() {
                out.set(f, -self.get(f));
            }
        }
        out
    }

    /// Values for the schema's columns, in the schema's order.
    pub fn project(&self, schema: &FeatureSchema) -> Vec<f64> {
        schema.features().iter().map(|f| self.get(*f)).collect()
    }
}

/// The ordered set of features a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    features: Vec<Feature>,
}

impl FeatureSchema {
    pub fn canonical() -> Self {
        Self {
            version: SCHEMA_VERSION,
            features: Feature::ALL.to_vec(),
        }
    }

    pub fn new(version: u32, features: Vec<Feature>) -> Result<Self> {
        if version != SCHEMA_VERSION {
            return Err(WinProbError::SchemaMismatch(format!(
                "schema version {version} does not match current version {SCHEMA_VERSION}"
            )));
        }
        if features.is_empty() {
            return Err(WinProbError::SchemaMismatch("empty feature list".to_string()));
        }
        let mut seen = HashSet::new();
        for f in &features {
            if !seen.insert(*f) {
                return Err(WinProbError::SchemaMismatch(format!(
                    "duplicate feature `{}`",
                    f.name()
                )));
            }
        }
        Ok(Self { version, features })
    }

    pub fn from_names<S: AsRef<str>>(version: u32, names: &[S]) -> Result<Self> {
        let mut features = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let f = Feature::from_name(name).ok_or_else(|| {
                WinProbError::SchemaMismatch(format!("unknown feature `{name}`"))
            })?;
            features.push(f);
        }
        Self::new(version, features)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

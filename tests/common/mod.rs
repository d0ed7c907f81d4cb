#![allow(dead_code)]

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rift_winprob::features::FeatureVector;
use rift_winprob::model::LogisticWinModel;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rift_winprob_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Games where the side ahead on gold, kills and towers usually wins.
pub fn synthetic_games(n: usize, seed: u64) -> (Vec<FeatureVector>, Vec<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let gold: f64 = rng.gen_range(-10_000.0..10_000.0);
        let kills = (gold / 600.0 + rng.gen_range(-4.0..4.0)).round();
        let towers = (gold / 2500.0 + rng.gen_range(-1.5..1.5)).round();
        let row = FeatureVector {
            kill_diff: kills,
            assist_diff: (kills * 1.5 + rng.gen_range(-5.0..5.0)).round(),
            gold_diff: gold,
            cs_diff: (gold / 40.0 + rng.gen_range(-30.0..30.0)).round(),
            ward_score_diff: rng.gen_range(-20.0..20.0),
            level_diff: (gold / 2000.0 + rng.gen_range(-2.0..2.0)).round(),
            dragon_diff: rng.gen_range(-2..=2) as f64,
            baron_diff: rng.gen_range(-1..=1) as f64,
            tower_diff: towers,
            herald_diff: rng.gen_range(-1..=1) as f64,
            inhib_diff: rng.gen_range(-1..=1) as f64,
            game_duration: rng.gen_range(900.0..2400.0),
        };
        let z = gold / 2500.0 + 0.15 * kills + 0.3 * towers;
        let p = 1.0 / (1.0 + (-z).exp());
        rows.push(row);
        labels.push(rng.gen_bool(p));
    }
    (rows, labels)
}

pub fn trained_model(path: PathBuf) -> LogisticWinModel {
    let (rows, labels) = synthetic_games(800, 7);
    let mut model = LogisticWinModel::new(path);
    model.train(&rows, &labels).unwrap();
    model
}

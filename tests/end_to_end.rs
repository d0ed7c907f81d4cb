mod common;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rift_winprob::WinProbError;
use rift_winprob::calibration::CalibrationConfig;
use rift_winprob::config::AppConfig;
use rift_winprob::features::{FeatureVector, REPRESENTATIVE_DURATION_SECS};
use rift_winprob::live::LiveFeatureExtractor;
use rift_winprob::model::LogisticWinModel;
use rift_winprob::predictor::WinPredictor;
use rift_winprob::telemetry::{ActivePlayer, LiveSnapshot};

fn predictor() -> WinPredictor {
    let model = common::trained_model(common::temp_path("e2e_unused.json"));
    WinPredictor::from_config(model, &AppConfig::default()).unwrap()
}

fn snapshot() -> LiveSnapshot {
    let raw = std::fs::read_to_string(common::fixture("live_snapshot.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn zero_state_is_even() {
    let p = predictor();
    let empty = p.predict_named(&HashMap::new()).unwrap();
    assert!((empty - 0.5).abs() < 1e-12, "{empty}");
    for duration in [60.0, REPRESENTATIVE_DURATION_SECS, 2400.0] {
        let v = p.predict_features(&FeatureVector::neutral(duration)).unwrap();
        assert!((v - 0.5).abs() < 1e-12, "duration={duration} p={v}");
    }
}

#[test]
fn gold_lead_and_deficit_mirror_each_other() {
    let p = predictor();
    let ahead = p
        .predict_named(&HashMap::from([("gold_diff".to_string(), 1000.0)]))
        .unwrap();
    let behind = p
        .predict_named(&HashMap::from([("gold_diff".to_string(), -1000.0)]))
        .unwrap();
    assert!(ahead > 0.5, "{ahead}");
    assert!(behind < 0.5, "{behind}");
    assert!((ahead + behind - 1.0).abs() < 1e-9);
}

#[test]
fn symmetry_holds_for_random_states() {
    let p = predictor();
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let f = FeatureVector {
            kill_diff: rng.gen_range(-15.0..15.0),
            assist_diff: rng.gen_range(-20.0..20.0),
            gold_diff: rng.gen_range(-12_000.0..12_000.0),
            cs_diff: rng.gen_range(-200.0..200.0),
            ward_score_diff: rng.gen_range(-30.0..30.0),
            level_diff: rng.gen_range(-8.0..8.0),
            dragon_diff: rng.gen_range(-4.0..4.0),
            baron_diff: rng.gen_range(-2.0..2.0),
            tower_diff: rng.gen_range(-9.0..9.0),
            herald_diff: rng.gen_range(-2.0..2.0),
            inhib_diff: rng.gen_range(-3.0..3.0),
            game_duration: rng.gen_range(300.0..2700.0),
        };
        let a = p.predict_features(&f).unwrap();
        let b = p.predict_features(&f.negated()).unwrap();
        assert!((0.0..=1.0).contains(&a));
        assert!((a + b - 1.0).abs() < 1e-9, "a={a} b={b}");
    }
}

#[test]
fn bigger_gold_lead_never_lowers_probability() {
    let p = predictor();
    let mut prev = 0.0;
    for step in -20..=20 {
        let mut f = FeatureVector::neutral(1500.0);
        f.gold_diff = step as f64 * 500.0;
        let v = p.predict_features(&f).unwrap();
        assert!(v + 1e-12 >= prev, "gold={} p={v} prev={prev}", f.gold_diff);
        prev = v;
    }
}

#[test]
fn unknown_actor_event_does_not_move_prediction() {
    let p = predictor();
    let extractor = p.extractor().unwrap();
    let base = extractor.extract(&snapshot());
    let mut snap = snapshot();
    let mut extra = snap.events.events[2].clone();
    extra.killer_name = Some("Turret_T1_C_05_A".to_string());
    snap.events.events.push(extra);
    let out = extractor.extract(&snap);
    assert_eq!(out.uncounted_events, base.uncounted_events + 1);
    assert_eq!(
        p.predict_features(&out.features).unwrap(),
        p.predict_features(&base.features).unwrap()
    );
}

#[test]
fn opposite_observers_get_complementary_probabilities() {
    let p = predictor();
    let extractor = LiveFeatureExtractor::canonical();
    let mut snap = snapshot();
    let red = extractor.extract(&snap);
    snap.active_player = Some(ActivePlayer {
        riot_id: Some("Blue Two#NA1".to_string()),
        ..Default::default()
    });
    let blue = extractor.extract(&snap);
    assert_eq!(blue.features, red.features.negated());
    let pr = p.predict_features(&red.features).unwrap();
    let pb = p.predict_features(&blue.features).unwrap();
    assert!(pb > 0.5, "blue is ahead in the fixture: {pb}");
    assert!((pr + pb - 1.0).abs() < 1e-9);
}

#[test]
fn partial_and_noisy_input_falls_back_to_defaults() {
    let p = predictor();
    let baseline = p.predict_named(&HashMap::new()).unwrap();
    let noisy = HashMap::from([
        ("damage_share".to_string(), 12.0),
        ("gold_diff".to_string(), f64::NAN),
    ]);
    assert_eq!(p.predict_named(&noisy).unwrap(), baseline);
}

#[test]
fn untrained_model_is_unavailable() {
    let model = LogisticWinModel::new(common::temp_path("never_written.json"));
    let err = WinPredictor::from_config(model, &AppConfig::default()).unwrap_err();
    assert!(matches!(err, WinProbError::ModelUnavailable(_)));
}

#[test]
fn configured_baseline_overrides_measured_one() {
    let model = common::trained_model(common::temp_path("e2e_unused2.json"));
    let measured = model.measured_baseline().unwrap();
    let cfg = AppConfig {
        calibration_baseline: Some(0.45),
        ..AppConfig::default()
    };
    let p = WinPredictor::from_config(model.clone(), &cfg).unwrap();
    assert_eq!(p.calibration().baseline, 0.45);
    let q = WinPredictor::from_config(model.clone(), &AppConfig::default()).unwrap();
    assert_eq!(q.calibration().baseline, measured);

    let bad = CalibrationConfig::with_baseline(1.2);
    assert!(matches!(
        WinPredictor::new(model, bad),
        Err(WinProbError::InvalidConfig(_))
    ));
}

#[test]
fn artifact_round_trip_preserves_predictions() {
    let path = common::temp_path("roundtrip_model.json");
    let model = common::trained_model(path.clone());
    model.save().unwrap();

    let mut loaded = LogisticWinModel::new(&path);
    assert!(loaded.load());
    let (a, b) = (loaded.artifact().unwrap(), model.artifact().unwrap());
    assert_eq!(a.feature_names, b.feature_names);
    assert_eq!(a.schema_version, b.schema_version);

    let (rows, _) = common::synthetic_games(25, 3);
    let before = model.predict(&rows).unwrap();
    let after = loaded.predict(&rows).unwrap();
    for (x, y) in before.iter().zip(&after) {
        assert!((x - y).abs() < 1e-12);
    }
    let top = loaded.feature_weights();
    assert_eq!(top.len(), 12);
    assert!(top[0].1.abs() >= top[11].1.abs());

    std::fs::write(&path, "{not json").unwrap();
    let mut broken = LogisticWinModel::new(&path);
    assert!(!broken.load());
}

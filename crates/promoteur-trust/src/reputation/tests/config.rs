use super::common::*;

use crate::reputation::config_store::{ConfigKind, ScoreConfig, TrustScoreConfig};
use crate::reputation::trust::AdjustmentKind;
use crate::reputation::{Actor, EngineError};

fn strict_config() -> ScoreConfig {
    let mut config = TrustScoreConfig::standard();
    config.name = "strict".to_string();
    config.penalties.no_updates_month = 25.0;
    ScoreConfig::TrustScore(config)
}

#[test]
fn defaults_are_seeded_once_and_active() {
    let harness = harness();
    let configs = harness.engine.configs();

    configs.ensure_defaults(t0()).expect("second seed is a no-op");

    let documents = configs.list(None).expect("configs");
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|document| document.is_active));
    let seeds = harness
        .audit_actions()
        .iter()
        .filter(|action| action.as_str() == "config.seed")
        .count();
    assert_eq!(seeds, 2);
}

#[test]
fn activation_is_exclusive_per_kind() {
    let harness = harness();
    let configs = harness.engine.configs();
    configs
        .save(strict_config(), "admin-1", t0())
        .expect("strict saved");

    let activated = configs
        .activate(ConfigKind::TrustScore, "strict", "admin-1", t0())
        .expect("strict activated");
    assert!(activated.is_active);

    let trust_configs = configs.list(Some(ConfigKind::TrustScore)).expect("configs");
    let active: Vec<&str> = trust_configs
        .iter()
        .filter(|document| document.is_active)
        .map(|document| document.name())
        .collect();
    assert_eq!(active, vec!["strict"]);

    let lead = configs
        .get(ConfigKind::LeadScoring, "standard")
        .expect("lead config");
    assert!(lead.is_active);
}

#[test]
fn active_config_cannot_be_deleted() {
    let harness = harness();
    let configs = harness.engine.configs();
    configs
        .save(strict_config(), "admin-1", t0())
        .expect("strict saved");

    assert!(matches!(
        configs.delete(ConfigKind::TrustScore, "standard", "admin-1", t0()),
        Err(EngineError::Validation(_))
    ));

    configs
        .activate(ConfigKind::TrustScore, "strict", "admin-1", t0())
        .expect("strict activated");
    configs
        .delete(ConfigKind::TrustScore, "standard", "admin-1", t0())
        .expect("inactive config deleted");
    assert!(matches!(
        configs.get(ConfigKind::TrustScore, "standard"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn saving_the_active_config_applies_to_the_next_computation() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));
    let before = harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");
    assert_eq!(before.score, 20);

    let mut tuned = TrustScoreConfig::standard();
    tuned.penalties.no_updates_month = 20.0;
    let saved = harness
        .engine
        .configs()
        .save(ScoreConfig::TrustScore(tuned), "admin-1", t0())
        .expect("saved");
    assert!(saved.is_active);
    assert_eq!(saved.version, 3);

    let after = harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");
    assert_eq!(after.adjustment(AdjustmentKind::NoUpdatesMonth), Some(-20.0));
    assert_eq!(after.score, 15);
}

#[test]
fn zero_weights_are_rejected() {
    let harness = harness();
    let mut config = TrustScoreConfig::standard();
    config.name = "empty".to_string();
    for weight in config.weights.values_mut() {
        *weight = 0.0;
    }

    assert!(matches!(
        harness
            .engine
            .configs()
            .save(ScoreConfig::TrustScore(config), "admin-1", t0()),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn activating_an_unknown_config_is_not_found() {
    let harness = harness();

    assert!(matches!(
        harness
            .engine
            .configs()
            .activate(ConfigKind::LeadScoring, "missing", "admin-1", t0()),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn activation_is_audited_with_the_admin() {
    let harness = harness();
    harness
        .engine
        .configs()
        .save(strict_config(), "admin-7", t0())
        .expect("saved");
    harness
        .engine
        .configs()
        .activate(ConfigKind::TrustScore, "strict", "admin-7", t0())
        .expect("activated");

    let entry = harness
        .store
        .audit_log()
        .expect("audit")
        .into_iter()
        .find(|entry| entry.action == "config.activate")
        .expect("activation audited");
    assert_eq!(entry.actor, Actor::Admin("admin-7".to_string()));
    assert_eq!(entry.entity_id, "trust-score/strict");
}

#[test]
fn out_of_range_windows_and_penalties_are_rejected() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));

    let mut lookback = TrustScoreConfig::standard();
    lookback.penalties.lookback_days = 1_000_000_000_000_000;
    let mut jump_window = TrustScoreConfig::standard();
    jump_window.gaming_detection.score_jump_window_days = 0;
    let mut interval = TrustScoreConfig::standard();
    interval.gaming_detection.min_update_interval_hours = f64::INFINITY;
    let mut penalty = TrustScoreConfig::standard();
    penalty.gaming_detection.penalty = f64::NAN;

    for config in [lookback, jump_window, interval, penalty] {
        assert!(matches!(
            harness
                .engine
                .configs()
                .save(ScoreConfig::TrustScore(config), "admin-1", t0()),
            Err(EngineError::Validation(_))
        ));
    }

    let score = harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("active config untouched");
    assert_eq!(score.score, 20);
}

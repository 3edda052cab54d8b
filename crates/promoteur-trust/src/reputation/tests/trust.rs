use super::common::*;
use std::sync::Arc;

use chrono::Duration;

use crate::reputation::config_store::{
    ActiveConfigProvider, ConfigStore, TrustFactor, TrustScoreConfig,
};
use crate::reputation::domain::SnapshotId;
use crate::reputation::repository::ScoreRepository;
use crate::reputation::trust::{
    AdjustmentKind, ComplianceOverlay, GamingSignal, PromoteurActivity, TrendDirection,
    TrustInputs, TrustScoreCalculator, TrustScoreService, TrustScoreSnapshot, TrustTier,
};
use crate::reputation::{
    Actor, EngineError, InMemoryDirectory, InMemoryReputationStore, RepositoryError,
};

fn standard_calculator() -> TrustScoreCalculator {
    TrustScoreCalculator::new(Arc::new(TrustScoreConfig::standard()))
}

fn compute(
    calculator: &TrustScoreCalculator,
    activity: &PromoteurActivity,
    recent: &[TrustScoreSnapshot],
) -> crate::reputation::trust::TrustScoreOutcome {
    calculator.compute(
        TrustInputs {
            activity,
            overlay: ComplianceOverlay::default(),
            recent_snapshots: recent,
        },
        t0(),
    )
}

#[test]
fn verified_account_without_recent_updates_scores_twenty() {
    let activity = verified_activity(&promoteur("p-1"), t0());

    let outcome = compute(&standard_calculator(), &activity, &[]);

    assert_eq!(outcome.weighted_base, 35.0);
    assert_eq!(outcome.points_for(TrustFactor::KycVerification), 20.0);
    assert_eq!(outcome.points_for(TrustFactor::DocumentsComplete), 15.0);
    assert_eq!(outcome.points_for(TrustFactor::RegularUpdates), 0.0);
    assert_eq!(outcome.adjustment(AdjustmentKind::NoUpdatesMonth), Some(-15.0));
    assert_eq!(outcome.adjustment(AdjustmentKind::NoUpdatesWeek), None);
    assert!(outcome.gaming_signals.is_empty());
    assert_eq!(outcome.score, 20);
}

#[test]
fn account_that_never_published_is_measured_from_registration() {
    let mut activity = verified_activity(&promoteur("p-1"), t0());
    activity.update_timestamps.clear();
    activity.registered_at = t0() - Duration::days(10);

    let outcome = compute(&standard_calculator(), &activity, &[]);

    assert_eq!(outcome.adjustment(AdjustmentKind::NoUpdatesWeek), Some(-5.0));
    assert_eq!(outcome.score, 30);
}

#[test]
fn score_is_clamped_to_the_hundred_point_scale() {
    let calculator = standard_calculator();

    let strong = compute(&calculator, &established_activity(&promoteur("p-1"), t0()), &[]);
    assert_eq!(strong.weighted_base, 99.6);
    assert_eq!(strong.adjustment(AdjustmentKind::ConsistentUpdater), Some(5.0));
    assert_eq!(strong.adjustment(AdjustmentKind::QuickResponder), Some(5.0));
    assert_eq!(strong.score, 100);

    let mut weak = PromoteurActivity::new(promoteur("p-2"), t0() - Duration::days(90));
    weak.complaints = 40;
    let weak = compute(&calculator, &weak, &[]);
    assert_eq!(weak.score, 0);
    assert_eq!(TrustTier::for_score(weak.score), TrustTier::Restricted);
}

#[test]
fn weights_are_normalised_by_their_actual_total() {
    let mut doubled = TrustScoreConfig::standard();
    for weight in doubled.weights.values_mut() {
        *weight *= 2.0;
    }
    let activity = verified_activity(&promoteur("p-1"), t0());

    let standard = compute(&standard_calculator(), &activity, &[]);
    let scaled = compute(&TrustScoreCalculator::new(Arc::new(doubled)), &activity, &[]);

    assert_eq!(standard.weighted_base, scaled.weighted_base);
    assert_eq!(standard.score, scaled.score);
}

#[test]
fn update_burst_costs_a_single_gaming_penalty() {
    let mut activity = verified_activity(&promoteur("p-1"), t0());
    let burst_start = t0() - Duration::days(1);
    activity.update_timestamps = (0..6)
        .map(|index| burst_start + Duration::minutes(10 * index))
        .collect();

    let outcome = compute(&standard_calculator(), &activity, &[]);

    assert!(outcome
        .gaming_signals
        .iter()
        .any(|signal| matches!(signal, GamingSignal::BurstDay { updates: 6, .. })));
    assert!(outcome
        .gaming_signals
        .iter()
        .any(|signal| matches!(signal, GamingSignal::RapidSuccession { occurrences: 5 })));
    let gaming_entries = outcome
        .adjustments
        .iter()
        .filter(|entry| entry.kind == AdjustmentKind::Gaming)
        .count();
    assert_eq!(gaming_entries, 1);
    assert_eq!(outcome.adjustment(AdjustmentKind::Gaming), Some(-10.0));
}

#[test]
fn score_jump_is_measured_against_the_recent_window_only() {
    let id = promoteur("p-1");
    let activity = established_activity(&id, t0());
    let snapshot = |days_ago: i64| TrustScoreSnapshot {
        id: SnapshotId::new(format!("snap-{days_ago}")),
        promoteur_id: id.clone(),
        score: 40,
        created_at: t0() - Duration::days(days_ago),
    };
    let calculator = standard_calculator();

    let recent = compute(&calculator, &activity, &[snapshot(2)]);
    assert!(recent
        .gaming_signals
        .contains(&GamingSignal::ScoreJump { from: 40, to: 100 }));

    let stale = compute(&calculator, &activity, &[snapshot(10)]);
    assert!(stale.gaming_signals.is_empty());
}

#[test]
fn recompute_persists_score_snapshot_and_audit() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));

    let outcome = harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");

    assert_eq!(outcome.score, 20);
    assert_eq!(harness.store.trust_score(&id).expect("score"), Some(20));
    let standing = harness.engine.trust().current(&id).expect("standing");
    assert_eq!(standing.tier, TrustTier::Restricted);
    let trend = harness
        .engine
        .history()
        .trend(&id, t0() - Duration::days(1))
        .expect("trend");
    assert_eq!(trend.snapshots.len(), 1);
    assert_eq!(harness.store.draft_snapshot_count().expect("drafts"), 0);

    let audit = harness
        .store
        .audit_log()
        .expect("audit")
        .into_iter()
        .find(|entry| entry.action == "trust_score.recompute")
        .expect("recompute audited");
    assert_eq!(audit.actor, Actor::System);
    assert_eq!(audit.entity_id, "p-1");
    assert!(audit.after.is_some());
}

#[test]
fn failed_score_write_discards_the_draft_snapshot() {
    let inner = Arc::new(InMemoryReputationStore::new());
    let configs = Arc::new(ConfigStore::new(Arc::clone(&inner)));
    configs.ensure_defaults(t0()).expect("seed configs");
    let provider: Arc<dyn ActiveConfigProvider> = configs;
    let id = promoteur("p-1");
    let directory = Arc::new(InMemoryDirectory::with_activities([verified_activity(
        &id,
        t0(),
    )]));
    let flaky = Arc::new(FlakyScoreStore {
        inner: Arc::clone(&inner),
    });
    let service = TrustScoreService::new(flaky, directory, provider);

    match service.recompute(&id, t0()) {
        Err(EngineError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository failure, got {other:?}"),
    }

    assert_eq!(inner.draft_snapshot_count().expect("drafts"), 0);
    assert!(inner
        .snapshots_since(&id, t0() - Duration::days(1))
        .expect("history")
        .is_empty());
    assert_eq!(inner.trust_score(&id).expect("score"), None);
}

#[test]
fn recompute_without_active_config_is_a_configuration_error() {
    let harness = unseeded_harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));

    assert!(matches!(
        harness.engine.trust().recompute(&id, t0()),
        Err(EngineError::Configuration(_))
    ));
}

#[test]
fn unknown_promoteur_is_not_found() {
    let harness = harness();

    assert!(matches!(
        harness.engine.trust().recompute(&promoteur("ghost"), t0()),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn missed_lead_slas_in_the_lookback_are_penalised() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));
    for reference in ["lead-a", "lead-b"] {
        harness
            .engine
            .sanctions()
            .record_violation(sla_breach(&id, reference), t0() - Duration::days(5))
            .expect("violation");
    }

    let outcome = harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");

    assert_eq!(outcome.adjustment(AdjustmentKind::MissedSla), Some(-10.0));
    assert_eq!(outcome.score, 10);
}

#[test]
fn history_reports_the_direction_of_change() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));
    harness
        .engine
        .trust()
        .recompute(&id, t0() - Duration::days(2))
        .expect("first recompute");

    harness.directory.upsert(established_activity(&id, t0()));
    harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("second recompute");

    let trend = harness
        .engine
        .history()
        .trend(&id, t0() - Duration::days(7))
        .expect("trend");
    assert_eq!(trend.snapshots.len(), 2);
    assert_eq!(trend.delta, Some(80));
    assert_eq!(trend.direction, TrendDirection::Rising);

    let later = harness
        .engine
        .history()
        .trend(&id, t0() - Duration::days(1))
        .expect("trend");
    assert_eq!(later.delta, None);
    assert_eq!(later.direction, TrendDirection::Flat);
}

#[test]
fn eligibility_uses_the_project_type_threshold() {
    let harness = harness();
    let id = promoteur("p-1");
    harness.directory.upsert(verified_activity(&id, t0()));
    harness
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");

    let villa = harness
        .engine
        .trust()
        .eligibility(&id, "Villa")
        .expect("eligibility");
    assert_eq!(villa.minimum, 60);
    assert!(!villa.eligible);

    let unlisted = harness
        .engine
        .trust()
        .eligibility(&id, "kiosque")
        .expect("eligibility");
    assert_eq!(unlisted.minimum, 0);
    assert!(unlisted.eligible);
}

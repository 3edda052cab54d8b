use super::common::*;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::reputation::cases::CasePriority;
use crate::reputation::repository::{CheckpointStore, SanctionRepository, ScoreRepository};
use crate::reputation::sanctions::{SanctionType, ViolationKind};
use crate::reputation::{
    BatchError, BatchRunner, EngineError, InMemoryReputationStore, Job, JobReport,
};

fn runner(
    store: &Arc<InMemoryReputationStore>,
    budget: StdDuration,
) -> BatchRunner<InMemoryReputationStore> {
    BatchRunner::new(Arc::clone(store), 2, budget)
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn recalculation_covers_every_promoteur() {
    let harness = harness();
    for id in ["p-1", "p-2", "p-3"] {
        harness
            .directory
            .upsert(verified_activity(&promoteur(id), t0()));
    }

    let report = harness
        .engine
        .recalculate_all_scores(t0())
        .await
        .expect("recalculation");

    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 3);
    assert!(report.completed);
    assert_eq!(report.checkpoint, None);
    assert_eq!(
        harness.store.trust_score(&promoteur("p-2")).expect("score"),
        Some(20)
    );
}

#[tokio::test]
async fn recalculation_without_active_config_aborts() {
    let harness = unseeded_harness();
    harness
        .directory
        .upsert(verified_activity(&promoteur("p-1"), t0()));

    assert!(matches!(
        harness.engine.recalculate_all_scores(t0()).await,
        Err(BatchError::Engine(EngineError::Configuration(_)))
    ));
}

#[tokio::test]
async fn failing_unit_is_recorded_and_the_run_continues() {
    let store = Arc::new(InMemoryReputationStore::new());
    let runner = runner(&store, StdDuration::from_secs(60));

    let report = runner
        .run("test.failures", ids(&["a", "b", "c"]), |id| {
            if id == "b" {
                Err(EngineError::validation("corrupt record"))
            } else {
                Ok(())
            }
        })
        .await
        .expect("run");

    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "b");
    assert!(report.completed);
}

#[tokio::test]
async fn exhausted_budget_leaves_the_run_incomplete() {
    let store = Arc::new(InMemoryReputationStore::new());
    let runner = runner(&store, StdDuration::ZERO);

    let report = runner
        .run("test.budget", ids(&["a", "b"]), |_| Ok(()))
        .await
        .expect("run");

    assert!(!report.completed);
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn run_resumes_after_the_stored_checkpoint() {
    let store = Arc::new(InMemoryReputationStore::new());
    store
        .save_checkpoint("test.resume", "b")
        .expect("checkpoint saved");
    let runner = runner(&store, StdDuration::from_secs(60));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let report = runner
        .run("test.resume", ids(&["d", "a", "c", "b"]), move |id| {
            recorder.lock().expect("recorder").push(id);
            Ok(())
        })
        .await
        .expect("run");

    let mut seen = seen.lock().expect("seen").clone();
    seen.sort();
    assert_eq!(seen, vec!["c".to_string(), "d".to_string()]);
    assert_eq!(report.processed, 2);
    assert_eq!(store.checkpoint("test.resume").expect("checkpoint"), None);
}

#[tokio::test]
async fn a_job_cannot_run_twice_at_once() {
    let store = Arc::new(InMemoryReputationStore::new());
    let runner = runner(&store, StdDuration::from_secs(60));
    let _held = runner.exclusive("test.busy").expect("first holder");

    assert!(matches!(
        runner.run("test.busy", ids(&["a"]), |_| Ok(())).await,
        Err(BatchError::AlreadyRunning(job)) if job == "test.busy"
    ));
}

#[tokio::test]
async fn sla_sweep_turns_a_late_lead_into_one_violation() {
    let harness = harness();
    let id = promoteur("p-1");
    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&id), t0())
        .expect("lead stored");

    let report = harness
        .engine
        .trigger_sla_monitoring(t0() + Duration::hours(3))
        .await
        .expect("sweep");
    assert_eq!(report.leads.succeeded, 1);

    let settled = harness.engine.leads().get(&lead.id).expect("lead");
    assert_eq!(settled.response_sla_met, Some(false));
    let violations = harness
        .store
        .violations_since(&id, ViolationKind::SlaBreach, t0())
        .expect("violations");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].reference, lead.id.to_string());
    assert_eq!(harness.count_template("lead_sla_breached"), 1);

    harness
        .engine
        .trigger_sla_monitoring(t0() + Duration::hours(4))
        .await
        .expect("second sweep");
    let violations = harness
        .store
        .violations_since(&id, ViolationKind::SlaBreach, t0())
        .expect("violations");
    assert_eq!(violations.len(), 1);
    assert_eq!(harness.count_template("lead_sla_breached"), 1);
}

#[tokio::test]
async fn answered_lead_settles_as_met() {
    let harness = harness();
    let id = promoteur("p-1");
    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&id), t0())
        .expect("lead stored");
    harness
        .engine
        .leads()
        .record_response(&lead.id, t0() + Duration::hours(1))
        .expect("response");

    harness
        .engine
        .trigger_sla_monitoring(t0() + Duration::hours(3))
        .await
        .expect("sweep");

    let settled = harness.engine.leads().get(&lead.id).expect("lead");
    assert_eq!(settled.response_sla_met, Some(true));
    assert!(harness
        .store
        .violations_since(&id, ViolationKind::SlaBreach, t0())
        .expect("violations")
        .is_empty());
    assert_eq!(harness.count_template("lead_sla_breached"), 0);
}

#[tokio::test]
async fn overdue_case_is_flagged_once() {
    let harness = harness();
    let case = harness
        .engine
        .cases()
        .create(new_case(&promoteur("p-1"), CasePriority::High), t0())
        .expect("case");

    harness
        .engine
        .trigger_sla_monitoring(t0() + Duration::hours(23))
        .await
        .expect("early sweep");
    assert_eq!(harness.count_template("case_sla_breached"), 0);

    for hours in [25, 26] {
        harness
            .engine
            .trigger_sla_monitoring(t0() + Duration::hours(hours))
            .await
            .expect("sweep");
    }

    assert!(harness.engine.cases().get(&case.id).expect("case").sla_breached);
    assert_eq!(harness.count_template("case_sla_breached"), 1);
}

#[tokio::test]
async fn overdue_appeal_is_signalled_once_per_level() {
    let harness = harness();
    let id = promoteur("p-1");
    let sanction = harness
        .engine
        .apply_sanction(
            reported_sanction(&id, SanctionType::TemporarySuspension, Some(7)),
            t0(),
        )
        .expect("sanction");
    let appeal = harness
        .engine
        .appeals()
        .submit(sanction_appeal(&id, &sanction.id), t0())
        .expect("appeal");

    for hours in [73, 74] {
        harness
            .engine
            .trigger_sla_monitoring(t0() + Duration::hours(hours))
            .await
            .expect("sweep");
    }

    assert_eq!(harness.count_template("appeal_overdue"), 1);
    let stored = harness.engine.appeals().get(&appeal.id).expect("appeal");
    assert_eq!(stored.overdue_signalled_level, Some(1));
}

#[tokio::test]
async fn run_job_dispatches_by_name() {
    let harness = harness();

    let report = harness
        .engine
        .run_job(Job::ExpirySweep, t0())
        .await
        .expect("expiry sweep");

    match report {
        JobReport::Batch(batch) => {
            assert!(batch.completed);
            assert_eq!(batch.processed, 0);
        }
        other => panic!("expected a batch report, got {other:?}"),
    }
}

#[test]
fn job_names_parse_case_insensitively() {
    assert_eq!(Job::parse("scores"), Some(Job::RecalculateScores));
    assert_eq!(Job::parse(" SLA "), Some(Job::SlaMonitoring));
    assert_eq!(Job::parse("Expiry"), Some(Job::ExpirySweep));
    assert_eq!(Job::parse("reindex"), None);
}

use super::common::*;

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration;

use crate::reputation::cases::{CasePriority, CaseSanction, CaseStatus, ResolveCase};
use crate::reputation::repository::{CaseRepository, SanctionRepository};
use crate::reputation::sanctions::{SanctionOrigin, SanctionType, SeverityLevel, TargetType};
use crate::reputation::{CaseId, EngineError, RepositoryError};

fn resolution(sanction: Option<CaseSanction>) -> ResolveCase {
    ResolveCase {
        summary: "refund confirmed late, promoteur warned".to_string(),
        resolved_by: "investigator-4".to_string(),
        sanction,
    }
}

#[test]
fn case_numbers_follow_the_yearly_sequence() {
    let harness = harness();
    let id = promoteur("p-1");

    let first = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::Medium), t0())
        .expect("first case");
    let second = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::Medium), t0())
        .expect("second case");

    assert_eq!(first.case_number.to_string(), "CASE-2025-000001");
    assert_eq!(second.case_number.to_string(), "CASE-2025-000002");
    assert_eq!(second.case_number.parts(), Some((2025, 2)));
    assert_eq!(first.status, CaseStatus::New);
}

#[test]
fn sla_deadline_follows_priority() {
    let harness = harness();
    let id = promoteur("p-1");

    let critical = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::Critical), t0())
        .expect("critical case");
    let low = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::Low), t0())
        .expect("low case");

    assert_eq!(critical.sla_deadline, t0() + Duration::hours(4));
    assert_eq!(low.sla_deadline, t0() + Duration::hours(168));
    let verdict = harness
        .engine
        .cases()
        .sla(&critical.id, t0() + Duration::hours(5))
        .expect("verdict");
    assert!(verdict.breached);
}

#[test]
fn case_moves_through_its_lifecycle() {
    let harness = harness();
    let cases = harness.engine.cases();
    let case = cases
        .create(new_case(&promoteur("p-1"), CasePriority::High), t0())
        .expect("case");

    let assigned = cases
        .assign(&case.id, "investigator-4", t0() + Duration::hours(1))
        .expect("assigned");
    assert_eq!(assigned.status, CaseStatus::InProgress);
    assert_eq!(assigned.assigned_to.as_deref(), Some("investigator-4"));

    let waiting = cases
        .request_info(&case.id, "investigator-4", t0() + Duration::hours(2))
        .expect("awaiting info");
    assert_eq!(waiting.status, CaseStatus::AwaitingInfo);

    let resumed = cases
        .resume(&case.id, "investigator-4", t0() + Duration::hours(3))
        .expect("resumed");
    assert_eq!(resumed.status, CaseStatus::InProgress);

    let noted = cases
        .add_note(&case.id, "investigator-4", "bank statement received", t0() + Duration::hours(4))
        .expect("note added");
    assert_eq!(noted.investigation_notes.len(), 1);

    let resolved = harness
        .engine
        .resolve_case(&case.id, resolution(None), t0() + Duration::hours(5))
        .expect("resolved");
    assert_eq!(resolved.status, CaseStatus::Resolved);
    assert!(resolved.resolution.is_some());

    assert!(matches!(
        cases.close(&case.id, "admin-1", t0() + Duration::hours(6)),
        Err(EngineError::InvalidTransition { .. })
    ));
    assert!(matches!(
        cases.add_note(&case.id, "admin-1", "late remark", t0() + Duration::hours(6)),
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[test]
fn new_case_cannot_be_resolved_directly() {
    let harness = harness();
    let case = harness
        .engine
        .cases()
        .create(new_case(&promoteur("p-1"), CasePriority::Low), t0())
        .expect("case");

    assert!(matches!(
        harness
            .engine
            .resolve_case(&case.id, resolution(None), t0() + Duration::hours(1)),
        Err(EngineError::InvalidTransition { .. })
    ));

    let closed = harness
        .engine
        .cases()
        .close(&case.id, "admin-1", t0() + Duration::hours(1))
        .expect("new cases can be closed");
    assert_eq!(closed.closed_at, Some(t0() + Duration::hours(1)));
}

#[test]
fn escalation_unassigns_and_records_the_reason() {
    let harness = harness();
    let cases = harness.engine.cases();
    let case = cases
        .create(new_case(&promoteur("p-1"), CasePriority::High), t0())
        .expect("case");
    cases
        .assign(&case.id, "investigator-4", t0() + Duration::hours(1))
        .expect("assigned");

    let escalated = cases
        .escalate(&case.id, "admin-1", "possible fraud ring", t0() + Duration::hours(2))
        .expect("escalated");

    assert_eq!(escalated.status, CaseStatus::Escalated);
    assert_eq!(escalated.assigned_to, None);
    assert!(escalated
        .investigation_notes
        .iter()
        .any(|note| note.text.contains("possible fraud ring")));

    let reassigned = cases
        .assign(&case.id, "senior-1", t0() + Duration::hours(3))
        .expect("reassigned");
    assert_eq!(reassigned.status, CaseStatus::InProgress);
}

#[test]
fn empty_inputs_are_rejected() {
    let harness = harness();
    let cases = harness.engine.cases();
    let mut anonymous = new_case(&promoteur("p-1"), CasePriority::Low);
    anonymous.reporter = "  ".to_string();
    assert!(matches!(
        cases.create(anonymous, t0()),
        Err(EngineError::Validation(_))
    ));

    let case = cases
        .create(new_case(&promoteur("p-1"), CasePriority::Low), t0())
        .expect("case");
    assert!(matches!(
        cases.add_note(&case.id, "admin-1", "", t0()),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn resolving_with_a_sanction_links_it_to_the_case() {
    let harness = harness();
    let id = promoteur("p-1");
    let case = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::High), t0())
        .expect("case");
    harness
        .engine
        .cases()
        .assign(&case.id, "investigator-4", t0() + Duration::hours(1))
        .expect("assigned");

    let resolved = harness
        .engine
        .resolve_case(
            &case.id,
            resolution(Some(CaseSanction {
                sanction_type: SanctionType::Warning,
                target_type: TargetType::Promoteur,
                target_id: None,
                reason: "refund withheld for three weeks".to_string(),
                duration_days: Some(14),
            })),
            t0() + Duration::hours(2),
        )
        .expect("resolved");

    let sanction_id = resolved
        .resolution
        .and_then(|resolution| resolution.sanction_id)
        .expect("sanction linked");
    let sanction = harness.engine.sanctions().get(&sanction_id).expect("sanction");
    assert_eq!(
        sanction.origin,
        SanctionOrigin::Case {
            case_id: case.id.clone()
        }
    );
    assert_eq!(sanction.target_id, "p-1");
    assert!(sanction.manual);

    let stored = harness
        .store
        .stored_standing(&id)
        .expect("standing")
        .expect("projection written");
    assert_eq!(stored.level, SeverityLevel::Warning);
}

#[test]
fn duplicate_case_number_is_refused_by_the_store() {
    let harness = harness();
    let case = harness
        .engine
        .cases()
        .create(new_case(&promoteur("p-1"), CasePriority::Low), t0())
        .expect("case");
    let mut copy = case.clone();
    copy.id = CaseId::new("case-copy");

    assert!(matches!(
        harness.store.insert_case(copy),
        Err(RepositoryError::Conflict)
    ));
}

#[test]
fn racing_resolutions_issue_a_single_sanction() {
    let harness = harness();
    let id = promoteur("p-1");
    let case = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::High), t0())
        .expect("case");
    harness
        .engine
        .cases()
        .assign(&case.id, "investigator-4", t0() + Duration::hours(1))
        .expect("assigned");

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&harness.engine);
            let barrier = Arc::clone(&barrier);
            let case_id = case.id.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.resolve_case(
                    &case_id,
                    resolution(Some(CaseSanction {
                        sanction_type: SanctionType::Warning,
                        target_type: TargetType::Promoteur,
                        target_id: None,
                        reason: "refund withheld for three weeks".to_string(),
                        duration_days: Some(30),
                    })),
                    t0() + Duration::hours(2),
                )
            })
        })
        .collect();
    let outcomes: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker finished"))
        .collect();

    let resolved: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .collect();
    assert_eq!(resolved.len(), 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(EngineError::InvalidTransition { .. } | EngineError::ConcurrencyConflict { .. })
    )));

    let sanctions = harness.store.sanctions_for(&id).expect("sanctions");
    assert_eq!(sanctions.len(), 1);
    let linked = resolved[0]
        .resolution
        .as_ref()
        .and_then(|resolution| resolution.sanction_id.clone())
        .expect("sanction linked");
    assert_eq!(sanctions[0].id, linked);
    assert_eq!(harness.count_template("sanction_applied"), 1);
}

#[test]
fn stale_case_resolution_writes_nothing() {
    let harness = harness();
    let id = promoteur("p-1");
    let case = harness
        .engine
        .cases()
        .create(new_case(&id, CasePriority::Low), t0())
        .expect("case");
    let assigned = harness
        .engine
        .cases()
        .assign(&case.id, "investigator-4", t0() + Duration::hours(1))
        .expect("assigned");

    let mut next = assigned.clone();
    next.status = CaseStatus::Resolved;
    let sanction = harness
        .engine
        .sanctions()
        .prepare_manual(
            reported_sanction(&id, SanctionType::Warning, Some(10)),
            t0() + Duration::hours(2),
        )
        .expect("prepared");

    assert!(matches!(
        harness
            .store
            .commit_case_resolution(next, case.version, Some(sanction)),
        Err(RepositoryError::VersionMismatch { .. })
    ));
    assert!(harness.store.sanctions_for(&id).expect("sanctions").is_empty());
    let stored = harness.engine.cases().get(&case.id).expect("case");
    assert_eq!(stored.status, CaseStatus::InProgress);
}

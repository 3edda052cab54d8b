use super::common::*;
use std::sync::Arc;

use chrono::Duration;

use crate::reputation::config_store::LeadScoringConfig;
use crate::reputation::leads::{
    FinancingType, LeadGrade, LeadScoringEngine, LeadSource, Timeframe,
};
use crate::reputation::EngineError;

fn standard_engine() -> LeadScoringEngine {
    LeadScoringEngine::new(Arc::new(LeadScoringConfig::standard()))
}

#[test]
fn complete_cash_referral_lead_grades_a_with_two_hour_window() {
    let harness = harness();

    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&promoteur("p-1")), t0())
        .expect("lead stored");

    assert_eq!(lead.grade, LeadGrade::A);
    assert_eq!(lead.sla_hours, 2);
    assert_eq!(lead.composite_score, 100.0);
    assert_eq!(lead.details.budget_match, 100);
    assert_eq!(lead.details.timeline_match, 100);
    assert_eq!(lead.details.engagement_level, 100);
    assert_eq!(lead.details.profile_completeness, 100);
    assert!(lead.awaiting_sla_verdict());
    assert!(harness.audit_actions().contains(&"lead.scored".to_string()));
}

#[test]
fn boundary_composite_takes_the_higher_grade() {
    let engine = standard_engine();

    assert_eq!(engine.grade_for(80.0), LeadGrade::A);
    assert_eq!(engine.grade_for(79.99), LeadGrade::B);
    assert_eq!(engine.grade_for(60.0), LeadGrade::B);
    assert_eq!(engine.grade_for(40.0), LeadGrade::C);
    assert_eq!(engine.grade_for(39.99), LeadGrade::D);
    assert_eq!(engine.grade_for(0.0), LeadGrade::D);
}

#[test]
fn missing_scoring_inputs_are_rejected() {
    let mut submission = lead_submission(&promoteur("p-1"));
    submission.budget = None;

    assert!(matches!(
        standard_engine().score(&submission),
        Err(EngineError::Validation(message)) if message.contains("budget")
    ));
}

#[test]
fn project_without_price_is_rejected() {
    let mut submission = lead_submission(&promoteur("p-1"));
    submission.project.price_from = 0;

    assert!(matches!(
        standard_engine().score(&submission),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn budget_outside_the_range_scores_by_deviation() {
    let engine = standard_engine();
    let mut submission = lead_submission(&promoteur("p-1"));

    submission.budget = Some(60_000_000);
    let slightly_over = engine.score(&submission).expect("score");
    assert_eq!(slightly_over.details.budget_match, 80);

    submission.budget = Some(20_000_000);
    let far_below = engine.score(&submission).expect("score");
    assert_eq!(far_below.details.budget_match, 20);
}

#[test]
fn short_message_counts_as_partial_engagement() {
    let mut submission = lead_submission(&promoteur("p-1"));
    submission.contact.message = Some("Bonjour, dispo ?".to_string());

    let score = standard_engine().score(&submission).expect("score");

    assert_eq!(score.details.engagement_level, 75);
    assert_eq!(score.details.profile_completeness, 100);
}

#[test]
fn weak_lead_falls_to_grade_d_with_long_window() {
    let mut submission = lead_submission(&promoteur("p-1"));
    submission.budget = Some(10_000_000);
    submission.timeframe = Some(Timeframe::Exploring);
    submission.financing = Some(FinancingType::Undecided);
    submission.source = LeadSource::Other;
    submission.contact.whatsapp = None;
    submission.contact.interested_typology = None;
    submission.contact.preferred_contact_time = None;
    submission.contact.city = None;
    submission.contact.message = None;

    let score = standard_engine().score(&submission).expect("score");

    assert_eq!(score.grade, LeadGrade::D);
    assert_eq!(score.sla_hours, 48);
}

#[test]
fn first_response_time_is_kept() {
    let harness = harness();
    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&promoteur("p-1")), t0())
        .expect("lead stored");

    harness
        .engine
        .leads()
        .record_response(&lead.id, t0() + Duration::hours(1))
        .expect("first response");
    let again = harness
        .engine
        .leads()
        .record_response(&lead.id, t0() + Duration::hours(3))
        .expect("second response");

    assert_eq!(again.first_response_at, Some(t0() + Duration::hours(1)));
    let verdict = harness
        .engine
        .leads()
        .sla(&lead.id, t0() + Duration::hours(30))
        .expect("verdict");
    assert!(!verdict.breached);
    assert_eq!(verdict.hours_elapsed, 1.0);
}

#[test]
fn response_before_creation_is_rejected() {
    let harness = harness();
    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&promoteur("p-1")), t0())
        .expect("lead stored");

    assert!(matches!(
        harness
            .engine
            .leads()
            .record_response(&lead.id, t0() - Duration::minutes(5)),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn unanswered_lead_breaches_once_its_window_passes() {
    let harness = harness();
    let lead = harness
        .engine
        .leads()
        .submit(lead_submission(&promoteur("p-1")), t0())
        .expect("lead stored");

    let on_time = harness
        .engine
        .leads()
        .sla(&lead.id, t0() + Duration::hours(2))
        .expect("verdict");
    assert!(!on_time.breached);

    let late = harness
        .engine
        .leads()
        .sla(&lead.id, t0() + Duration::hours(3))
        .expect("verdict");
    assert!(late.breached);
    assert_eq!(late.hours_elapsed, 3.0);
    assert_eq!(late.hours_allowed, 2.0);
}

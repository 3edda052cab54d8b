//! End-to-end scenarios for the reputation engine.
//!
//! Each scenario drives the public engine facade over the in-memory store: scoring a
//! promoteur, grading a lead, escalating SLA breaches into sanctions and overturning a
//! suspension on appeal.

mod common {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use promoteur_trust::reputation::leads::{
        FinancingType, LeadContact, LeadSource, LeadSubmission, ProjectPricing, Timeframe,
    };
    use promoteur_trust::reputation::trust::{DocumentStats, KycStatus, PromoteurActivity};
    use promoteur_trust::reputation::{
        BatchRunner, CompliancePolicy, InMemoryDirectory, InMemoryReputationStore, ProjectId,
        PromoteurId, RecordingNotifier, ReputationEngine,
    };

    pub(super) type Engine =
        ReputationEngine<InMemoryReputationStore, InMemoryDirectory, RecordingNotifier>;

    pub(super) struct World {
        pub(super) engine: Arc<Engine>,
        pub(super) directory: Arc<InMemoryDirectory>,
        pub(super) notifier: Arc<RecordingNotifier>,
    }

    impl World {
        pub(super) fn sent(&self, template: &str) -> usize {
            self.notifier
                .templates()
                .iter()
                .filter(|sent| sent.as_str() == template)
                .count()
        }
    }

    pub(super) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0)
            .single()
            .expect("valid instant")
    }

    pub(super) fn world() -> World {
        let store = Arc::new(InMemoryReputationStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let batch = BatchRunner::new(Arc::clone(&store), 4, StdDuration::from_secs(30));
        let engine = Arc::new(ReputationEngine::new(
            store,
            Arc::clone(&directory),
            Arc::clone(&notifier),
            CompliancePolicy::default(),
            batch,
        ));
        engine
            .configs()
            .ensure_defaults(t0())
            .expect("default configs");
        World {
            engine,
            directory,
            notifier,
        }
    }

    /// KYC verified, every document accepted, nothing published for 40 days.
    pub(super) fn dormant_promoteur(id: &PromoteurId) -> PromoteurActivity {
        let mut activity = PromoteurActivity::new(id.clone(), t0() - Duration::days(75));
        activity.kyc_status = KycStatus::Verified;
        activity.documents = DocumentStats {
            total: 6,
            verified: 6,
            rejected: 0,
        };
        activity.update_timestamps = vec![t0() - Duration::days(40)];
        activity
    }

    pub(super) fn cash_referral(promoteur: &PromoteurId) -> LeadSubmission {
        LeadSubmission {
            promoteur_id: promoteur.clone(),
            project: ProjectPricing {
                project_id: ProjectId::new("proj-ngor"),
                price_from: 80_000_000,
                price_to: Some(95_000_000),
            },
            budget: Some(90_000_000),
            timeframe: Some(Timeframe::Immediate),
            financing: Some(FinancingType::Cash),
            source: LeadSource::Referral,
            contact: LeadContact {
                full_name: "Moussa Diop".to_string(),
                email: "moussa.diop@example.com".to_string(),
                phone: "+221771234567".to_string(),
                whatsapp: Some("+221771234567".to_string()),
                interested_typology: Some("villa F5".to_string()),
                preferred_contact_time: Some("morning".to_string()),
                city: Some("Thies".to_string()),
                message: Some(
                    "Nous cherchons une villa livrable avant la rentree, paiement comptant."
                        .to_string(),
                ),
            },
        }
    }
}

use chrono::Duration;

use common::*;
use promoteur_trust::reputation::appeals::{
    AppealDecision, AppealStatus, AppealSubmission, AppealType, DecisionOutcome, OriginalAction,
    ResolveAppealCommand,
};
use promoteur_trust::reputation::config_store::{ConfigKind, ScoreConfig, TrustScoreConfig};
use promoteur_trust::reputation::leads::LeadGrade;
use promoteur_trust::reputation::sanctions::{
    ManualSanctionRequest, SanctionOrigin, SanctionType, SeverityLevel, TargetType,
};
use promoteur_trust::reputation::trust::AdjustmentKind;
use promoteur_trust::reputation::PromoteurId;

#[test]
fn dormant_verified_promoteur_scores_twenty() {
    let world = world();
    let id = PromoteurId::new("prom-dormant");
    world.directory.upsert(dormant_promoteur(&id));

    let outcome = world
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");

    assert_eq!(outcome.weighted_base, 35.0);
    assert_eq!(outcome.adjustment(AdjustmentKind::NoUpdatesMonth), Some(-15.0));
    assert_eq!(outcome.score, 20);
    let standing = world.engine.trust().current(&id).expect("stored score");
    assert_eq!(standing.score, 20);
}

#[test]
fn cash_referral_lead_is_grade_a_with_two_hour_sla() {
    let world = world();

    let lead = world
        .engine
        .leads()
        .submit(cash_referral(&PromoteurId::new("prom-1")), t0())
        .expect("lead");

    assert_eq!(lead.grade, LeadGrade::A);
    assert_eq!(lead.sla_hours, 2);
    assert_eq!(lead.response_sla_met, None);
}

#[tokio::test]
async fn repeated_sla_breaches_escalate_to_a_temporary_suspension() {
    let world = world();
    let id = PromoteurId::new("prom-slow");
    for offset in 0..3 {
        world
            .engine
            .leads()
            .submit(cash_referral(&id), t0() + Duration::hours(offset))
            .expect("lead");
    }

    let sweep_at = t0() + Duration::hours(10);
    let report = world
        .engine
        .trigger_sla_monitoring(sweep_at)
        .await
        .expect("sla sweep");
    assert!(report.leads.completed);

    let sanctions = world.engine.sanctions().list_for(&id).expect("sanctions");
    assert_eq!(sanctions.len(), 2);
    assert!(sanctions
        .iter()
        .any(|sanction| sanction.sanction_type == SanctionType::Warning));
    let suspension = sanctions
        .iter()
        .find(|sanction| sanction.sanction_type == SanctionType::TemporarySuspension)
        .expect("suspension issued");
    assert_eq!(suspension.end_date, Some(sweep_at + Duration::days(7)));

    let standing = world
        .engine
        .sanctions()
        .standing(&id, sweep_at)
        .expect("standing");
    assert_eq!(standing.level, SeverityLevel::TemporarySuspension);
    assert_eq!(world.sent("lead_sla_breached"), 3);
    assert_eq!(world.sent("sanction_applied"), 2);
}

#[test]
fn escalated_appeal_approved_at_level_two_revokes_the_suspension() {
    let world = world();
    let id = PromoteurId::new("prom-appeal");
    world.directory.upsert(dormant_promoteur(&id));
    let suspension = world
        .engine
        .apply_sanction(
            ManualSanctionRequest {
                promoteur_id: id.clone(),
                target_type: TargetType::Promoteur,
                target_id: id.to_string(),
                sanction_type: SanctionType::TemporarySuspension,
                reason: "unanswered buyer complaints".to_string(),
                duration_days: Some(7),
                origin: SanctionOrigin::Report {
                    report_id: "report-301".to_string(),
                },
                admin_id: "admin-9".to_string(),
            },
            t0(),
        )
        .expect("suspension");

    let appeals = world.engine.appeals();
    let appeal = appeals
        .submit(
            AppealSubmission {
                promoteur_id: id.clone(),
                appeal_type: AppealType::Sanction,
                original_action: OriginalAction {
                    sanction_id: Some(suspension.id.clone()),
                    description: "seven day suspension".to_string(),
                },
                reason: "complaints were answered by phone".to_string(),
            },
            t0(),
        )
        .expect("appeal");
    assert_eq!(appeal.deadline, t0() + Duration::hours(72));

    let escalated_at = t0() + Duration::hours(50);
    let escalated = appeals
        .escalate(&appeal.id, "call logs need a senior review", "admin-9", escalated_at)
        .expect("escalated");
    assert_eq!(escalated.level, 2);
    appeals
        .assign(&appeal.id, "senior-3", escalated_at + Duration::hours(1))
        .expect("assigned");

    let decided_at = t0() + Duration::hours(100);
    let resolution = world
        .engine
        .resolve_appeal(
            ResolveAppealCommand::new(
                appeal.id.clone(),
                AppealDecision {
                    outcome: DecisionOutcome::Approved,
                    explanation: "call logs confirm timely answers".to_string(),
                    new_action: None,
                    decided_by: "senior-3".to_string(),
                },
            ),
            decided_at,
        )
        .expect("resolved");

    assert_eq!(resolution.appeal.status, AppealStatus::Approved);
    assert_eq!(resolution.appeal.resolved_at, Some(decided_at));
    let windows: Vec<Duration> = resolution
        .appeal
        .deadline_history
        .iter()
        .map(|window| window.deadline - window.opened_at)
        .collect();
    assert_eq!(windows, vec![Duration::hours(72), Duration::days(7)]);

    let revoked = world
        .engine
        .sanctions()
        .get(&suspension.id)
        .expect("sanction");
    assert!(revoked.revoked);
    assert_eq!(revoked.revoked_at, Some(decided_at));
    let standing = world
        .engine
        .sanctions()
        .standing(&id, decided_at)
        .expect("standing");
    assert_eq!(standing.level, SeverityLevel::None);
}

#[test]
fn activating_a_config_deactivates_its_sibling() {
    let world = world();
    let configs = world.engine.configs();
    let mut lenient = TrustScoreConfig::standard();
    lenient.name = "lenient".to_string();
    lenient.penalties.no_updates_month = 5.0;
    configs
        .save(ScoreConfig::TrustScore(lenient), "admin-1", t0())
        .expect("saved");

    configs
        .activate(ConfigKind::TrustScore, "lenient", "admin-1", t0())
        .expect("activated");

    let standard = configs
        .get(ConfigKind::TrustScore, "standard")
        .expect("standard");
    assert!(!standard.is_active);
    let id = PromoteurId::new("prom-dormant");
    world.directory.upsert(dormant_promoteur(&id));
    let outcome = world
        .engine
        .trust()
        .recompute(&id, t0())
        .expect("recompute");
    assert_eq!(outcome.score, 30);
}

use crate::infra::parse_instant;
use chrono::{DateTime, Duration, Utc};
use clap::{Args, ValueEnum};
use promoteur_trust::error::AppError;
use promoteur_trust::reputation::appeals::{
    AppealDecision, AppealSubmission, AppealType, DecisionOutcome, OriginalAction,
    ResolveAppealCommand,
};
use promoteur_trust::reputation::config_store::{
    LeadScoringConfig, ScoreConfig, TrustScoreConfig,
};
use promoteur_trust::reputation::leads::{
    FinancingType, LeadContact, LeadSource, LeadSubmission, ProjectPricing, Timeframe,
};
use promoteur_trust::reputation::sanctions::{
    ManualSanctionRequest, SanctionOrigin, SanctionType, TargetType,
};
use promoteur_trust::reputation::trust::{DocumentStats, KycStatus, PromoteurActivity};
use promoteur_trust::reputation::{
    BatchRunner, CompliancePolicy, InMemoryDirectory, InMemoryReputationStore, ProjectId,
    PromoteurId, RecordingNotifier, ReputationEngine,
};
use std::sync::Arc;
use std::time::Duration as StdDuration;

type DemoEngine = ReputationEngine<InMemoryReputationStore, InMemoryDirectory, RecordingNotifier>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Scenario {
    Score,
    Lead,
    Escalation,
    Appeal,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run a single scenario instead of all four
    #[arg(long, value_enum)]
    pub(crate) scenario: Option<Scenario>,
    /// Reference instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
}

struct Demo {
    engine: DemoEngine,
    directory: Arc<InMemoryDirectory>,
    notifier: Arc<RecordingNotifier>,
    t0: DateTime<Utc>,
}

impl Demo {
    fn new(t0: DateTime<Utc>) -> Result<Self, AppError> {
        let store = Arc::new(InMemoryReputationStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let batch = BatchRunner::new(Arc::clone(&store), 4, StdDuration::from_secs(30));
        let engine = ReputationEngine::new(
            store,
            Arc::clone(&directory),
            Arc::clone(&notifier),
            CompliancePolicy::default(),
            batch,
        );
        engine.configs().ensure_defaults(t0)?;
        Ok(Self {
            engine,
            directory,
            notifier,
            t0,
        })
    }

    fn print_notifications(&self, since: usize) -> usize {
        let sent = self.notifier.sent();
        for notification in sent.iter().skip(since) {
            println!(
                "  notify {} <- {}",
                notification.recipient_id, notification.template
            );
        }
        sent.len()
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { scenario, at } = args;
    let t0 = at.unwrap_or_else(Utc::now);
    let scenarios = match scenario {
        Some(one) => vec![one],
        None => vec![
            Scenario::Score,
            Scenario::Lead,
            Scenario::Escalation,
            Scenario::Appeal,
        ],
    };

    println!("Promoteur trust demo (T0 = {})", t0.to_rfc3339());
    for scenario in scenarios {
        let demo = Demo::new(t0)?;
        match scenario {
            Scenario::Score => score_scenario(&demo)?,
            Scenario::Lead => lead_scenario(&demo)?,
            Scenario::Escalation => escalation_scenario(&demo).await?,
            Scenario::Appeal => appeal_scenario(&demo)?,
        }
    }
    Ok(())
}

pub(crate) fn print_default_configs() -> Result<(), AppError> {
    let defaults = [
        ScoreConfig::TrustScore(TrustScoreConfig::standard()),
        ScoreConfig::LeadScoring(LeadScoringConfig::standard()),
    ];
    serde_json::to_writer_pretty(std::io::stdout().lock(), &defaults)
        .map_err(std::io::Error::from)?;
    println!();
    Ok(())
}

fn score_scenario(demo: &Demo) -> Result<(), AppError> {
    println!("\n1. Verified promoteur with no update for 40 days");
    let id = PromoteurId::new("prom-keur-massar");
    let mut activity = PromoteurActivity::new(id.clone(), demo.t0 - Duration::days(60));
    activity.kyc_status = KycStatus::Verified;
    activity.documents = DocumentStats {
        total: 4,
        verified: 4,
        rejected: 0,
    };
    activity.update_timestamps = vec![demo.t0 - Duration::days(40)];
    demo.directory.upsert(activity);

    let outcome = demo.engine.trust().recompute(&id, demo.t0)?;
    println!("- weighted base {:.1}", outcome.weighted_base);
    for adjustment in &outcome.adjustments {
        println!("  {:?}: {:+.1}", adjustment.kind, adjustment.points);
    }
    println!(
        "- trust score {} ({:?})",
        outcome.score,
        demo.engine.trust().current(&id)?.tier
    );
    Ok(())
}

fn lead_submission(promoteur: &PromoteurId) -> LeadSubmission {
    LeadSubmission {
        promoteur_id: promoteur.clone(),
        project: ProjectPricing {
            project_id: ProjectId::new("proj-saly-residence"),
            price_from: 45_000_000,
            price_to: Some(55_000_000),
        },
        budget: Some(50_000_000),
        timeframe: Some(Timeframe::Immediate),
        financing: Some(FinancingType::Cash),
        source: LeadSource::Referral,
        contact: LeadContact {
            full_name: "Fatou Sow".to_string(),
            email: "fatou.sow@example.com".to_string(),
            phone: "+221760000000".to_string(),
            whatsapp: Some("+221760000000".to_string()),
            interested_typology: Some("F3".to_string()),
            preferred_contact_time: Some("afternoon".to_string()),
            city: Some("Saly".to_string()),
            message: Some(
                "Bonjour, je voudrais reserver un F3 et connaitre les frais de notaire.".to_string(),
            ),
        },
    }
}

fn lead_scenario(demo: &Demo) -> Result<(), AppError> {
    println!("\n2. Cash referral lead inside the price range");
    let lead = demo
        .engine
        .leads()
        .submit(lead_submission(&PromoteurId::new("prom-saly")), demo.t0)?;
    println!(
        "- lead {} graded {} (composite {:.1}), first response due within {}h",
        lead.id, lead.grade, lead.composite_score, lead.sla_hours
    );
    println!(
        "  budget {} | timeline {} | engagement {} | profile {}",
        lead.details.budget_match,
        lead.details.timeline_match,
        lead.details.engagement_level,
        lead.details.profile_completeness
    );
    Ok(())
}

async fn escalation_scenario(demo: &Demo) -> Result<(), AppError> {
    println!("\n3. Three unanswered grade-A leads");
    let id = PromoteurId::new("prom-slow-reply");
    for offset in 0..3 {
        demo.engine
            .leads()
            .submit(lead_submission(&id), demo.t0 + Duration::hours(offset))?;
    }

    let sweep_at = demo.t0 + Duration::hours(6);
    let report = demo.engine.trigger_sla_monitoring(sweep_at).await?;
    println!(
        "- SLA sweep settled {} promoteur(s), {} failure(s)",
        report.leads.succeeded,
        report.leads.failures.len()
    );
    for sanction in demo.engine.sanctions().list_for(&id)? {
        let until = sanction
            .end_date
            .map(|end| end.to_rfc3339())
            .unwrap_or_else(|| "indefinitely".to_string());
        println!("  {} until {}", sanction.sanction_type, until);
    }
    let standing = demo.engine.sanctions().standing(&id, sweep_at)?;
    println!("- effective level {:?}", standing.level);
    demo.print_notifications(0);
    Ok(())
}

fn appeal_scenario(demo: &Demo) -> Result<(), AppError> {
    println!("\n4. Suspension overturned after a level-2 review");
    let id = PromoteurId::new("prom-ngaparou");
    let suspension = demo.engine.apply_sanction(
        ManualSanctionRequest {
            promoteur_id: id.clone(),
            target_type: TargetType::Promoteur,
            target_id: id.to_string(),
            sanction_type: SanctionType::TemporarySuspension,
            reason: "buyer reported missing title deed".to_string(),
            duration_days: Some(7),
            origin: SanctionOrigin::Report {
                report_id: "report-demo-1".to_string(),
            },
            admin_id: "admin-demo".to_string(),
        },
        demo.t0,
    )?;
    let seen = demo.print_notifications(0);

    let appeals = demo.engine.appeals();
    let appeal = appeals.submit(
        AppealSubmission {
            promoteur_id: id.clone(),
            appeal_type: AppealType::Sanction,
            original_action: OriginalAction {
                sanction_id: Some(suspension.id.clone()),
                description: "seven day suspension".to_string(),
            },
            reason: "the title deed was uploaded before the report".to_string(),
        },
        demo.t0,
    )?;
    println!(
        "- appeal {} due {}",
        appeal.id,
        appeal.deadline.to_rfc3339()
    );

    let escalated = appeals.escalate(
        &appeal.id,
        "document timestamps need a senior check",
        "admin-demo",
        demo.t0 + Duration::hours(50),
    )?;
    println!(
        "- escalated to level {}, now due {}",
        escalated.level,
        escalated.deadline.to_rfc3339()
    );
    appeals.assign(&appeal.id, "senior-demo", demo.t0 + Duration::hours(51))?;

    let resolution = demo.engine.resolve_appeal(
        ResolveAppealCommand::new(
            appeal.id.clone(),
            AppealDecision {
                outcome: DecisionOutcome::Approved,
                explanation: "upload log predates the report".to_string(),
                new_action: None,
                decided_by: "senior-demo".to_string(),
            },
        ),
        demo.t0 + Duration::hours(100),
    )?;
    println!("- appeal {}", resolution.appeal.status);
    if let Some(revoked) = &resolution.revoked {
        println!(
            "  sanction {} revoked by {}",
            revoked.id,
            revoked.revoked_by.as_deref().unwrap_or("unknown")
        );
    }
    for window in &resolution.appeal.deadline_history {
        println!(
            "  level {} window {}h",
            window.level,
            (window.deadline - window.opened_at).num_hours()
        );
    }
    demo.print_notifications(seen);
    Ok(())
}

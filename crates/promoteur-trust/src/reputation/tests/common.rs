use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::reputation::appeals::domain::Appeal;
use crate::reputation::appeals::{
    AppealDecision, AppealSubmission, AppealType, DecisionOutcome, OriginalAction,
};
use crate::reputation::cases::{CasePriority, CaseSubject, CaseType, NewCase};
use crate::reputation::domain::{AppealId, SanctionId, SnapshotId};
use crate::reputation::leads::{
    FinancingType, LeadContact, LeadSource, LeadSubmission, ProjectPricing, Timeframe,
};
use crate::reputation::repository::{
    AppealRepository, CommittedResolution, SanctionChange, SanctionRepository, ScoreRepository,
};
use crate::reputation::router::ADMIN_HEADER;
use crate::reputation::sanctions::{
    ManualSanctionRequest, Sanction, SanctionOrigin, SanctionType, StoredStanding, TargetType,
    Violation, ViolationKind, ViolationReport,
};
use crate::reputation::trust::{
    DocumentStats, KycStatus, ProjectStats, PromoteurActivity, ResponseStats, ReviewStats,
    TrustScoreSnapshot,
};
use crate::reputation::{
    AuditEntry, AuditSink, BatchRunner, CompliancePolicy, InMemoryDirectory,
    InMemoryReputationStore, ProjectId, PromoteurId, RecordingNotifier, ReputationEngine,
    RepositoryError,
};

pub(super) type TestEngine =
    ReputationEngine<InMemoryReputationStore, InMemoryDirectory, RecordingNotifier>;

/// Monday 3 March 2025, 09:00 UTC.
pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn promoteur(id: &str) -> PromoteurId {
    PromoteurId::new(id)
}

/// KYC and every document verified, registered 60 days ago, last update 40 days ago.
pub(super) fn verified_activity(id: &PromoteurId, now: DateTime<Utc>) -> PromoteurActivity {
    let mut activity = PromoteurActivity::new(id.clone(), now - Duration::days(60));
    activity.kyc_status = KycStatus::Verified;
    activity.documents = DocumentStats {
        total: 4,
        verified: 4,
        rejected: 0,
    };
    activity.update_timestamps = vec![now - Duration::days(40)];
    activity
}

/// Long-standing account doing everything right, weekly updates included.
pub(super) fn established_activity(id: &PromoteurId, now: DateTime<Utc>) -> PromoteurActivity {
    PromoteurActivity {
        promoteur_id: id.clone(),
        registered_at: now - Duration::days(400),
        kyc_status: KycStatus::Verified,
        documents: DocumentStats {
            total: 5,
            verified: 5,
            rejected: 0,
        },
        update_timestamps: (0..5)
            .map(|week| now - Duration::days(1 + 7 * week))
            .collect(),
        responses: ResponseStats {
            average_hours: Some(1.5),
            on_time_streak: 12,
        },
        projects: ProjectStats {
            total: 4,
            completed: 4,
        },
        reviews: ReviewStats {
            count: 20,
            average_rating: 4.8,
        },
        active_badges: 5,
        has_verified_badge: true,
        profile_complete: true,
        complaints: 0,
    }
}

pub(super) struct Harness {
    pub(super) engine: Arc<TestEngine>,
    pub(super) store: Arc<InMemoryReputationStore>,
    pub(super) directory: Arc<InMemoryDirectory>,
    pub(super) notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub(super) fn count_template(&self, template: &str) -> usize {
        self.notifier
            .templates()
            .iter()
            .filter(|sent| sent.as_str() == template)
            .count()
    }

    pub(super) fn audit_actions(&self) -> Vec<String> {
        self.store
            .audit_log()
            .expect("audit log")
            .into_iter()
            .map(|entry| entry.action)
            .collect()
    }
}

pub(super) fn unseeded_harness_with(
    policy: CompliancePolicy,
    concurrency: usize,
    budget: StdDuration,
) -> Harness {
    let store = Arc::new(InMemoryReputationStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let batch = BatchRunner::new(Arc::clone(&store), concurrency, budget);
    let engine = Arc::new(ReputationEngine::new(
        Arc::clone(&store),
        Arc::clone(&directory),
        Arc::clone(&notifier),
        policy,
        batch,
    ));
    Harness {
        engine,
        store,
        directory,
        notifier,
    }
}

pub(super) fn unseeded_harness() -> Harness {
    unseeded_harness_with(CompliancePolicy::default(), 4, StdDuration::from_secs(60))
}

pub(super) fn harness() -> Harness {
    let harness = unseeded_harness();
    harness
        .engine
        .configs()
        .ensure_defaults(t0())
        .expect("seed default configs");
    harness
}

/// Referral lead paying cash inside the price range with every contact field filled.
pub(super) fn lead_submission(promoteur: &PromoteurId) -> LeadSubmission {
    LeadSubmission {
        promoteur_id: promoteur.clone(),
        project: ProjectPricing {
            project_id: ProjectId::new("proj-almadies"),
            price_from: 45_000_000,
            price_to: Some(55_000_000),
        },
        budget: Some(50_000_000),
        timeframe: Some(Timeframe::Immediate),
        financing: Some(FinancingType::Cash),
        source: LeadSource::Referral,
        contact: LeadContact {
            full_name: "Awa Ndiaye".to_string(),
            email: "awa.ndiaye@example.com".to_string(),
            phone: "+221770000001".to_string(),
            whatsapp: Some("+221770000001".to_string()),
            interested_typology: Some("F4".to_string()),
            preferred_contact_time: Some("evening".to_string()),
            city: Some("Dakar".to_string()),
            message: Some(
                "Je souhaite visiter le F4 ce week-end et discuter du calendrier de paiement."
                    .to_string(),
            ),
        },
    }
}

pub(super) fn sla_breach(promoteur: &PromoteurId, reference: &str) -> ViolationReport {
    ViolationReport {
        promoteur_id: promoteur.clone(),
        kind: ViolationKind::SlaBreach,
        reference: reference.to_string(),
    }
}

pub(super) fn reported_sanction(
    promoteur: &PromoteurId,
    sanction_type: SanctionType,
    duration_days: Option<i64>,
) -> ManualSanctionRequest {
    ManualSanctionRequest {
        promoteur_id: promoteur.clone(),
        target_type: TargetType::Promoteur,
        target_id: promoteur.to_string(),
        sanction_type,
        reason: "misleading delivery dates".to_string(),
        duration_days,
        origin: SanctionOrigin::Report {
            report_id: "report-77".to_string(),
        },
        admin_id: "admin-1".to_string(),
    }
}

pub(super) fn new_case(promoteur: &PromoteurId, priority: CasePriority) -> NewCase {
    NewCase {
        case_type: CaseType::Complaint,
        priority,
        reporter: "buyer-12".to_string(),
        subject: CaseSubject {
            promoteur_id: Some(promoteur.clone()),
            summary: "deposit not refunded after cancellation".to_string(),
        },
    }
}

pub(super) fn sanction_appeal(promoteur: &PromoteurId, sanction: &SanctionId) -> AppealSubmission {
    AppealSubmission {
        promoteur_id: promoteur.clone(),
        appeal_type: AppealType::Sanction,
        original_action: OriginalAction {
            sanction_id: Some(sanction.clone()),
            description: "temporary suspension".to_string(),
        },
        reason: "the late responses were caused by a platform outage".to_string(),
    }
}

pub(super) fn decision(outcome: DecisionOutcome) -> AppealDecision {
    AppealDecision {
        outcome,
        explanation: "outage confirmed by the operations log".to_string(),
        new_action: None,
        decided_by: "reviewer-2".to_string(),
    }
}

pub(super) fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ADMIN_HEADER, "admin-1");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Delegates to the in-memory store but refuses every current-score write.
pub(super) struct FlakyScoreStore {
    pub(super) inner: Arc<InMemoryReputationStore>,
}

impl ScoreRepository for FlakyScoreStore {
    fn trust_score(&self, promoteur: &PromoteurId) -> Result<Option<u8>, RepositoryError> {
        self.inner.trust_score(promoteur)
    }

    fn update_trust_score(
        &self,
        _promoteur: &PromoteurId,
        _score: u8,
    ) -> Result<Option<u8>, RepositoryError> {
        Err(RepositoryError::Unavailable("score table offline".to_string()))
    }

    fn insert_draft_snapshot(&self, snapshot: TrustScoreSnapshot) -> Result<(), RepositoryError> {
        self.inner.insert_draft_snapshot(snapshot)
    }

    fn commit_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError> {
        self.inner.commit_snapshot(id)
    }

    fn discard_draft_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError> {
        self.inner.discard_draft_snapshot(id)
    }

    fn snapshots_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreSnapshot>, RepositoryError> {
        self.inner.snapshots_since(promoteur, since)
    }
}

impl SanctionRepository for FlakyScoreStore {
    fn insert_sanction(&self, sanction: Sanction) -> Result<Sanction, RepositoryError> {
        self.inner.insert_sanction(sanction)
    }

    fn fetch_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, RepositoryError> {
        self.inner.fetch_sanction(id)
    }

    fn update_sanction(
        &self,
        sanction: Sanction,
        expected_version: u64,
    ) -> Result<Sanction, RepositoryError> {
        self.inner.update_sanction(sanction, expected_version)
    }

    fn sanctions_for(&self, promoteur: &PromoteurId) -> Result<Vec<Sanction>, RepositoryError> {
        self.inner.sanctions_for(promoteur)
    }

    fn sanctioned_promoteurs(&self) -> Result<Vec<PromoteurId>, RepositoryError> {
        self.inner.sanctioned_promoteurs()
    }

    fn record_violation(&self, violation: Violation) -> Result<(), RepositoryError> {
        SanctionRepository::record_violation(self.inner.as_ref(), violation)
    }

    fn violations_since(
        &self,
        promoteur: &PromoteurId,
        kind: ViolationKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Violation>, RepositoryError> {
        self.inner.violations_since(promoteur, kind, since)
    }

    fn stored_standing(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Option<StoredStanding>, RepositoryError> {
        self.inner.stored_standing(promoteur)
    }

    fn save_standing(
        &self,
        promoteur: &PromoteurId,
        standing: StoredStanding,
    ) -> Result<(), RepositoryError> {
        self.inner.save_standing(promoteur, standing)
    }
}

impl AppealRepository for FlakyScoreStore {
    fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal, RepositoryError> {
        self.inner.insert_appeal(appeal)
    }

    fn fetch_appeal(&self, id: &AppealId) -> Result<Option<Appeal>, RepositoryError> {
        self.inner.fetch_appeal(id)
    }

    fn update_appeal(
        &self,
        appeal: Appeal,
        expected_version: u64,
    ) -> Result<Appeal, RepositoryError> {
        self.inner.update_appeal(appeal, expected_version)
    }

    fn open_appeals(&self) -> Result<Vec<Appeal>, RepositoryError> {
        self.inner.open_appeals()
    }

    fn open_appeal_for_sanction(
        &self,
        sanction: &SanctionId,
    ) -> Result<Option<Appeal>, RepositoryError> {
        self.inner.open_appeal_for_sanction(sanction)
    }

    fn upheld_appeals_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        self.inner.upheld_appeals_since(promoteur, since)
    }

    fn commit_resolution(
        &self,
        appeal: Appeal,
        expected_version: u64,
        change: SanctionChange,
    ) -> Result<CommittedResolution, RepositoryError> {
        self.inner.commit_resolution(appeal, expected_version, change)
    }
}

impl AuditSink for FlakyScoreStore {
    fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.inner.append_audit(entry)
    }

    fn audit_trail(
        &self,
        entity: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        self.inner.audit_trail(entity, entity_id)
    }
}

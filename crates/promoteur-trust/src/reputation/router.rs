use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use super::appeals::{AppealDecision, AppealSubmission, ResolveAppealCommand};
use super::cases::{NewCase, ResolveCase};
use super::config_store::{ConfigKind, ScoreConfig};
use super::domain::{AppealId, CaseId, LeadId, PromoteurId, SanctionId};
use super::engine::ReputationEngine;
use super::error::{EngineError, RepositoryError};
use super::jobs::Job;
use super::leads::LeadSubmission;
use super::repository::{NotificationDispatcher, PromoteurDirectory, ReputationStore};
use super::sanctions::{ManualSanctionRequest, ViolationKind, ViolationReport};
use crate::error::AppError;

/// Header carrying the acting administrator on mutating routes.
pub const ADMIN_HEADER: &str = "x-admin-id";

type Engine<S, D, N> = Arc<ReputationEngine<S, D, N>>;
type ApiResult = Result<Response, AppError>;

#[derive(Debug, Deserialize)]
pub(crate) struct RecordResponse {
    #[serde(default)]
    pub(crate) responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportViolation {
    pub(crate) kind: ViolationKind,
    pub(crate) reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reason {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignInvestigator {
    pub(crate) investigator: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Note {
    pub(crate) text: String,
}

/// Admin surface over configs, leads, scores, sanctions, appeals, cases and jobs.
pub fn reputation_router<S, D, N>(engine: Engine<S, D, N>) -> Router
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/reputation/configs",
            get(list_configs::<S, D, N>).post(save_config::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/configs/:kind",
            get(list_configs_of_kind::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/configs/:kind/:name",
            get(get_config::<S, D, N>).delete(delete_config::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/configs/:kind/:name/activate",
            post(activate_config::<S, D, N>),
        )
        .route("/api/v1/reputation/leads", post(submit_lead::<S, D, N>))
        .route("/api/v1/reputation/leads/:lead_id", get(get_lead::<S, D, N>))
        .route(
            "/api/v1/reputation/leads/:lead_id/response",
            post(record_lead_response::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/leads/:lead_id/sla",
            get(lead_sla::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/trust-score",
            get(current_score::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/trust-score/recompute",
            post(recompute_score::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/trust-score/history/:days",
            get(score_history::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/eligibility/:project_type",
            get(eligibility::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/sanctions",
            get(list_sanctions::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/standing",
            get(standing::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/promoteurs/:promoteur_id/violations",
            post(report_violation::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/sanctions",
            post(apply_sanction::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/sanctions/:sanction_id",
            get(get_sanction::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/sanctions/:sanction_id/revoke",
            post(revoke_sanction::<S, D, N>),
        )
        .route("/api/v1/reputation/appeals", post(submit_appeal::<S, D, N>))
        .route(
            "/api/v1/reputation/appeals/:appeal_id",
            get(get_appeal::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/appeals/:appeal_id/assign",
            post(assign_appeal::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/appeals/:appeal_id/escalate",
            post(escalate_appeal::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/appeals/:appeal_id/resolve",
            post(resolve_appeal::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/appeals/:appeal_id/deadline",
            get(appeal_deadline::<S, D, N>),
        )
        .route("/api/v1/reputation/cases", post(create_case::<S, D, N>))
        .route("/api/v1/reputation/cases/:case_id", get(get_case::<S, D, N>))
        .route(
            "/api/v1/reputation/cases/:case_id/assign",
            post(assign_case::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/notes",
            post(add_case_note::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/request-info",
            post(request_case_info::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/resume",
            post(resume_case::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/escalate",
            post(escalate_case::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/resolve",
            post(resolve_case::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/close",
            post(close_case::<S, D, N>),
        )
        .route(
            "/api/v1/reputation/cases/:case_id/sla",
            get(case_sla::<S, D, N>),
        )
        .route("/api/v1/reputation/jobs/:job", post(run_job::<S, D, N>))
        .with_state(engine)
}

fn admin_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(ADMIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            EngineError::validation(format!("missing {ADMIN_HEADER} header")).into()
        })
}

fn config_kind(raw: &str) -> Result<ConfigKind, AppError> {
    ConfigKind::parse(raw).ok_or_else(|| {
        EngineError::validation(format!("unknown config kind '{raw}'")).into()
    })
}

fn ok<T: serde::Serialize>(value: T) -> ApiResult {
    Ok((StatusCode::OK, Json(value)).into_response())
}

fn created<T: serde::Serialize>(value: T) -> ApiResult {
    Ok((StatusCode::CREATED, Json(value)).into_response())
}

/// Engine calls take store locks and may sleep through a conflict backoff, so they run on
/// the blocking pool instead of an async worker.
pub(crate) async fn blocking<S, D, N, T>(
    engine: &Engine<S, D, N>,
    work: impl FnOnce(&ReputationEngine<S, D, N>) -> Result<T, EngineError> + Send + 'static,
) -> Result<T, AppError>
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(engine);
    let outcome = tokio::task::spawn_blocking(move || work(&engine))
        .await
        .map_err(|join| {
            EngineError::from(RepositoryError::Unavailable(format!(
                "engine task aborted: {join}"
            )))
        })?;
    Ok(outcome?)
}

/// Start of a history window `days` back from `now`.
pub(crate) fn history_start(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, EngineError> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| {
            EngineError::validation(format!("a {days} day history window is out of range"))
        })
}

pub(crate) async fn list_configs<S, D, N>(State(engine): State<Engine<S, D, N>>) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, |engine| engine.configs().list(None)).await?)
}

pub(crate) async fn list_configs_of_kind<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(kind): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let kind = config_kind(&kind)?;
    ok(blocking(&engine, move |engine| engine.configs().list(Some(kind))).await?)
}

pub(crate) async fn get_config<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let kind = config_kind(&kind)?;
    ok(blocking(&engine, move |engine| engine.configs().get(kind, &name)).await?)
}

pub(crate) async fn save_config<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Json(config): Json<ScoreConfig>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine.configs().save(config, &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn activate_config<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    let kind = config_kind(&kind)?;
    ok(blocking(&engine, move |engine| {
        engine.configs().activate(kind, &name, &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn delete_config<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    let kind = config_kind(&kind)?;
    blocking(&engine, move |engine| {
        engine.configs().delete(kind, &name, &admin, Utc::now())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn submit_lead<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Json(submission): Json<LeadSubmission>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    created(blocking(&engine, move |engine| engine.leads().submit(submission, Utc::now())).await?)
}

pub(crate) async fn get_lead<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(lead_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| engine.leads().get(&LeadId::new(lead_id))).await?)
}

pub(crate) async fn record_lead_response<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(lead_id): Path<String>,
    Json(request): Json<RecordResponse>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let at = request.responded_at.unwrap_or_else(Utc::now);
    ok(blocking(&engine, move |engine| {
        engine.leads().record_response(&LeadId::new(lead_id), at)
    })
    .await?)
}

pub(crate) async fn lead_sla<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(lead_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine.leads().sla(&LeadId::new(lead_id), Utc::now())
    })
    .await?)
}

pub(crate) async fn current_score<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(promoteur_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine.trust().current(&PromoteurId::new(promoteur_id))
    })
    .await?)
}

pub(crate) async fn recompute_score<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(promoteur_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine
            .trust()
            .recompute(&PromoteurId::new(promoteur_id), Utc::now())
    })
    .await?)
}

pub(crate) async fn score_history<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path((promoteur_id, days)): Path<(String, u32)>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let since = history_start(Utc::now(), days)?;
    ok(blocking(&engine, move |engine| {
        engine.history().trend(&PromoteurId::new(promoteur_id), since)
    })
    .await?)
}

pub(crate) async fn eligibility<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path((promoteur_id, project_type)): Path<(String, String)>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine
            .trust()
            .eligibility(&PromoteurId::new(promoteur_id), &project_type)
    })
    .await?)
}

pub(crate) async fn list_sanctions<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(promoteur_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let now = Utc::now();
    let sanctions: Vec<_> = blocking(&engine, move |engine| {
        engine.sanctions().list_for(&PromoteurId::new(promoteur_id))
    })
    .await?
    .into_iter()
    .map(|sanction| {
        let status = sanction.status(now);
        json!({ "sanction": sanction, "status": status })
    })
    .collect();
    ok(sanctions)
}

pub(crate) async fn standing<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(promoteur_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine
            .sanctions()
            .standing(&PromoteurId::new(promoteur_id), Utc::now())
    })
    .await?)
}

pub(crate) async fn report_violation<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(promoteur_id): Path<String>,
    Json(request): Json<ReportViolation>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    if request.reference.trim().is_empty() {
        return Err(EngineError::validation("a violation requires a reference").into());
    }
    let report = ViolationReport {
        promoteur_id: PromoteurId::new(promoteur_id),
        kind: request.kind,
        reference: request.reference,
    };
    created(blocking(&engine, move |engine| engine.record_violation(report, Utc::now())).await?)
}

pub(crate) async fn apply_sanction<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Json(request): Json<ManualSanctionRequest>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    created(blocking(&engine, move |engine| engine.apply_sanction(request, Utc::now())).await?)
}

pub(crate) async fn get_sanction<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(sanction_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let sanction = blocking(&engine, move |engine| {
        engine.sanctions().get(&SanctionId::new(sanction_id))
    })
    .await?;
    let status = sanction.status(Utc::now());
    ok(json!({ "sanction": sanction, "status": status }))
}

pub(crate) async fn revoke_sanction<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(sanction_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine.revoke_sanction(&SanctionId::new(sanction_id), &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn submit_appeal<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Json(submission): Json<AppealSubmission>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    created(blocking(&engine, move |engine| engine.appeals().submit(submission, Utc::now())).await?)
}

pub(crate) async fn get_appeal<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(appeal_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| engine.appeals().get(&AppealId::new(appeal_id))).await?)
}

pub(crate) async fn assign_appeal<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(appeal_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let reviewer = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine
            .appeals()
            .assign(&AppealId::new(appeal_id), &reviewer, Utc::now())
    })
    .await?)
}

pub(crate) async fn escalate_appeal<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(appeal_id): Path<String>,
    Json(request): Json<Reason>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine.appeals().escalate(
            &AppealId::new(appeal_id),
            &request.reason,
            &admin,
            Utc::now(),
        )
    })
    .await?)
}

pub(crate) async fn resolve_appeal<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(appeal_id): Path<String>,
    Json(decision): Json<AppealDecision>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let command = ResolveAppealCommand::new(AppealId::new(appeal_id), decision);
    ok(blocking(&engine, move |engine| engine.resolve_appeal(command, Utc::now())).await?)
}

pub(crate) async fn appeal_deadline<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(appeal_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine
            .appeals()
            .deadline(&AppealId::new(appeal_id), Utc::now())
    })
    .await?)
}

pub(crate) async fn create_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Json(new_case): Json<NewCase>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    created(blocking(&engine, move |engine| engine.cases().create(new_case, Utc::now())).await?)
}

pub(crate) async fn get_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(case_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| engine.cases().get(&CaseId::new(case_id))).await?)
}

pub(crate) async fn assign_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(case_id): Path<String>,
    Json(request): Json<AssignInvestigator>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine
            .cases()
            .assign(&CaseId::new(case_id), &request.investigator, Utc::now())
    })
    .await?)
}

pub(crate) async fn add_case_note<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
    Json(note): Json<Note>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let author = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine
            .cases()
            .add_note(&CaseId::new(case_id), &author, &note.text, Utc::now())
    })
    .await?)
}

pub(crate) async fn request_case_info<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine
            .cases()
            .request_info(&CaseId::new(case_id), &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn resume_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine
            .cases()
            .resume(&CaseId::new(case_id), &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn escalate_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
    Json(request): Json<Reason>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine.cases().escalate(
            &CaseId::new(case_id),
            &admin,
            &request.reason,
            Utc::now(),
        )
    })
    .await?)
}

pub(crate) async fn resolve_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(case_id): Path<String>,
    Json(request): Json<ResolveCase>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine.resolve_case(&CaseId::new(case_id), request, Utc::now())
    })
    .await?)
}

pub(crate) async fn close_case<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    headers: HeaderMap,
    Path(case_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let admin = admin_id(&headers)?;
    ok(blocking(&engine, move |engine| {
        engine
            .cases()
            .close(&CaseId::new(case_id), &admin, Utc::now())
    })
    .await?)
}

pub(crate) async fn case_sla<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(case_id): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    ok(blocking(&engine, move |engine| {
        engine.cases().sla(&CaseId::new(case_id), Utc::now())
    })
    .await?)
}

pub(crate) async fn run_job<S, D, N>(
    State(engine): State<Engine<S, D, N>>,
    Path(job): Path<String>,
) -> ApiResult
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    let job = Job::parse(&job).ok_or_else(|| {
        AppError::from(EngineError::validation(format!("unknown job '{job}'")))
    })?;
    ok(engine.run_job(job, Utc::now()).await?)
}

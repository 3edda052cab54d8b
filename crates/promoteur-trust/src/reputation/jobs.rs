//! Scheduled jobs: score recalculation, the SLA sweep and the expiry sweep.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::batch::{BatchError, BatchReport};
use super::cases::CaseService;
use super::config_store::ActiveConfigProvider;
use super::domain::{Actor, AppealId, CaseId, PromoteurId};
use super::effects::{dispatch, Audit};
use super::engine::ReputationEngine;
use super::error::EngineError;
use super::repository::{NotificationDispatcher, PromoteurDirectory, ReputationStore};
use super::sanctions::{SanctionService, ViolationKind, ViolationReport};
use super::sla::{check_case_sla, check_lead_sla};

/// Recipient for case breaches on unassigned cases.
const COMPLIANCE_DESK: &str = "compliance-desk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    RecalculateScores,
    SlaMonitoring,
    ExpirySweep,
}

impl Job {
    pub const ALL: [Job; 3] = [Job::RecalculateScores, Job::SlaMonitoring, Job::ExpirySweep];

    /// Short name used by the CLI and the admin route.
    pub const fn name(self) -> &'static str {
        match self {
            Job::RecalculateScores => "scores",
            Job::SlaMonitoring => "sla",
            Job::ExpirySweep => "expiry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|job| job.name().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SCORES_JOB: &str = "scores.recalculate";
const SLA_JOB: &str = "sla.monitor";
const SLA_LEADS_JOB: &str = "sla.leads";
const SLA_CASES_JOB: &str = "sla.cases";
const SLA_APPEALS_JOB: &str = "sla.appeals";
const EXPIRY_JOB: &str = "sanctions.expiry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSweepReport {
    pub leads: BatchReport,
    pub cases: BatchReport,
    pub appeals: BatchReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobReport {
    Batch(BatchReport),
    Sla(SlaSweepReport),
}

fn keys<T: ToString>(ids: Vec<T>) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

impl<S, D, N> ReputationEngine<S, D, N>
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub async fn run_job(&self, job: Job, now: DateTime<Utc>) -> Result<JobReport, BatchError> {
        match job {
            Job::RecalculateScores => self.recalculate_all_scores(now).await.map(JobReport::Batch),
            Job::SlaMonitoring => self.trigger_sla_monitoring(now).await.map(JobReport::Sla),
            Job::ExpirySweep => self
                .remove_expired_restrictions(now)
                .await
                .map(JobReport::Batch),
        }
    }

    /// Recomputes every promoteur against one config snapshot. A missing active config
    /// aborts the run before any unit starts.
    pub async fn recalculate_all_scores(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, BatchError> {
        let config = self.configs.active_trust_config()?;
        let ids = keys(self.directory.promoteur_ids().map_err(EngineError::from)?);
        info!(promoteurs = ids.len(), config = %config.name, "recalculating trust scores");

        let trust = Arc::clone(&self.trust);
        self.batch
            .run(SCORES_JOB, ids, move |id| {
                trust
                    .recompute_with(Arc::clone(&config), &PromoteurId::new(id), now)
                    .map(|_| ())
            })
            .await
    }

    /// Persists lead, case and appeal deadline verdicts. Lead breaches become violations
    /// and may escalate sanctions.
    pub async fn trigger_sla_monitoring(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SlaSweepReport, BatchError> {
        let _sweep = self.batch.exclusive(SLA_JOB)?;

        let promoteurs = keys(
            self.store
                .promoteurs_with_unsettled_leads()
                .map_err(EngineError::from)?,
        );
        let store = Arc::clone(&self.store);
        let sanctions = Arc::clone(&self.sanctions);
        let notifier = Arc::clone(&self.notifier);
        let leads = self
            .batch
            .run(SLA_LEADS_JOB, promoteurs, move |id| {
                settle_leads(
                    store.as_ref(),
                    sanctions.as_ref(),
                    notifier.as_ref(),
                    &PromoteurId::new(id),
                    now,
                )
            })
            .await?;

        let open_cases = self
            .store
            .unbreached_open_cases()
            .map_err(EngineError::from)?
            .into_iter()
            .map(|case| case.id.to_string())
            .collect();
        let cases = Arc::clone(&self.cases);
        let notifier = Arc::clone(&self.notifier);
        let cases = self
            .batch
            .run(SLA_CASES_JOB, open_cases, move |id| {
                flag_case(cases.as_ref(), notifier.as_ref(), &CaseId::new(id), now)
            })
            .await?;

        let open_appeals = self
            .store
            .open_appeals()
            .map_err(EngineError::from)?
            .into_iter()
            .map(|appeal| appeal.id.to_string())
            .collect();
        let appeals = Arc::clone(&self.appeals);
        let appeals = self
            .batch
            .run(SLA_APPEALS_JOB, open_appeals, move |id| {
                appeals.mark_overdue(&AppealId::new(id), now).map(|_| ())
            })
            .await?;

        Ok(SlaSweepReport {
            leads,
            cases,
            appeals,
        })
    }

    /// Brings each sanctioned promoteur's stored standing in line with the derived one.
    /// Expiry itself is never stored on the sanction.
    pub async fn remove_expired_restrictions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, BatchError> {
        let ids = keys(
            self.store
                .sanctioned_promoteurs()
                .map_err(EngineError::from)?,
        );
        let sanctions = Arc::clone(&self.sanctions);
        self.batch
            .run(EXPIRY_JOB, ids, move |id| {
                sanctions
                    .refresh_standing(&PromoteurId::new(id), now)
                    .map(|_| ())
            })
            .await
    }
}

/// Settles every lead of one promoteur that is either answered or already late.
fn settle_leads<S, N>(
    store: &S,
    sanctions: &SanctionService<S, N>,
    notifier: &N,
    promoteur: &PromoteurId,
    now: DateTime<Utc>,
) -> Result<(), EngineError>
where
    S: ReputationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    for lead in store.leads_awaiting_verdict(promoteur)? {
        let verdict = check_lead_sla(&lead, now);
        if lead.first_response_at.is_none() && !verdict.breached {
            continue;
        }
        if !store.settle_response_sla(&lead.id, !verdict.breached)? {
            continue;
        }

        Audit::new(Actor::System, "lead.sla_verdict", "lead", &lead.id, now)
            .after(&verdict)
            .write(store)?;
        if !verdict.breached {
            continue;
        }

        info!(
            lead = %lead.id,
            promoteur = %promoteur,
            grade = %lead.grade,
            hours_elapsed = verdict.hours_elapsed,
            hours_allowed = verdict.hours_allowed,
            "lead response SLA breached"
        );
        let outcome = sanctions.record_violation(
            ViolationReport {
                promoteur_id: promoteur.clone(),
                kind: ViolationKind::SlaBreach,
                reference: lead.id.to_string(),
            },
            now,
        )?;
        if outcome.escalated_to.is_some() {
            sanctions.refresh_standing(promoteur, now)?;
        }
        dispatch(
            notifier,
            promoteur,
            "lead_sla_breached",
            json!({
                "leadId": lead.id,
                "grade": lead.grade,
                "hoursElapsed": verdict.hours_elapsed,
                "hoursAllowed": verdict.hours_allowed,
            }),
        );
    }
    Ok(())
}

fn flag_case<S, N>(
    cases: &CaseService<S, N>,
    notifier: &N,
    id: &CaseId,
    now: DateTime<Utc>,
) -> Result<(), EngineError>
where
    S: ReputationStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let case = cases.get(id)?;
    let verdict = check_case_sla(&case, now);
    if !verdict.breached || !cases.mark_breached(id, now)? {
        return Ok(());
    }
    let recipient = case
        .assigned_to
        .clone()
        .unwrap_or_else(|| COMPLIANCE_DESK.to_string());
    dispatch(
        notifier,
        recipient,
        "case_sla_breached",
        json!({
            "caseId": case.id,
            "caseNumber": case.case_number,
            "priority": case.priority,
            "slaDeadline": case.sla_deadline,
        }),
    );
    Ok(())
}

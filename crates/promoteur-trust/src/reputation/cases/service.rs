use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    CaseNumber, CaseRecord, CaseResolution, CaseStatus, InvestigationNote, NewCase,
};
use crate::reputation::domain::{next_key, Actor, CaseId};
use crate::reputation::effects::Audit;
use crate::reputation::error::{retry_on_conflict, EngineError};
use crate::reputation::policy::CaseSlaHours;
use crate::reputation::repository::{
    AuditSink, CaseNumberSequence, CaseRepository, NotificationDispatcher, SanctionRepository,
};
use crate::reputation::sanctions::{
    ManualSanctionRequest, SanctionOrigin, SanctionService, SanctionType, TargetType,
};
use crate::reputation::sla::{check_case_sla, SlaVerdict};

/// Sanction to apply when resolving a case against its subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSanction {
    pub sanction_type: SanctionType,
    pub target_type: TargetType,
    pub target_id: Option<String>,
    pub reason: String,
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveCase {
    pub summary: String,
    pub resolved_by: String,
    pub sanction: Option<CaseSanction>,
}

/// Investigation tickets with SLA deadlines per priority.
pub struct CaseService<S, N> {
    store: Arc<S>,
    sanctions: Arc<SanctionService<S, N>>,
    sla: CaseSlaHours,
}

impl<S, N> CaseService<S, N>
where
    S: CaseRepository + CaseNumberSequence + SanctionRepository + AuditSink + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, sanctions: Arc<SanctionService<S, N>>, sla: CaseSlaHours) -> Self {
        Self {
            store,
            sanctions,
            sla,
        }
    }

    /// Opens a case. The number comes from the per-year counter, never from a count.
    pub fn create(&self, new_case: NewCase, now: DateTime<Utc>) -> Result<CaseRecord, EngineError> {
        if new_case.reporter.trim().is_empty() {
            return Err(EngineError::validation("a case requires a reporter"));
        }
        if new_case.subject.summary.trim().is_empty() {
            return Err(EngineError::validation("a case requires a subject summary"));
        }

        let id = CaseId::new(next_key("case"));
        let stored = retry_on_conflict("case", &id, || {
            let sequence = self.store.next_case_sequence(now.year())?;
            let record = CaseRecord {
                id: id.clone(),
                case_number: CaseNumber::format(now.year(), sequence),
                case_type: new_case.case_type,
                priority: new_case.priority,
                reporter: new_case.reporter.clone(),
                subject: new_case.subject.clone(),
                status: CaseStatus::New,
                assigned_to: None,
                created_at: now,
                sla_deadline: now + self.sla.window_for(new_case.priority),
                sla_breached: false,
                investigation_notes: Vec::new(),
                resolution: None,
                closed_at: None,
                version: 0,
            };
            Ok(self.store.insert_case(record)?)
        })?;

        Audit::new(
            Actor::Admin(stored.reporter.clone()),
            "case.create",
            "case",
            &stored.id,
            now,
        )
        .after(&stored)
        .write(self.store.as_ref())?;
        info!(
            case = %stored.id,
            number = %stored.case_number,
            priority = ?stored.priority,
            sla_deadline = %stored.sla_deadline,
            "case opened"
        );
        Ok(stored)
    }

    /// Assigns an investigator. New or escalated cases move into progress.
    pub fn assign(
        &self,
        id: &CaseId,
        investigator: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        if investigator.trim().is_empty() {
            return Err(EngineError::validation("an investigator is required"));
        }
        self.transition(id, investigator, "case.assign", now, |case| {
            match case.status {
                CaseStatus::InProgress | CaseStatus::AwaitingInfo => {}
                status if status.can_transition_to(CaseStatus::InProgress) => {
                    case.status = CaseStatus::InProgress;
                }
                status => return Err(EngineError::invalid_transition("case", status, "assign")),
            }
            case.assigned_to = Some(investigator.to_string());
            Ok(())
        })
    }

    pub fn add_note(
        &self,
        id: &CaseId,
        author: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::validation("an investigation note cannot be empty"));
        }
        self.transition(id, author, "case.note", now, |case| {
            if case.status.is_terminal() {
                return Err(EngineError::invalid_transition("case", case.status, "annotate"));
            }
            case.investigation_notes.push(InvestigationNote {
                author: author.to_string(),
                text: text.to_string(),
                written_at: now,
            });
            Ok(())
        })
    }

    pub fn request_info(
        &self,
        id: &CaseId,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        self.move_to(id, admin, CaseStatus::AwaitingInfo, "case.request_info", now)
    }

    pub fn resume(
        &self,
        id: &CaseId,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        self.move_to(id, admin, CaseStatus::InProgress, "case.resume", now)
    }

    pub fn escalate(
        &self,
        id: &CaseId,
        admin: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::validation("escalation requires a reason"));
        }
        self.transition(id, admin, "case.escalate", now, |case| {
            if !case.status.can_transition_to(CaseStatus::Escalated) {
                return Err(EngineError::invalid_transition("case", case.status, "escalate"));
            }
            case.status = CaseStatus::Escalated;
            case.assigned_to = None;
            case.investigation_notes.push(InvestigationNote {
                author: admin.to_string(),
                text: format!("escalated: {reason}"),
                written_at: now,
            });
            Ok(())
        })
    }

    /// Resolves the case, optionally sanctioning its subject with a sanction that
    /// references the case. The case transition and the sanction commit together, so a
    /// losing concurrent resolution leaves no sanction behind.
    pub fn resolve(
        &self,
        id: &CaseId,
        request: ResolveCase,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        if request.summary.trim().is_empty() {
            return Err(EngineError::validation("a resolution requires a summary"));
        }

        let (before, after, sanction) = retry_on_conflict("case", id, || {
            let current = self.get(id)?;
            if !current.status.can_transition_to(CaseStatus::Resolved) {
                return Err(EngineError::invalid_transition("case", current.status, "resolve"));
            }
            let sanction = match &request.sanction {
                None => None,
                Some(sanction) => Some(self.sanctions.prepare_manual(
                    case_sanction_request(&current, sanction, &request.resolved_by)?,
                    now,
                )?),
            };

            let mut next = current.clone();
            next.status = CaseStatus::Resolved;
            next.resolution = Some(CaseResolution {
                summary: request.summary.clone(),
                resolved_by: request.resolved_by.clone(),
                resolved_at: now,
                sanction_id: sanction.as_ref().map(|sanction| sanction.id.clone()),
            });
            let (stored, sanction) =
                self.store
                    .commit_case_resolution(next, current.version, sanction)?;
            Ok((current, stored, sanction))
        })?;

        let actor = Actor::Admin(request.resolved_by.clone());
        Audit::new(actor.clone(), "case.resolve", "case", id, now)
            .before(&before)
            .after(&after)
            .write(self.store.as_ref())?;
        if let Some(sanction) = &sanction {
            self.sanctions.announce(sanction, actor, now)?;
        }
        info!(
            case = %id,
            from = %before.status,
            to = %after.status,
            sanction = ?sanction.as_ref().map(|sanction| &sanction.id),
            "case resolved"
        );
        Ok(after)
    }

    pub fn close(
        &self,
        id: &CaseId,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        self.transition(id, admin, "case.close", now, |case| {
            if !case.status.can_transition_to(CaseStatus::Closed) {
                return Err(EngineError::invalid_transition("case", case.status, "close"));
            }
            case.status = CaseStatus::Closed;
            case.closed_at = Some(now);
            Ok(())
        })
    }

    pub fn get(&self, id: &CaseId) -> Result<CaseRecord, EngineError> {
        self.store
            .fetch_case(id)?
            .ok_or_else(|| EngineError::not_found("case", id))
    }

    pub fn sla(&self, id: &CaseId, now: DateTime<Utc>) -> Result<SlaVerdict, EngineError> {
        Ok(check_case_sla(&self.get(id)?, now))
    }

    /// Persists a breach verdict. Returns `false` when it was already recorded or the case
    /// finished in the meantime.
    pub(crate) fn mark_breached(
        &self,
        id: &CaseId,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let (before, after) = retry_on_conflict("case", id, || {
            let current = self.get(id)?;
            if current.sla_breached || current.status.is_terminal() {
                return Ok((current, None));
            }
            let mut next = current.clone();
            next.sla_breached = true;
            let stored = self.store.update_case(next, current.version)?;
            Ok((current, Some(stored)))
        })?;

        let Some(after) = after else {
            return Ok(false);
        };
        Audit::new(Actor::System, "case.sla_breach", "case", id, now)
            .before(&before)
            .after(&after)
            .write(self.store.as_ref())?;
        info!(case = %id, number = %after.case_number, "case SLA breached");
        Ok(true)
    }

    fn move_to(
        &self,
        id: &CaseId,
        admin: &str,
        next: CaseStatus,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        self.transition(id, admin, action, now, |case| {
            if !case.status.can_transition_to(next) {
                return Err(EngineError::invalid_transition("case", case.status, action));
            }
            case.status = next;
            Ok(())
        })
    }

    fn transition(
        &self,
        id: &CaseId,
        admin: &str,
        action: &'static str,
        now: DateTime<Utc>,
        apply: impl Fn(&mut CaseRecord) -> Result<(), EngineError>,
    ) -> Result<CaseRecord, EngineError> {
        let (before, after) = retry_on_conflict("case", id, || {
            let current = self.get(id)?;
            let mut next = current.clone();
            apply(&mut next)?;
            let stored = self.store.update_case(next, current.version)?;
            Ok((current, stored))
        })?;

        Audit::new(Actor::Admin(admin.to_string()), action, "case", id, now)
            .before(&before)
            .after(&after)
            .write(self.store.as_ref())?;
        info!(case = %id, from = %before.status, to = %after.status, action, "case updated");
        Ok(after)
    }
}

fn case_sanction_request(
    case: &CaseRecord,
    sanction: &CaseSanction,
    admin: &str,
) -> Result<ManualSanctionRequest, EngineError> {
    let promoteur = case.subject.promoteur_id.clone().ok_or_else(|| {
        EngineError::validation("cannot sanction a case without a promoteur subject")
    })?;
    let target_id = sanction
        .target_id
        .clone()
        .unwrap_or_else(|| promoteur.to_string());
    Ok(ManualSanctionRequest {
        promoteur_id: promoteur,
        target_type: sanction.target_type,
        target_id,
        sanction_type: sanction.sanction_type,
        reason: sanction.reason.clone(),
        duration_days: sanction.duration_days,
        origin: SanctionOrigin::Case {
            case_id: case.id.clone(),
        },
        admin_id: admin.to_string(),
    })
}

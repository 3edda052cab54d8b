use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use super::command::ResolveAppealCommand;
use super::domain::{Appeal, AppealSubmission, AppealType};
use crate::reputation::domain::{next_key, Actor, AppealId};
use crate::reputation::effects::{dispatch, Audit};
use crate::reputation::error::{retry_on_conflict, EngineError};
use crate::reputation::policy::AppealWindows;
use crate::reputation::repository::{
    AppealRepository, AuditSink, CommittedResolution, NotificationDispatcher, SanctionRepository,
};
use crate::reputation::sla::{check_appeal_deadline, SlaVerdict};

/// Recipient for overdue signals on appeals nobody has picked up.
pub(crate) const APPEALS_DESK: &str = "appeals-desk";

/// Two-level appeal review.
pub struct AppealService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    windows: AppealWindows,
}

impl<S, N> AppealService<S, N>
where
    S: AppealRepository + SanctionRepository + AuditSink + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, windows: AppealWindows) -> Self {
        Self {
            store,
            notifier,
            windows,
        }
    }

    pub fn submit(
        &self,
        submission: AppealSubmission,
        now: DateTime<Utc>,
    ) -> Result<Appeal, EngineError> {
        if submission.reason.trim().is_empty() {
            return Err(EngineError::validation("an appeal requires a reason"));
        }

        match (&submission.appeal_type, &submission.original_action.sanction_id) {
            (AppealType::Sanction, None) => {
                return Err(EngineError::validation(
                    "a sanction appeal must reference the contested sanction",
                ))
            }
            (_, Some(sanction_id)) => {
                let sanction = self
                    .store
                    .fetch_sanction(sanction_id)?
                    .ok_or_else(|| EngineError::not_found("sanction", sanction_id))?;
                if sanction.promoteur_id != submission.promoteur_id {
                    return Err(EngineError::validation(format!(
                        "sanction {sanction_id} does not belong to {}",
                        submission.promoteur_id
                    )));
                }
                if self.store.open_appeal_for_sanction(sanction_id)?.is_some() {
                    return Err(EngineError::validation(format!(
                        "sanction {sanction_id} already has an open appeal"
                    )));
                }
            }
            (_, None) => {}
        }

        let appeal = Appeal::open(
            AppealId::new(next_key("appeal")),
            submission,
            now,
            &self.windows,
        );
        let stored = self.store.insert_appeal(appeal)?;

        Audit::new(
            Actor::Promoteur(stored.promoteur_id.clone()),
            "appeal.submit",
            "appeal",
            &stored.id,
            now,
        )
        .after(&stored)
        .write(self.store.as_ref())?;
        info!(appeal = %stored.id, deadline = %stored.deadline, "appeal submitted");
        dispatch(
            self.notifier.as_ref(),
            &stored.promoteur_id,
            "appeal_received",
            json!({ "appealId": stored.id, "deadline": stored.deadline }),
        );
        Ok(stored)
    }

    /// Assigns a reviewer; starts level-1 review or level-2 review after escalation.
    pub fn assign(
        &self,
        id: &AppealId,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal, EngineError> {
        let actor = Actor::Admin(reviewer.to_string());
        self.transition(id, actor, "appeal.assign", now, |appeal| {
            appeal.start_review(reviewer, now)
        })
    }

    pub fn escalate(
        &self,
        id: &AppealId,
        reason: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<Appeal, EngineError> {
        let windows = self.windows.clone();
        let escalated = self.transition(
            id,
            Actor::Admin(admin.to_string()),
            "appeal.escalate",
            now,
            |appeal| appeal.escalate(reason, admin, now, &windows),
        )?;
        dispatch(
            self.notifier.as_ref(),
            &escalated.promoteur_id,
            "appeal_escalated",
            json!({ "appealId": escalated.id, "deadline": escalated.deadline }),
        );
        Ok(escalated)
    }

    /// Runs the command; the appeal and sanction change commit together or not at all.
    pub fn resolve(
        &self,
        command: ResolveAppealCommand,
        now: DateTime<Utc>,
    ) -> Result<CommittedResolution, EngineError> {
        let before = self.get(&command.appeal_id)?;
        let resolution = retry_on_conflict("appeal", &command.appeal_id, || {
            command.execute(self.store.as_ref(), now)
        })?;

        let decided_by = Actor::Admin(command.decision.decided_by.clone());
        let appeal = &resolution.appeal;
        Audit::new(decided_by.clone(), "appeal.resolve", "appeal", &appeal.id, now)
            .before(&before)
            .after(appeal)
            .write(self.store.as_ref())?;
        if let Some(revoked) = &resolution.revoked {
            Audit::new(decided_by.clone(), "sanction.revoke", "sanction", &revoked.id, now)
                .after(revoked)
                .write(self.store.as_ref())?;
        }
        if let Some(replacement) = &resolution.replacement {
            Audit::new(decided_by, "sanction.apply", "sanction", &replacement.id, now)
                .after(replacement)
                .write(self.store.as_ref())?;
        }

        info!(
            appeal = %appeal.id,
            status = %appeal.status,
            level = appeal.level,
            revoked = ?resolution.revoked.as_ref().map(|sanction| &sanction.id),
            replacement = ?resolution.replacement.as_ref().map(|sanction| &sanction.id),
            "appeal resolved"
        );
        dispatch(
            self.notifier.as_ref(),
            &appeal.promoteur_id,
            "appeal_decided",
            json!({
                "appealId": appeal.id,
                "status": appeal.status,
                "explanation": command.decision.explanation,
                "replacementSanction": resolution.replacement.as_ref().map(|sanction| &sanction.id),
            }),
        );
        Ok(resolution)
    }

    pub fn get(&self, id: &AppealId) -> Result<Appeal, EngineError> {
        self.store
            .fetch_appeal(id)?
            .ok_or_else(|| EngineError::not_found("appeal", id))
    }

    pub fn deadline(&self, id: &AppealId, now: DateTime<Utc>) -> Result<SlaVerdict, EngineError> {
        Ok(check_appeal_deadline(&self.get(id)?, now))
    }

    /// Flags an appeal whose current-level deadline has passed. Each level is signalled
    /// once; the appeal stays in its state until an admin acts.
    pub(crate) fn mark_overdue(&self, id: &AppealId, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let flagged = retry_on_conflict("appeal", id, || {
            let current = self.get(id)?;
            let verdict = check_appeal_deadline(&current, now);
            if current.status.is_terminal()
                || !verdict.breached
                || current.overdue_signalled_level == Some(current.level)
            {
                return Ok(None);
            }
            let mut next = current.clone();
            next.overdue_signalled_level = Some(current.level);
            let stored = self.store.update_appeal(next, current.version)?;
            Ok(Some((current, stored, verdict)))
        })?;

        let Some((before, after, verdict)) = flagged else {
            return Ok(false);
        };
        Audit::new(Actor::System, "appeal.overdue", "appeal", id, now)
            .before(&before)
            .after(&after)
            .write(self.store.as_ref())?;
        info!(
            appeal = %id,
            level = after.level,
            hours_elapsed = verdict.hours_elapsed,
            hours_allowed = verdict.hours_allowed,
            "appeal deadline passed"
        );
        let recipient = after
            .assigned_to
            .clone()
            .unwrap_or_else(|| APPEALS_DESK.to_string());
        dispatch(
            self.notifier.as_ref(),
            recipient,
            "appeal_overdue",
            json!({
                "appealId": after.id,
                "level": after.level,
                "deadline": after.deadline,
            }),
        );
        Ok(true)
    }

    fn transition(
        &self,
        id: &AppealId,
        actor: Actor,
        action: &str,
        now: DateTime<Utc>,
        apply: impl Fn(&mut Appeal) -> Result<(), EngineError>,
    ) -> Result<Appeal, EngineError> {
        let (before, after) = retry_on_conflict("appeal", id, || {
            let current = self.get(id)?;
            let mut next = current.clone();
            apply(&mut next)?;
            let stored = self.store.update_appeal(next, current.version)?;
            Ok((current, stored))
        })?;

        Audit::new(actor, action, "appeal", id, now)
            .before(&before)
            .after(&after)
            .write(self.store.as_ref())?;
        info!(
            appeal = %id,
            from = %before.status,
            to = %after.status,
            level = after.level,
            action,
            "appeal transition"
        );
        Ok(after)
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::domain::{
    effective_standing, fixed_term_end, EffectiveStanding, ManualSanctionRequest, Sanction,
    SanctionOrigin, SanctionStatus, SanctionType, StoredStanding, TargetType, Violation,
    ViolationKind,
};
use crate::reputation::domain::{next_key, Actor, PromoteurId, SanctionId, ViolationId};
use crate::reputation::effects::{dispatch, Audit};
use crate::reputation::error::{retry_on_conflict, EngineError};
use crate::reputation::policy::EscalationPolicy;
use crate::reputation::repository::{
    AuditSink, CaseRepository, NotificationDispatcher, SanctionRepository,
};

/// Violation event as reported by the SLA sweep or a moderator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub promoteur_id: PromoteurId,
    pub kind: ViolationKind,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationOutcome {
    pub violation: Violation,
    pub violations_in_window: u32,
    pub escalated_to: Option<Sanction>,
}

/// Sanction state machine: automatic escalation, manual sanctions, revocation and the
/// stored standing projection.
pub struct SanctionService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    policy: EscalationPolicy,
}

impl<S, N> SanctionService<S, N>
where
    S: SanctionRepository + CaseRepository + AuditSink + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: EscalationPolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Records a violation and escalates when the rolling-window count warrants a sanction
    /// above the promoteur's current effective level.
    pub fn record_violation(
        &self,
        report: ViolationReport,
        now: DateTime<Utc>,
    ) -> Result<ViolationOutcome, EngineError> {
        let violation = Violation {
            id: ViolationId::new(next_key("violation")),
            promoteur_id: report.promoteur_id,
            kind: report.kind,
            reference: report.reference,
            occurred_at: now,
        };
        self.store.record_violation(violation.clone())?;
        let promoteur = &violation.promoteur_id;

        let window_start = now - self.policy.breach_window();
        let mut in_window = Vec::new();
        for kind in [ViolationKind::SlaBreach, ViolationKind::PolicyBreach] {
            in_window.extend(self.store.violations_since(promoteur, kind, window_start)?);
        }
        let count = in_window.len() as u32;

        let sanctions = self.store.sanctions_for(promoteur)?;
        let current = effective_standing(&sanctions, now).level;
        let lookback_start = now - Duration::days(self.policy.suspension_lookback_days);
        let prior_suspensions = sanctions
            .iter()
            .filter(|sanction| {
                sanction.sanction_type == SanctionType::TemporarySuspension
                    && !sanction.revoked
                    && sanction.start_date >= lookback_start
            })
            .count() as u32;

        debug!(
            promoteur = %promoteur,
            count,
            prior_suspensions,
            current = ?current,
            "violation recorded"
        );

        let escalated_to = match self.policy.target_for(count, prior_suspensions) {
            Some(target) if target.severity().is_some_and(|level| level > current) => {
                let origin = SanctionOrigin::Automatic {
                    violations: in_window.iter().map(|entry| entry.id.clone()).collect(),
                };
                let sanction = Sanction {
                    id: SanctionId::new(next_key("sanction")),
                    promoteur_id: promoteur.clone(),
                    target_type: TargetType::Promoteur,
                    target_id: promoteur.to_string(),
                    sanction_type: target,
                    reason: format!(
                        "{count} violations within {} days",
                        self.policy.breach_window_days
                    ),
                    manual: false,
                    origin,
                    start_date: now,
                    end_date: self.policy.duration_for(target).map(|duration| now + duration),
                    revoked: false,
                    revoked_at: None,
                    revoked_by: None,
                    version: 0,
                };
                Some(self.issue(sanction, Actor::System, now)?)
            }
            _ => None,
        };

        Ok(ViolationOutcome {
            violation,
            violations_in_window: count,
            escalated_to,
        })
    }

    /// Admin sanction tied to a case or report resolution.
    pub fn apply_manual(
        &self,
        request: ManualSanctionRequest,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        let actor = Actor::Admin(request.admin_id.clone());
        let sanction = self.prepare_manual(request, now)?;
        self.issue(sanction, actor, now)
    }

    /// Validates a manual request and builds the sanction without storing it.
    pub(crate) fn prepare_manual(
        &self,
        request: ManualSanctionRequest,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        if request.admin_id.trim().is_empty() {
            return Err(EngineError::validation("manual sanctions require an admin id"));
        }
        if request.reason.trim().is_empty() {
            return Err(EngineError::validation("manual sanctions require a reason"));
        }
        match &request.origin {
            SanctionOrigin::Case { case_id } => {
                if self.store.fetch_case(case_id)?.is_none() {
                    return Err(EngineError::not_found("case", case_id));
                }
            }
            SanctionOrigin::Report { report_id } if !report_id.trim().is_empty() => {}
            _ => {
                return Err(EngineError::validation(
                    "manual sanctions must reference a case or report",
                ))
            }
        }
        let end_date = match (request.sanction_type, request.duration_days) {
            (SanctionType::PermanentSuspension, Some(_)) => {
                return Err(EngineError::validation(
                    "permanent suspensions cannot carry a duration",
                ))
            }
            (_, Some(days)) => Some(fixed_term_end(now, days)?),
            (_, None) => None,
        };

        let sanction = Sanction {
            id: SanctionId::new(next_key("sanction")),
            promoteur_id: request.promoteur_id,
            target_type: request.target_type,
            target_id: request.target_id,
            sanction_type: request.sanction_type,
            reason: request.reason,
            manual: true,
            origin: request.origin,
            start_date: now,
            end_date,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            version: 0,
        };
        Ok(sanction)
    }

    /// Manual reversal. Revocation is terminal.
    pub fn revoke(
        &self,
        id: &SanctionId,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        let (before, revoked) = retry_on_conflict("sanction", id, || {
            let current = self.get(id)?;
            match current.status(now) {
                SanctionStatus::Active => {}
                status => {
                    return Err(EngineError::invalid_transition(
                        "sanction",
                        status_label(status),
                        "revoke",
                    ))
                }
            }
            let mut next = current.clone();
            next.revoked = true;
            next.revoked_at = Some(now);
            next.revoked_by = Some(admin.to_string());
            let stored = self.store.update_sanction(next, current.version)?;
            Ok((current, stored))
        })?;

        Audit::new(Actor::Admin(admin.to_string()), "sanction.revoke", "sanction", id, now)
            .before(&before)
            .after(&revoked)
            .write(self.store.as_ref())?;
        info!(sanction = %id, promoteur = %revoked.promoteur_id, "sanction revoked");
        self.notify_sanction(&revoked, "sanction_revoked");
        Ok(revoked)
    }

    pub fn get(&self, id: &SanctionId) -> Result<Sanction, EngineError> {
        self.store
            .fetch_sanction(id)?
            .ok_or_else(|| EngineError::not_found("sanction", id))
    }

    pub fn list_for(&self, promoteur: &PromoteurId) -> Result<Vec<Sanction>, EngineError> {
        let mut sanctions = self.store.sanctions_for(promoteur)?;
        sanctions.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(sanctions)
    }

    pub fn standing(
        &self,
        promoteur: &PromoteurId,
        now: DateTime<Utc>,
    ) -> Result<EffectiveStanding, EngineError> {
        Ok(effective_standing(&self.store.sanctions_for(promoteur)?, now))
    }

    /// Brings the stored standing in line with the derived one. Returns whether it changed.
    pub fn refresh_standing(
        &self,
        promoteur: &PromoteurId,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let derived = self.standing(promoteur, now)?;
        let stored = self.store.stored_standing(promoteur)?;
        let unchanged = match &stored {
            Some(stored) => stored.matches(&derived),
            None => derived == EffectiveStanding::default(),
        };
        if unchanged {
            return Ok(false);
        }

        let refreshed = StoredStanding {
            level: derived.level,
            restricted: derived.restricted,
            refreshed_at: now,
        };
        self.store.save_standing(promoteur, refreshed.clone())?;

        Audit::new(Actor::System, "standing.refresh", "promoteur", promoteur, now)
            .before(&stored)
            .after(&refreshed)
            .write(self.store.as_ref())?;
        info!(
            promoteur = %promoteur,
            level = ?refreshed.level,
            restricted = refreshed.restricted,
            "standing refreshed"
        );
        dispatch(
            self.notifier.as_ref(),
            promoteur,
            "standing_changed",
            json!({
                "level": refreshed.level,
                "restricted": refreshed.restricted,
                "activeSanctions": derived.active_sanctions,
            }),
        );
        Ok(true)
    }

    fn issue(
        &self,
        sanction: Sanction,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        let stored = self.store.insert_sanction(sanction)?;
        self.announce(&stored, actor, now)?;
        Ok(stored)
    }

    /// Audit, log and notification for a sanction that has just been stored.
    pub(crate) fn announce(
        &self,
        stored: &Sanction,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        Audit::new(actor, "sanction.apply", "sanction", &stored.id, now)
            .after(stored)
            .write(self.store.as_ref())?;
        info!(
            sanction = %stored.id,
            promoteur = %stored.promoteur_id,
            sanction_type = %stored.sanction_type,
            manual = stored.manual,
            end_date = ?stored.end_date,
            "sanction applied"
        );
        self.notify_sanction(stored, "sanction_applied");
        Ok(())
    }

    fn notify_sanction(&self, sanction: &Sanction, template: &str) {
        dispatch(
            self.notifier.as_ref(),
            &sanction.promoteur_id,
            template,
            json!({
                "sanctionId": sanction.id,
                "type": sanction.sanction_type,
                "reason": sanction.reason,
                "endDate": sanction.end_date,
            }),
        );
    }
}

fn status_label(status: SanctionStatus) -> &'static str {
    match status {
        SanctionStatus::Active => "active",
        SanctionStatus::Expired => "expired",
        SanctionStatus::Revoked => "revoked",
    }
}

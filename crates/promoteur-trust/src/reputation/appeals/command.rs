use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AppealDecision, DecisionOutcome};
use crate::reputation::domain::{next_key, AppealId, PromoteurId, SanctionId};
use crate::reputation::error::EngineError;
use crate::reputation::repository::{
    AppealRepository, CommittedResolution, SanctionChange, SanctionRepository,
    SanctionRevocation,
};
use crate::reputation::sanctions::domain::{
    fixed_term_end, is_lighter_replacement, Sanction, SanctionOrigin, SanctionType, TargetType,
};

/// Decides an appeal and applies its consequence on the contested sanction as one unit:
/// the appeal, the revocation and any replacement sanction are committed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveAppealCommand {
    pub appeal_id: AppealId,
    pub decision: AppealDecision,
}

impl ResolveAppealCommand {
    pub fn new(appeal_id: AppealId, decision: AppealDecision) -> Self {
        Self {
            appeal_id,
            decision,
        }
    }

    pub(crate) fn execute<S>(
        &self,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<CommittedResolution, EngineError>
    where
        S: AppealRepository + SanctionRepository + ?Sized,
    {
        let appeal = store
            .fetch_appeal(&self.appeal_id)?
            .ok_or_else(|| EngineError::not_found("appeal", &self.appeal_id))?;
        let expected_version = appeal.version;

        let mut decided = appeal.clone();
        decided.record_decision(self.decision.clone(), now)?;

        let change = match self.decision.outcome {
            DecisionOutcome::Rejected => SanctionChange::default(),
            DecisionOutcome::Approved | DecisionOutcome::PartiallyApproved => {
                let contested = match &appeal.original_action.sanction_id {
                    Some(id) => Some(fetch_sanction(store, id)?),
                    None => None,
                };
                self.sanction_change(contested.as_ref(), &appeal.promoteur_id, now)?
            }
        };

        Ok(store.commit_resolution(decided, expected_version, change)?)
    }

    fn sanction_change(
        &self,
        contested: Option<&Sanction>,
        promoteur: &PromoteurId,
        now: DateTime<Utc>,
    ) -> Result<SanctionChange, EngineError> {
        let revoke = contested
            .filter(|sanction| !sanction.revoked)
            .map(|sanction| SanctionRevocation {
                sanction_id: sanction.id.clone(),
                expected_version: sanction.version,
                revoked_by: self.decision.decided_by.clone(),
                revoked_at: now,
            });

        let replacement = match self.decision.new_action.as_ref() {
            None => None,
            Some(action) => {
                let end_date = match (action.sanction_type, action.duration_days) {
                    (SanctionType::PermanentSuspension, Some(_)) => {
                        return Err(EngineError::validation(
                            "permanent suspensions cannot carry a duration",
                        ))
                    }
                    (_, Some(days)) => Some(fixed_term_end(now, days)?),
                    (_, None) => None,
                };
                let (target_type, target_id) = match contested {
                    Some(sanction) => (sanction.target_type, sanction.target_id.clone()),
                    None => (TargetType::Promoteur, promoteur.to_string()),
                };
                let replacement = Sanction {
                    id: SanctionId::new(next_key("sanction")),
                    promoteur_id: promoteur.clone(),
                    target_type,
                    target_id,
                    sanction_type: action.sanction_type,
                    reason: action.reason.clone(),
                    manual: true,
                    origin: SanctionOrigin::AppealReplacement {
                        appeal_id: self.appeal_id.clone(),
                    },
                    start_date: now,
                    end_date,
                    revoked: false,
                    revoked_at: None,
                    revoked_by: None,
                    version: 0,
                };
                if !is_lighter_replacement(&replacement, contested) {
                    return Err(EngineError::validation(format!(
                        "a {} cannot replace the contested sanction on partial approval",
                        replacement.sanction_type
                    )));
                }
                Some(replacement)
            }
        };

        Ok(SanctionChange {
            revoke,
            replacement,
        })
    }
}

fn fetch_sanction<S>(store: &S, id: &SanctionId) -> Result<Sanction, EngineError>
where
    S: SanctionRepository + ?Sized,
{
    store
        .fetch_sanction(id)?
        .ok_or_else(|| EngineError::not_found("sanction", id))
}

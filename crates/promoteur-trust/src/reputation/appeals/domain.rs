use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::domain::{AppealId, PromoteurId, SanctionId};
use crate::reputation::error::EngineError;
use crate::reputation::policy::AppealWindows;
use crate::reputation::sanctions::domain::SanctionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppealStatus {
    Pending,
    UnderReview,
    Escalated,
    Approved,
    PartiallyApproved,
    Rejected,
}

impl AppealStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AppealStatus::Pending => "pending",
            AppealStatus::UnderReview => "under-review",
            AppealStatus::Escalated => "escalated",
            AppealStatus::Approved => "approved",
            AppealStatus::PartiallyApproved => "partially-approved",
            AppealStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            AppealStatus::Approved | AppealStatus::PartiallyApproved | AppealStatus::Rejected
        )
    }

    /// Decided at least partly in the promoteur's favour.
    pub const fn is_upheld(self) -> bool {
        matches!(self, AppealStatus::Approved | AppealStatus::PartiallyApproved)
    }
}

impl fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealType {
    Sanction,
    ModerationDecision,
    TrustScore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalAction {
    pub sanction_id: Option<SanctionId>,
    pub description: String,
}

/// One review window. Escalation opens a new one; the history keeps both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineWindow {
    pub level: u8,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub reason: String,
    pub escalated_by: String,
    pub escalated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionOutcome {
    Approved,
    PartiallyApproved,
    Rejected,
}

impl DecisionOutcome {
    const fn status(self) -> AppealStatus {
        match self {
            DecisionOutcome::Approved => AppealStatus::Approved,
            DecisionOutcome::PartiallyApproved => AppealStatus::PartiallyApproved,
            DecisionOutcome::Rejected => AppealStatus::Rejected,
        }
    }
}

/// Lighter sanction replacing the contested one on partial approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementAction {
    pub sanction_type: SanctionType,
    pub reason: String,
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealDecision {
    pub outcome: DecisionOutcome,
    pub explanation: String,
    pub new_action: Option<ReplacementAction>,
    pub decided_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealSubmission {
    pub promoteur_id: PromoteurId,
    pub appeal_type: AppealType,
    pub original_action: OriginalAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,
    pub promoteur_id: PromoteurId,
    pub appeal_type: AppealType,
    pub original_action: OriginalAction,
    pub reason: String,
    pub status: AppealStatus,
    pub level: u8,
    pub submitted_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub deadline_history: Vec<DeadlineWindow>,
    pub assigned_to: Option<String>,
    pub review_started_at: Option<DateTime<Utc>>,
    pub escalation: Option<Escalation>,
    pub decision: Option<AppealDecision>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Level whose deadline overrun has already been signalled.
    pub overdue_signalled_level: Option<u8>,
    pub version: u64,
}

impl Appeal {
    pub fn open(
        id: AppealId,
        submission: AppealSubmission,
        now: DateTime<Utc>,
        windows: &AppealWindows,
    ) -> Self {
        let deadline = now + windows.for_level(1);
        Self {
            id,
            promoteur_id: submission.promoteur_id,
            appeal_type: submission.appeal_type,
            original_action: submission.original_action,
            reason: submission.reason,
            status: AppealStatus::Pending,
            level: 1,
            submitted_at: now,
            deadline,
            deadline_history: vec![DeadlineWindow {
                level: 1,
                opened_at: now,
                deadline,
            }],
            assigned_to: None,
            review_started_at: None,
            escalation: None,
            decision: None,
            resolved_at: None,
            overdue_signalled_level: None,
            version: 0,
        }
    }

    /// Start of the window the current deadline belongs to.
    pub fn window_opened_at(&self) -> DateTime<Utc> {
        self.deadline_history
            .last()
            .map(|window| window.opened_at)
            .unwrap_or(self.submitted_at)
    }

    pub fn start_review(&mut self, reviewer: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        if !matches!(self.status, AppealStatus::Pending | AppealStatus::Escalated) {
            return Err(EngineError::invalid_transition(
                "appeal",
                self.status,
                "start review of",
            ));
        }
        if reviewer.trim().is_empty() {
            return Err(EngineError::validation("reviewer is required"));
        }

        self.status = AppealStatus::UnderReview;
        self.assigned_to = Some(reviewer.to_string());
        self.review_started_at = Some(now);
        Ok(())
    }

    /// Moves a level-1 appeal to level 2; the level-1 deadline stops applying.
    pub fn escalate(
        &mut self,
        reason: &str,
        escalated_by: &str,
        now: DateTime<Utc>,
        windows: &AppealWindows,
    ) -> Result<(), EngineError> {
        let allowed = self.level == 1
            && matches!(self.status, AppealStatus::Pending | AppealStatus::UnderReview);
        if !allowed {
            let from = format!("{} at level {}", self.status, self.level);
            return Err(EngineError::invalid_transition("appeal", from, "escalate"));
        }
        if reason.trim().is_empty() {
            return Err(EngineError::validation("escalation requires a reason"));
        }

        let deadline = now + windows.for_level(2);
        self.status = AppealStatus::Escalated;
        self.level = 2;
        self.deadline = deadline;
        self.deadline_history.push(DeadlineWindow {
            level: 2,
            opened_at: now,
            deadline,
        });
        self.assigned_to = None;
        self.review_started_at = None;
        self.escalation = Some(Escalation {
            reason: reason.to_string(),
            escalated_by: escalated_by.to_string(),
            escalated_at: now,
        });
        Ok(())
    }

    pub fn record_decision(
        &mut self,
        decision: AppealDecision,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.status != AppealStatus::UnderReview {
            return Err(EngineError::invalid_transition(
                "appeal",
                self.status,
                "decide",
            ));
        }
        if decision.explanation.trim().is_empty() {
            return Err(EngineError::validation("decision requires an explanation"));
        }
        match (decision.outcome, &decision.new_action) {
            (DecisionOutcome::PartiallyApproved, None) => {
                return Err(EngineError::validation(
                    "partial approval requires a replacement action",
                ))
            }
            (DecisionOutcome::Approved | DecisionOutcome::Rejected, Some(_)) => {
                return Err(EngineError::validation(
                    "only partial approvals carry a replacement action",
                ))
            }
            _ => {}
        }
        if let Some(days) = decision.new_action.as_ref().and_then(|action| action.duration_days) {
            if days <= 0 {
                return Err(EngineError::validation(
                    "replacement sanction duration must be positive",
                ));
            }
        }

        self.status = decision.outcome.status();
        self.decision = Some(decision);
        self.resolved_at = Some(now);
        Ok(())
    }
}

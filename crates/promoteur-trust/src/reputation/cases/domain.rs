use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::domain::{CaseId, PromoteurId, SanctionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Fraud,
    Dispute,
    Complaint,
    NonCompliance,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Investigation lifecycle. Serialized with the back-office labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    #[serde(rename = "nouveau")]
    New,
    #[serde(rename = "en-cours")]
    InProgress,
    #[serde(rename = "attente-info")]
    AwaitingInfo,
    #[serde(rename = "resolu")]
    Resolved,
    #[serde(rename = "ferme")]
    Closed,
    #[serde(rename = "escalade")]
    Escalated,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CaseStatus::New => "nouveau",
            CaseStatus::InProgress => "en-cours",
            CaseStatus::AwaitingInfo => "attente-info",
            CaseStatus::Resolved => "resolu",
            CaseStatus::Closed => "ferme",
            CaseStatus::Escalated => "escalade",
        }
    }

    /// Resolved and closed cases no longer run against their SLA.
    pub const fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Closed)
    }

    pub fn can_transition_to(self, next: CaseStatus) -> bool {
        use CaseStatus::*;
        matches!(
            (self, next),
            (New, InProgress)
                | (New, Closed)
                | (New, Escalated)
                | (InProgress, AwaitingInfo)
                | (InProgress, Resolved)
                | (InProgress, Closed)
                | (InProgress, Escalated)
                | (AwaitingInfo, InProgress)
                | (AwaitingInfo, Resolved)
                | (AwaitingInfo, Closed)
                | (AwaitingInfo, Escalated)
                | (Escalated, InProgress)
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `CASE-<year>-<6-digit sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseNumber(pub String);

impl CaseNumber {
    pub fn format(year: i32, sequence: u64) -> Self {
        Self(format!("CASE-{year}-{sequence:06}"))
    }

    /// Year and sequence, if the number is well formed.
    pub fn parts(&self) -> Option<(i32, u64)> {
        let mut pieces = self.0.splitn(3, '-');
        if pieces.next()? != "CASE" {
            return None;
        }
        let year = pieces.next()?.parse().ok()?;
        let sequence = pieces.next()?.parse().ok()?;
        Some((year, sequence))
    }
}

impl fmt::Display for CaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSubject {
    pub promoteur_id: Option<PromoteurId>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationNote {
    pub author: String,
    pub text: String,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResolution {
    pub summary: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
    pub sanction_id: Option<SanctionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub case_number: CaseNumber,
    pub case_type: CaseType,
    pub priority: CasePriority,
    pub reporter: String,
    pub subject: CaseSubject,
    pub status: CaseStatus,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sla_deadline: DateTime<Utc>,
    pub sla_breached: bool,
    pub investigation_notes: Vec<InvestigationNote>,
    pub resolution: Option<CaseResolution>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
    pub case_type: CaseType,
    pub priority: CasePriority,
    pub reporter: String,
    pub subject: CaseSubject,
}

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::domain::{AppealId, CaseId, PromoteurId, SanctionId, ViolationId};
use crate::reputation::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SanctionType {
    Warning,
    TemporarySuspension,
    PermanentSuspension,
    /// Orthogonal to the severity ladder (e.g. publication limits).
    Restriction,
}

impl SanctionType {
    pub const fn label(self) -> &'static str {
        match self {
            SanctionType::Warning => "warning",
            SanctionType::TemporarySuspension => "temporary-suspension",
            SanctionType::PermanentSuspension => "permanent-suspension",
            SanctionType::Restriction => "restriction",
        }
    }

    /// Position on the ladder; `None` for restrictions.
    pub const fn severity(self) -> Option<SeverityLevel> {
        match self {
            SanctionType::Warning => Some(SeverityLevel::Warning),
            SanctionType::TemporarySuspension => Some(SeverityLevel::TemporarySuspension),
            SanctionType::PermanentSuspension => Some(SeverityLevel::PermanentSuspension),
            SanctionType::Restriction => None,
        }
    }
}

impl fmt::Display for SanctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SeverityLevel {
    #[default]
    None,
    Warning,
    TemporarySuspension,
    PermanentSuspension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Promoteur,
    Project,
    Listing,
}

/// Why a sanction exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum SanctionOrigin {
    Automatic { violations: Vec<ViolationId> },
    Case { case_id: CaseId },
    Report { report_id: String },
    AppealReplacement { appeal_id: AppealId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sanction {
    pub id: SanctionId,
    pub promoteur_id: PromoteurId,
    pub target_type: TargetType,
    pub target_id: String,
    pub sanction_type: SanctionType,
    pub reason: String,
    pub manual: bool,
    pub origin: SanctionOrigin,
    pub start_date: DateTime<Utc>,
    /// Absent means indefinite until revoked or superseded.
    pub end_date: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionStatus {
    Active,
    Expired,
    Revoked,
}

/// The one place where sanction state is derived. Nothing stores an "expired" flag.
pub fn sanction_status(sanction: &Sanction, now: DateTime<Utc>) -> SanctionStatus {
    if sanction.revoked {
        return SanctionStatus::Revoked;
    }
    match sanction.end_date {
        Some(end) if now > end => SanctionStatus::Expired,
        _ => SanctionStatus::Active,
    }
}

impl Sanction {
    pub fn status(&self, now: DateTime<Utc>) -> SanctionStatus {
        sanction_status(self, now)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == SanctionStatus::Active
    }
}

/// Current restriction picture for a promoteur.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveStanding {
    pub level: SeverityLevel,
    pub restricted: bool,
    pub active_sanctions: Vec<SanctionId>,
}

/// Maximum severity among active ladder sanctions, plus any active restriction.
pub fn effective_standing(sanctions: &[Sanction], now: DateTime<Utc>) -> EffectiveStanding {
    let mut standing = EffectiveStanding::default();
    for sanction in sanctions.iter().filter(|sanction| sanction.is_active(now)) {
        standing.active_sanctions.push(sanction.id.clone());
        match sanction.sanction_type.severity() {
            Some(level) => standing.level = standing.level.max(level),
            None => standing.restricted = true,
        }
    }
    standing.active_sanctions.sort();
    standing
}

/// Projection refreshed by the expiry sweep for readers that cannot derive standing themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStanding {
    pub level: SeverityLevel,
    pub restricted: bool,
    pub refreshed_at: DateTime<Utc>,
}

impl StoredStanding {
    pub fn matches(&self, standing: &EffectiveStanding) -> bool {
        self.level == standing.level && self.restricted == standing.restricted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    SlaBreach,
    PolicyBreach,
}

/// Violation event consumed by the escalation ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub promoteur_id: PromoteurId,
    pub kind: ViolationKind,
    /// Lead, case or report the violation was observed on.
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

/// Admin-initiated sanction, always tied to a case or report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualSanctionRequest {
    pub promoteur_id: PromoteurId,
    pub target_type: TargetType,
    pub target_id: String,
    pub sanction_type: SanctionType,
    pub reason: String,
    pub duration_days: Option<i64>,
    pub origin: SanctionOrigin,
    pub admin_id: String,
}

/// Longest fixed term an admin may hand out; anything longer is a permanent suspension.
pub const MAX_SANCTION_DAYS: i64 = 3_650;

/// End date of a fixed-term sanction starting at `start`.
pub fn fixed_term_end(start: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, EngineError> {
    if days <= 0 {
        return Err(EngineError::validation("sanction duration must be positive"));
    }
    if days > MAX_SANCTION_DAYS {
        return Err(EngineError::validation(format!(
            "sanction duration of {days} days exceeds the {MAX_SANCTION_DAYS} day limit"
        )));
    }
    Duration::try_days(days)
        .and_then(|term| start.checked_add_signed(term))
        .ok_or_else(|| EngineError::validation("sanction end date is out of range"))
}

/// Whether `replacement` is a lighter outcome than the sanction it replaces. Ladder
/// sanctions must step down; a restriction may replace a suspension, and replace another
/// restriction only with an earlier end.
pub fn is_lighter_replacement(replacement: &Sanction, contested: Option<&Sanction>) -> bool {
    let Some(contested) = contested else {
        return replacement.sanction_type != SanctionType::PermanentSuspension;
    };
    match (
        replacement.sanction_type.severity(),
        contested.sanction_type.severity(),
    ) {
        (Some(replacement), Some(contested)) => replacement < contested,
        (None, Some(contested)) => contested > SeverityLevel::Warning,
        (Some(replacement), None) => replacement == SeverityLevel::Warning,
        (None, None) => match (replacement.end_date, contested.end_date) {
            (Some(replacement), Some(contested)) => replacement < contested,
            (Some(_), None) => true,
            (None, _) => false,
        },
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::config_store::TrustFactor;
use crate::reputation::domain::{PromoteurId, SnapshotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total: u32,
    pub verified: u32,
    pub rejected: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseStats {
    pub average_hours: Option<f64>,
    /// Consecutive leads answered within their SLA window, most recent first.
    pub on_time_streak: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: u32,
    pub completed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub count: u32,
    pub average_rating: f64,
}

/// Read-only aggregate supplied by the identity/project data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteurActivity {
    pub promoteur_id: PromoteurId,
    pub registered_at: DateTime<Utc>,
    pub kyc_status: KycStatus,
    pub documents: DocumentStats,
    /// Publication times of project updates, in any order.
    pub update_timestamps: Vec<DateTime<Utc>>,
    pub responses: ResponseStats,
    pub projects: ProjectStats,
    pub reviews: ReviewStats,
    pub active_badges: u32,
    pub has_verified_badge: bool,
    pub profile_complete: bool,
    pub complaints: u32,
}

impl PromoteurActivity {
    /// A freshly registered account with nothing verified yet.
    pub fn new(promoteur_id: PromoteurId, registered_at: DateTime<Utc>) -> Self {
        Self {
            promoteur_id,
            registered_at,
            kyc_status: KycStatus::NotSubmitted,
            documents: DocumentStats::default(),
            update_timestamps: Vec::new(),
            responses: ResponseStats::default(),
            projects: ProjectStats::default(),
            reviews: ReviewStats::default(),
            active_badges: 0,
            has_verified_badge: false,
            profile_complete: false,
            complaints: 0,
        }
    }
}

/// Counts the engine itself owns, overlaid on the data-source aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceOverlay {
    pub missed_sla: u32,
    pub upheld_appeals: u32,
}

/// Immutable history entry written on every recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustScoreSnapshot {
    pub id: SnapshotId,
    pub promoteur_id: PromoteurId,
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

/// Weighted contribution of a single factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: TrustFactor,
    pub sub_score: f64,
    pub weight: f64,
    pub points: f64,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    VerifiedBadge,
    CompleteProfile,
    QuickResponder,
    ConsistentUpdater,
    AppealUpheld,
    MissedSla,
    RejectedDocuments,
    Complaints,
    NoUpdatesWeek,
    NoUpdatesMonth,
    Gaming,
}

/// Bonus (positive) or penalty (negative) applied after the weighted base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub kind: AdjustmentKind,
    pub points: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum GamingSignal {
    BurstDay { date: NaiveDate, updates: u32 },
    RapidSuccession { occurrences: u32 },
    ScoreJump { from: u8, to: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreOutcome {
    pub promoteur_id: PromoteurId,
    pub score: u8,
    pub weighted_base: f64,
    pub breakdown: Vec<FactorContribution>,
    pub adjustments: Vec<ScoreAdjustment>,
    pub gaming_signals: Vec<GamingSignal>,
    pub computed_at: DateTime<Utc>,
}

impl TrustScoreOutcome {
    pub fn points_for(&self, factor: TrustFactor) -> f64 {
        self.breakdown
            .iter()
            .find(|entry| entry.factor == factor)
            .map(|entry| entry.points)
            .unwrap_or(0.0)
    }

    pub fn adjustment(&self, kind: AdjustmentKind) -> Option<f64> {
        self.adjustments
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.points)
    }
}

/// Tier derived from the score, used for ranking and publication gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Restricted,
    Standard,
    Trusted,
    Premium,
}

impl TrustTier {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=39 => TrustTier::Restricted,
            40..=59 => TrustTier::Standard,
            60..=79 => TrustTier::Trusted,
            _ => TrustTier::Premium,
        }
    }
}

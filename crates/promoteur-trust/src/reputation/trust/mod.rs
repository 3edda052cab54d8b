//! Trust score computation, persistence and history.

mod calculator;
pub mod domain;
mod factors;
mod gaming;
mod history;
mod service;

pub use calculator::{TrustInputs, TrustScoreCalculator};
pub use domain::{
    AdjustmentKind, ComplianceOverlay, DocumentStats, FactorContribution, GamingSignal,
    KycStatus, ProjectStats, PromoteurActivity, ResponseStats, ReviewStats, ScoreAdjustment,
    TrustScoreOutcome, TrustScoreSnapshot, TrustTier,
};
pub use history::{ScoreHistory, ScoreTrend, TrendDirection};
pub use service::{Eligibility, TrustScoreService, TrustStanding};

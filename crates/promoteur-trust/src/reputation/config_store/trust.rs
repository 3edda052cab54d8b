use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reputation::error::EngineError;

/// Weighted factors feeding the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustFactor {
    KycVerification,
    DocumentsComplete,
    RegularUpdates,
    ResponseTime,
    ProjectCompletion,
    ClientReviews,
    Badges,
}

impl TrustFactor {
    pub const ALL: [TrustFactor; 7] = [
        TrustFactor::KycVerification,
        TrustFactor::DocumentsComplete,
        TrustFactor::RegularUpdates,
        TrustFactor::ResponseTime,
        TrustFactor::ProjectCompletion,
        TrustFactor::ClientReviews,
        TrustFactor::Badges,
    ];
}

/// Longest look-back any trust window may use.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

/// Admin-managed trust score configuration. Weights are expected to total 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustScoreConfig {
    pub name: String,
    pub weights: BTreeMap<TrustFactor, f64>,
    /// Minimum score per project type for publication eligibility.
    #[serde(default)]
    pub thresholds: BTreeMap<String, u8>,
    pub update_frequency: UpdateFrequency,
    pub response_time: ResponseTimeBands,
    pub badge_cap: u32,
    pub gaming_detection: GamingDetection,
    pub bonus_points: BonusPoints,
    pub penalties: PenaltyPoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFrequency {
    pub recommended_days: i64,
    pub minimum: i64,
}

/// Average first-response hours mapped to descending sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeBands {
    pub excellent_hours: f64,
    pub good_hours: f64,
    pub acceptable_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamingDetection {
    pub enabled: bool,
    pub min_update_interval_hours: f64,
    pub max_daily_updates: u32,
    pub max_score_jump: u8,
    pub score_jump_window_days: i64,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusPoints {
    pub verified_badge: f64,
    pub complete_profile: f64,
    pub quick_responder: f64,
    pub consistent_updater: f64,
    pub appeal_upheld: f64,
    /// Consecutive on-time lead responses required for the quick-responder bonus.
    pub quick_responder_streak: u32,
    /// Consecutive weeks with at least one update required for the consistent-updater bonus.
    pub consistent_updater_weeks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyPoints {
    #[serde(rename = "missedSLA")]
    pub missed_sla: f64,
    pub rejected_document: f64,
    pub complaint: f64,
    pub no_updates_week: f64,
    pub no_updates_month: f64,
    /// Window for counting missed SLAs and upheld appeals.
    pub lookback_days: i64,
}

impl TrustScoreConfig {
    /// Baseline configuration seeded on first start.
    pub fn standard() -> Self {
        let weights = BTreeMap::from([
            (TrustFactor::KycVerification, 20.0),
            (TrustFactor::DocumentsComplete, 15.0),
            (TrustFactor::RegularUpdates, 20.0),
            (TrustFactor::ResponseTime, 15.0),
            (TrustFactor::ProjectCompletion, 15.0),
            (TrustFactor::ClientReviews, 10.0),
            (TrustFactor::Badges, 5.0),
        ]);
        let thresholds = BTreeMap::from([
            ("appartement".to_string(), 50),
            ("villa".to_string(), 60),
            ("immeuble".to_string(), 70),
            ("lotissement".to_string(), 75),
        ]);

        Self {
            name: "standard".to_string(),
            weights,
            thresholds,
            update_frequency: UpdateFrequency {
                recommended_days: 7,
                minimum: 30,
            },
            response_time: ResponseTimeBands {
                excellent_hours: 2.0,
                good_hours: 24.0,
                acceptable_hours: 48.0,
            },
            badge_cap: 5,
            gaming_detection: GamingDetection {
                enabled: true,
                min_update_interval_hours: 1.0,
                max_daily_updates: 5,
                max_score_jump: 30,
                score_jump_window_days: 7,
                penalty: 10.0,
            },
            bonus_points: BonusPoints {
                verified_badge: 5.0,
                complete_profile: 3.0,
                quick_responder: 5.0,
                consistent_updater: 5.0,
                appeal_upheld: 5.0,
                quick_responder_streak: 10,
                consistent_updater_weeks: 4,
            },
            penalties: PenaltyPoints {
                missed_sla: 5.0,
                rejected_document: 3.0,
                complaint: 5.0,
                no_updates_week: 5.0,
                no_updates_month: 15.0,
                lookback_days: 90,
            },
        }
    }

    pub fn weight(&self, factor: TrustFactor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Minimum score for a project type; unknown types have no floor.
    pub fn threshold_for(&self, project_type: &str) -> u8 {
        self.thresholds
            .get(&project_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("config name must not be empty"));
        }

        for (factor, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EngineError::validation(format!(
                    "weight for {factor:?} must be a non-negative number"
                )));
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(EngineError::validation("trust weights must not all be zero"));
        }

        if let Some((project_type, min)) = self.thresholds.iter().find(|(_, min)| **min > 100) {
            return Err(EngineError::validation(format!(
                "threshold {min} for {project_type} exceeds 100"
            )));
        }

        let frequency = &self.update_frequency;
        if frequency.recommended_days <= 0
            || frequency.minimum < frequency.recommended_days
            || frequency.minimum > MAX_WINDOW_DAYS
        {
            return Err(EngineError::validation(format!(
                "updateFrequency requires 0 < recommendedDays <= minimum <= {MAX_WINDOW_DAYS}"
            )));
        }

        let bands = &self.response_time;
        let hours = [bands.excellent_hours, bands.good_hours, bands.acceptable_hours];
        if hours.iter().any(|value| !value.is_finite())
            || !(bands.excellent_hours <= bands.good_hours
                && bands.good_hours <= bands.acceptable_hours)
        {
            return Err(EngineError::validation(
                "responseTime bands must be finite and ascending",
            ));
        }

        let gaming = &self.gaming_detection;
        let max_interval_hours = (MAX_WINDOW_DAYS * 24) as f64;
        if !(0.0..=max_interval_hours).contains(&gaming.min_update_interval_hours)
            || !gaming.penalty.is_finite()
            || gaming.penalty < 0.0
        {
            return Err(EngineError::validation(format!(
                "gamingDetection requires a finite non-negative penalty and a minUpdateIntervalHours \
                 between 0 and {max_interval_hours}"
            )));
        }
        window_days("gamingDetection.scoreJumpWindowDays", gaming.score_jump_window_days)?;
        window_days("penalties.lookbackDays", self.penalties.lookback_days)?;

        let points = [
            self.bonus_points.verified_badge,
            self.bonus_points.complete_profile,
            self.bonus_points.quick_responder,
            self.bonus_points.consistent_updater,
            self.bonus_points.appeal_upheld,
            self.penalties.missed_sla,
            self.penalties.rejected_document,
            self.penalties.complaint,
            self.penalties.no_updates_week,
            self.penalties.no_updates_month,
        ];
        if points.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(EngineError::validation(
                "bonus and penalty points must be non-negative",
            ));
        }

        Ok(())
    }
}

fn window_days(field: &str, days: i64) -> Result<(), EngineError> {
    if (1..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(EngineError::validation(format!(
            "{field} must be between 1 and {MAX_WINDOW_DAYS} days, got {days}"
        )))
    }
}

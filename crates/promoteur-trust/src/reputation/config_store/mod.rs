//! Versioned, named scoring configurations with exclusive activation per kind.

mod lead;
mod store;
mod trust;

pub use lead::{
    BudgetScoring, EngagementScoring, GradeRange, LeadDimension, LeadScoringConfig,
    SlaThresholds,
};
pub use store::{ActiveConfigProvider, ConfigStore};
pub use trust::{
    BonusPoints, GamingDetection, PenaltyPoints, ResponseTimeBands, TrustFactor,
    TrustScoreConfig, UpdateFrequency, MAX_WINDOW_DAYS,
};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigKind {
    TrustScore,
    LeadScoring,
}

impl ConfigKind {
    pub const fn label(self) -> &'static str {
        match self {
            ConfigKind::TrustScore => "trust-score",
            ConfigKind::LeadScoring => "lead-scoring",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trust-score" => Some(Self::TrustScore),
            "lead-scoring" => Some(Self::LeadScoring),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "kebab-case")]
pub enum ScoreConfig {
    TrustScore(TrustScoreConfig),
    LeadScoring(LeadScoringConfig),
}

impl ScoreConfig {
    pub fn kind(&self) -> ConfigKind {
        match self {
            ScoreConfig::TrustScore(_) => ConfigKind::TrustScore,
            ScoreConfig::LeadScoring(_) => ConfigKind::LeadScoring,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ScoreConfig::TrustScore(config) => &config.name,
            ScoreConfig::LeadScoring(config) => &config.name,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            ScoreConfig::TrustScore(config) => config.validate(),
            ScoreConfig::LeadScoring(config) => config.validate(),
        }
    }

    /// Sum of configured weights; anything but 100 is legal but worth a warning.
    pub fn total_weight(&self) -> f64 {
        match self {
            ScoreConfig::TrustScore(config) => config.total_weight(),
            ScoreConfig::LeadScoring(config) => config.total_weight(),
        }
    }
}

/// Persisted form of a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub config: ScoreConfig,
    pub is_active: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl ConfigDocument {
    pub fn kind(&self) -> ConfigKind {
        self.config.kind()
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }
}

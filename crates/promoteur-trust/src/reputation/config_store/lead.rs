use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reputation::error::EngineError;
use crate::reputation::leads::domain::{FinancingType, LeadGrade, LeadSource, Timeframe};

/// Dimensions carrying a configured weight in the lead composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadDimension {
    BudgetMatch,
    TimelineMatch,
    FinancingType,
    ProfileCompleteness,
}

/// Tiered budget scoring against the project's price range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetScoring {
    pub exact_match: f64,
    #[serde(rename = "within10Percent")]
    pub within_10_percent: f64,
    #[serde(rename = "within25Percent")]
    pub within_25_percent: f64,
    #[serde(rename = "over25Percent")]
    pub over_25_percent: f64,
}

/// Inclusive bounds of a grade. Adjacent ranges share their boundary value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeRange {
    pub min: f64,
    pub max: f64,
}

/// Response window in hours per grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaThresholds {
    #[serde(rename = "scoreA")]
    pub score_a: u32,
    #[serde(rename = "scoreB")]
    pub score_b: u32,
    #[serde(rename = "scoreC")]
    pub score_c: u32,
    #[serde(rename = "scoreD")]
    pub score_d: u32,
}

impl SlaThresholds {
    pub fn hours_for(&self, grade: LeadGrade) -> u32 {
        match grade {
            LeadGrade::A => self.score_a,
            LeadGrade::B => self.score_b,
            LeadGrade::C => self.score_c,
            LeadGrade::D => self.score_d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementScoring {
    /// Message length (characters) from which a message counts as detailed.
    pub detailed_message_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadScoringConfig {
    pub name: String,
    pub weights: BTreeMap<LeadDimension, f64>,
    pub budget_scoring: BudgetScoring,
    pub timeline_scoring: BTreeMap<Timeframe, f64>,
    pub financing_scoring: BTreeMap<FinancingType, f64>,
    pub source_scoring: BTreeMap<LeadSource, f64>,
    pub engagement: EngagementScoring,
    pub score_ranges: BTreeMap<LeadGrade, GradeRange>,
    pub sla_thresholds: SlaThresholds,
}

impl LeadScoringConfig {
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            weights: BTreeMap::from([
                (LeadDimension::BudgetMatch, 30.0),
                (LeadDimension::TimelineMatch, 25.0),
                (LeadDimension::FinancingType, 25.0),
                (LeadDimension::ProfileCompleteness, 20.0),
            ]),
            budget_scoring: BudgetScoring {
                exact_match: 100.0,
                within_10_percent: 80.0,
                within_25_percent: 50.0,
                over_25_percent: 20.0,
            },
            timeline_scoring: BTreeMap::from([
                (Timeframe::Immediate, 100.0),
                (Timeframe::WithinThreeMonths, 80.0),
                (Timeframe::WithinSixMonths, 60.0),
                (Timeframe::WithinYear, 40.0),
                (Timeframe::Exploring, 20.0),
            ]),
            financing_scoring: BTreeMap::from([
                (FinancingType::Cash, 100.0),
                (FinancingType::MortgagePreApproved, 85.0),
                (FinancingType::Mortgage, 60.0),
                (FinancingType::Installments, 50.0),
                (FinancingType::Undecided, 20.0),
            ]),
            source_scoring: BTreeMap::from([
                (LeadSource::Referral, 100.0),
                (LeadSource::Website, 80.0),
                (LeadSource::Whatsapp, 75.0),
                (LeadSource::Marketplace, 70.0),
                (LeadSource::SocialMedia, 60.0),
                (LeadSource::Other, 40.0),
            ]),
            engagement: EngagementScoring {
                detailed_message_chars: 40,
            },
            score_ranges: BTreeMap::from([
                (LeadGrade::A, GradeRange { min: 80.0, max: 100.0 }),
                (LeadGrade::B, GradeRange { min: 60.0, max: 80.0 }),
                (LeadGrade::C, GradeRange { min: 40.0, max: 60.0 }),
                (LeadGrade::D, GradeRange { min: 0.0, max: 40.0 }),
            ]),
            sla_thresholds: SlaThresholds {
                score_a: 2,
                score_b: 6,
                score_c: 24,
                score_d: 48,
            },
        }
    }

    pub fn weight(&self, dimension: LeadDimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Ranges ordered from the highest floor down.
    pub(crate) fn ranges_descending(&self) -> Vec<(LeadGrade, GradeRange)> {
        let mut ranges: Vec<_> = self
            .score_ranges
            .iter()
            .map(|(grade, range)| (*grade, *range))
            .collect();
        ranges.sort_by(|a, b| b.1.min.total_cmp(&a.1.min));
        ranges
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("config name must not be empty"));
        }

        if self
            .weights
            .values()
            .any(|weight| !weight.is_finite() || *weight < 0.0)
        {
            return Err(EngineError::validation(
                "lead weights must be non-negative numbers",
            ));
        }
        if self.total_weight() <= 0.0 {
            return Err(EngineError::validation("lead weights must not all be zero"));
        }

        let budget = &self.budget_scoring;
        for value in [
            budget.exact_match,
            budget.within_10_percent,
            budget.within_25_percent,
            budget.over_25_percent,
        ] {
            check_points("budgetScoring", value)?;
        }

        for timeframe in Timeframe::ALL {
            let value = self.timeline_scoring.get(&timeframe).ok_or_else(|| {
                EngineError::validation(format!("timelineScoring is missing {timeframe:?}"))
            })?;
            check_points("timelineScoring", *value)?;
        }
        for financing in FinancingType::ALL {
            let value = self.financing_scoring.get(&financing).ok_or_else(|| {
                EngineError::validation(format!("financingScoring is missing {financing:?}"))
            })?;
            check_points("financingScoring", *value)?;
        }
        for source in LeadSource::ALL {
            let value = self.source_scoring.get(&source).ok_or_else(|| {
                EngineError::validation(format!("sourceScoring is missing {source:?}"))
            })?;
            check_points("sourceScoring", *value)?;
        }

        self.validate_ranges()
    }

    /// Ranges must tile `[0, 100]`: lowest starts at 0, highest ends at 100, and each range
    /// starts exactly where the one below it ends.
    fn validate_ranges(&self) -> Result<(), EngineError> {
        if self.score_ranges.is_empty() {
            return Err(EngineError::validation("scoreRanges must not be empty"));
        }

        let mut ascending = self.ranges_descending();
        ascending.reverse();

        for (grade, range) in &ascending {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min >= range.max {
                return Err(EngineError::validation(format!(
                    "scoreRanges.{grade} must have min < max"
                )));
            }
        }

        let (lowest_grade, lowest) = ascending[0];
        if lowest.min != 0.0 {
            return Err(EngineError::validation(format!(
                "scoreRanges.{lowest_grade} must start at 0"
            )));
        }
        let (highest_grade, highest) = ascending[ascending.len() - 1];
        if highest.max != 100.0 {
            return Err(EngineError::validation(format!(
                "scoreRanges.{highest_grade} must end at 100"
            )));
        }

        for pair in ascending.windows(2) {
            let (lower_grade, lower) = pair[0];
            let (upper_grade, upper) = pair[1];
            if upper.min != lower.max {
                return Err(EngineError::validation(format!(
                    "scoreRanges.{lower_grade} and scoreRanges.{upper_grade} leave a gap or overlap"
                )));
            }
        }

        Ok(())
    }
}

fn check_points(table: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::validation(format!(
            "{table} values must lie within 0..=100"
        )))
    }
}

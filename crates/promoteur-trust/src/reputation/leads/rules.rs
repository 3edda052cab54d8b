use std::collections::BTreeMap;
use std::sync::Arc;

use super::domain::{LeadContact, LeadGrade, LeadScore, LeadScoreDetails, LeadSubmission};
use crate::reputation::config_store::{LeadDimension, LeadScoringConfig};
use crate::reputation::domain::round2;
use crate::reputation::error::EngineError;

/// Deterministic lead grader bound to one configuration snapshot.
#[derive(Debug, Clone)]
pub struct LeadScoringEngine {
    config: Arc<LeadScoringConfig>,
}

impl LeadScoringEngine {
    pub fn new(config: Arc<LeadScoringConfig>) -> Self {
        Self { config }
    }

    pub fn score(&self, submission: &LeadSubmission) -> Result<LeadScore, EngineError> {
        let config = self.config.as_ref();

        let budget = submission
            .budget
            .ok_or_else(|| EngineError::validation("lead budget is required for scoring"))?;
        let timeframe = submission
            .timeframe
            .ok_or_else(|| EngineError::validation("lead timeframe is required for scoring"))?;
        let financing = submission
            .financing
            .ok_or_else(|| EngineError::validation("lead financing type is required for scoring"))?;

        let pricing = &submission.project;
        if pricing.price_from == 0 {
            return Err(EngineError::validation(format!(
                "project {} has no starting price",
                pricing.project_id
            )));
        }
        let price_to = pricing.price_to.unwrap_or(pricing.price_from);
        if price_to < pricing.price_from {
            return Err(EngineError::validation(format!(
                "project {} price range is inverted",
                pricing.project_id
            )));
        }

        let budget_match = self.budget_match(budget, pricing.price_from, price_to);
        let timeline_match = lookup(&config.timeline_scoring, &timeframe);
        let financing_score = lookup(&config.financing_scoring, &financing);
        let profile_completeness = profile_completeness(&submission.contact);
        let source_score = lookup(&config.source_scoring, &submission.source);
        let engagement_level = (source_score + self.message_score(&submission.contact)) / 2.0;
        // Engagement and source feed the profile dimension.
        let profile_dimension = (profile_completeness + engagement_level) / 2.0;

        let weighted = [
            (LeadDimension::BudgetMatch, budget_match),
            (LeadDimension::TimelineMatch, timeline_match),
            (LeadDimension::FinancingType, financing_score),
            (LeadDimension::ProfileCompleteness, profile_dimension),
        ];
        let total_weight = config.total_weight();
        let composite = if total_weight > 0.0 {
            weighted
                .iter()
                .map(|(dimension, value)| value * config.weight(*dimension))
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };
        let composite = round2(composite.clamp(0.0, 100.0));

        let grade = self.grade_for(composite);
        Ok(LeadScore {
            grade,
            composite,
            details: LeadScoreDetails {
                budget_match: as_points(budget_match),
                timeline_match: as_points(timeline_match),
                engagement_level: as_points(engagement_level),
                profile_completeness: as_points(profile_completeness),
            },
            sla_hours: config.sla_thresholds.hours_for(grade),
        })
    }

    /// Highest range whose floor the composite reaches, so a boundary value takes the
    /// higher grade.
    pub fn grade_for(&self, composite: f64) -> LeadGrade {
        let ranges = self.config.ranges_descending();
        ranges
            .iter()
            .find(|(_, range)| composite >= range.min)
            .or_else(|| ranges.last())
            .map(|(grade, _)| *grade)
            .unwrap_or(LeadGrade::D)
    }

    fn budget_match(&self, budget: u64, price_from: u64, price_to: u64) -> f64 {
        let scoring = &self.config.budget_scoring;
        let deviation = if budget < price_from {
            (price_from - budget) as f64 / price_from as f64
        } else if budget > price_to {
            (budget - price_to) as f64 / price_to as f64
        } else {
            return scoring.exact_match;
        };

        if deviation <= 0.10 {
            scoring.within_10_percent
        } else if deviation <= 0.25 {
            scoring.within_25_percent
        } else {
            scoring.over_25_percent
        }
    }

    fn message_score(&self, contact: &LeadContact) -> f64 {
        let detailed = self.config.engagement.detailed_message_chars;
        match contact.message.as_deref().map(str::trim) {
            Some(message) if message.chars().count() >= detailed => 100.0,
            Some(message) if !message.is_empty() => 50.0,
            _ => 0.0,
        }
    }
}

fn lookup<K: Ord>(table: &BTreeMap<K, f64>, key: &K) -> f64 {
    table.get(key).copied().unwrap_or(0.0)
}

fn profile_completeness(contact: &LeadContact) -> f64 {
    let fields = contact.optional_fields();
    let filled = fields
        .iter()
        .filter(|field| field.is_some_and(|value| !value.trim().is_empty()))
        .count();
    filled as f64 / fields.len() as f64 * 100.0
}

fn as_points(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    AdjustmentKind, ComplianceOverlay, GamingSignal, PromoteurActivity, ScoreAdjustment,
    TrustScoreOutcome, TrustScoreSnapshot,
};
use super::{factors, gaming};
use crate::reputation::config_store::TrustScoreConfig;
use crate::reputation::domain::round2;

/// Everything a single computation reads, gathered before it starts.
#[derive(Debug, Clone, Copy)]
pub struct TrustInputs<'a> {
    pub activity: &'a PromoteurActivity,
    pub overlay: ComplianceOverlay,
    /// Committed snapshots from the score-jump window, any order.
    pub recent_snapshots: &'a [TrustScoreSnapshot],
}

/// Stateless calculator bound to one configuration snapshot.
#[derive(Debug, Clone)]
pub struct TrustScoreCalculator {
    config: Arc<TrustScoreConfig>,
}

impl TrustScoreCalculator {
    pub fn new(config: Arc<TrustScoreConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrustScoreConfig {
        &self.config
    }

    pub fn compute(&self, inputs: TrustInputs<'_>, now: DateTime<Utc>) -> TrustScoreOutcome {
        let config = self.config.as_ref();
        let activity = inputs.activity;

        let breakdown = factors::factor_breakdown(activity, config, now);
        let weighted_base: f64 = breakdown.iter().map(|entry| entry.points).sum();

        let mut adjustments = factors::adjustments(activity, inputs.overlay, config, now);
        let provisional = clamp_score(weighted_base + sum_points(&adjustments));

        let detection = &config.gaming_detection;
        let mut gaming_signals = Vec::new();
        if detection.enabled {
            let since = now - Duration::days(config.penalties.lookback_days);
            gaming_signals = gaming::cadence_signals(&activity.update_timestamps, since, detection);
            gaming_signals.extend(gaming::score_jump(
                provisional,
                inputs.recent_snapshots,
                now,
                detection,
            ));
            // One penalty however many signals fired.
            if !gaming_signals.is_empty() {
                adjustments.push(ScoreAdjustment {
                    kind: AdjustmentKind::Gaming,
                    points: -detection.penalty,
                    notes: describe_signals(&gaming_signals),
                });
            }
        }

        let score = clamp_score(weighted_base + sum_points(&adjustments));

        TrustScoreOutcome {
            promoteur_id: activity.promoteur_id.clone(),
            score,
            weighted_base: round2(weighted_base),
            breakdown: breakdown
                .into_iter()
                .map(|mut entry| {
                    entry.points = round2(entry.points);
                    entry
                })
                .collect(),
            adjustments,
            gaming_signals,
            computed_at: now,
        }
    }

    /// Publication gate: the score must reach the project type's configured minimum.
    pub fn is_eligible(&self, project_type: &str, score: u8) -> bool {
        score >= self.config.threshold_for(project_type)
    }
}

fn sum_points(adjustments: &[ScoreAdjustment]) -> f64 {
    adjustments.iter().map(|entry| entry.points).sum()
}

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn describe_signals(signals: &[GamingSignal]) -> String {
    signals
        .iter()
        .map(|signal| match signal {
            GamingSignal::BurstDay { date, updates } => format!("{updates} updates on {date}"),
            GamingSignal::RapidSuccession { occurrences } => {
                format!("{occurrences} update(s) inside the minimum interval")
            }
            GamingSignal::ScoreJump { from, to } => format!("score jumped {from} -> {to}"),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

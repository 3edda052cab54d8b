use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::domain::{GamingSignal, TrustScoreSnapshot};
use crate::reputation::config_store::GamingDetection;

/// Update-cadence heuristics over the updates published at or after `since`.
pub(crate) fn cadence_signals(
    updates: &[DateTime<Utc>],
    since: DateTime<Utc>,
    detection: &GamingDetection,
) -> Vec<GamingSignal> {
    let mut recent: Vec<DateTime<Utc>> =
        updates.iter().copied().filter(|at| *at >= since).collect();
    recent.sort();

    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for at in &recent {
        *per_day.entry(at.date_naive()).or_default() += 1;
    }

    let mut signals: Vec<GamingSignal> = per_day
        .into_iter()
        .filter(|(_, updates)| *updates > detection.max_daily_updates)
        .map(|(date, updates)| GamingSignal::BurstDay { date, updates })
        .collect();

    let min_gap = Duration::seconds((detection.min_update_interval_hours * 3600.0) as i64);
    let occurrences = recent
        .windows(2)
        .filter(|pair| pair[1] - pair[0] < min_gap)
        .count() as u32;
    if occurrences > 0 {
        signals.push(GamingSignal::RapidSuccession { occurrences });
    }

    signals
}

/// Flags a provisional score that climbed more than allowed above the lowest recent
/// snapshot.
pub(crate) fn score_jump(
    provisional: u8,
    recent: &[TrustScoreSnapshot],
    now: DateTime<Utc>,
    detection: &GamingDetection,
) -> Option<GamingSignal> {
    let window_start = now - Duration::days(detection.score_jump_window_days);
    let lowest = recent
        .iter()
        .filter(|snapshot| snapshot.created_at >= window_start)
        .map(|snapshot| snapshot.score)
        .min()?;

    (provisional > lowest.saturating_add(detection.max_score_jump)).then_some(
        GamingSignal::ScoreJump {
            from: lowest,
            to: provisional,
        },
    )
}

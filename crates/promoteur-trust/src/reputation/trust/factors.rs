use chrono::{DateTime, Duration, Utc};

use super::domain::{
    AdjustmentKind, ComplianceOverlay, FactorContribution, KycStatus, PromoteurActivity,
    ScoreAdjustment,
};
use crate::reputation::config_store::{TrustFactor, TrustScoreConfig};
use crate::reputation::domain::round2;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Weighted contribution of every factor. Weights are normalised by their actual total.
pub(crate) fn factor_breakdown(
    activity: &PromoteurActivity,
    config: &TrustScoreConfig,
    now: DateTime<Utc>,
) -> Vec<FactorContribution> {
    let total_weight = config.total_weight();

    TrustFactor::ALL
        .iter()
        .map(|factor| {
            let (sub_score, notes) = sub_score(*factor, activity, config, now);
            let weight = config.weight(*factor);
            let points = if total_weight > 0.0 {
                sub_score * weight / total_weight
            } else {
                0.0
            };
            FactorContribution {
                factor: *factor,
                sub_score: round2(sub_score),
                weight,
                points,
                notes,
            }
        })
        .collect()
}

fn sub_score(
    factor: TrustFactor,
    activity: &PromoteurActivity,
    config: &TrustScoreConfig,
    now: DateTime<Utc>,
) -> (f64, String) {
    match factor {
        TrustFactor::KycVerification => match activity.kyc_status {
            KycStatus::Verified => (100.0, "KYC verified".to_string()),
            KycStatus::Pending => (40.0, "KYC pending review".to_string()),
            KycStatus::NotSubmitted => (0.0, "KYC not submitted".to_string()),
            KycStatus::Rejected => (0.0, "KYC rejected".to_string()),
        },
        TrustFactor::DocumentsComplete => {
            let docs = activity.documents;
            let ratio = ratio(docs.verified, docs.total);
            (
                ratio * 100.0,
                format!("{} of {} documents verified", docs.verified, docs.total),
            )
        }
        TrustFactor::RegularUpdates => match last_update(activity) {
            None => (0.0, "no project updates published".to_string()),
            Some(last) => {
                let days = days_between(last, now);
                let frequency = &config.update_frequency;
                let score = if days <= frequency.recommended_days as f64 {
                    100.0
                } else if days <= frequency.minimum as f64 {
                    50.0
                } else {
                    0.0
                };
                (score, format!("last update {days:.1} days ago"))
            }
        },
        TrustFactor::ResponseTime => match activity.responses.average_hours {
            None => (0.0, "no lead responses yet".to_string()),
            Some(hours) => {
                let bands = &config.response_time;
                let score = if hours <= bands.excellent_hours {
                    100.0
                } else if hours <= bands.good_hours {
                    70.0
                } else if hours <= bands.acceptable_hours {
                    40.0
                } else {
                    10.0
                };
                (score, format!("average first response {hours:.1}h"))
            }
        },
        TrustFactor::ProjectCompletion => {
            let projects = activity.projects;
            (
                ratio(projects.completed, projects.total) * 100.0,
                format!("{} of {} projects delivered", projects.completed, projects.total),
            )
        }
        TrustFactor::ClientReviews => {
            let reviews = activity.reviews;
            if reviews.count == 0 {
                (0.0, "no client reviews".to_string())
            } else {
                let rating = reviews.average_rating.clamp(0.0, 5.0);
                (
                    rating / 5.0 * 100.0,
                    format!("{rating:.1}/5 over {} reviews", reviews.count),
                )
            }
        }
        TrustFactor::Badges => {
            if config.badge_cap == 0 {
                return (0.0, "badges not scored".to_string());
            }
            let counted = activity.active_badges.min(config.badge_cap);
            (
                f64::from(counted) / f64::from(config.badge_cap) * 100.0,
                format!("{counted} of {} badges counted", config.badge_cap),
            )
        }
    }
}

/// Bonuses and penalties applied on top of the weighted base, gaming excluded.
pub(crate) fn adjustments(
    activity: &PromoteurActivity,
    overlay: ComplianceOverlay,
    config: &TrustScoreConfig,
    now: DateTime<Utc>,
) -> Vec<ScoreAdjustment> {
    let bonus = &config.bonus_points;
    let penalties = &config.penalties;
    let mut adjustments = Vec::new();

    if activity.has_verified_badge {
        adjustments.push(bonus_entry(
            AdjustmentKind::VerifiedBadge,
            bonus.verified_badge,
            "verified badge".to_string(),
        ));
    }
    if activity.profile_complete {
        adjustments.push(bonus_entry(
            AdjustmentKind::CompleteProfile,
            bonus.complete_profile,
            "profile complete".to_string(),
        ));
    }
    let streak = activity.responses.on_time_streak;
    if bonus.quick_responder_streak > 0 && streak >= bonus.quick_responder_streak {
        adjustments.push(bonus_entry(
            AdjustmentKind::QuickResponder,
            bonus.quick_responder,
            format!("{streak} consecutive on-time responses"),
        ));
    }
    let weeks = consecutive_update_weeks(&activity.update_timestamps, now);
    if bonus.consistent_updater_weeks > 0 && weeks >= bonus.consistent_updater_weeks {
        adjustments.push(bonus_entry(
            AdjustmentKind::ConsistentUpdater,
            bonus.consistent_updater,
            format!("updates in each of the last {weeks} weeks"),
        ));
    }
    if overlay.upheld_appeals > 0 {
        adjustments.push(bonus_entry(
            AdjustmentKind::AppealUpheld,
            bonus.appeal_upheld * f64::from(overlay.upheld_appeals),
            format!("{} appeal(s) upheld", overlay.upheld_appeals),
        ));
    }

    if overlay.missed_sla > 0 {
        adjustments.push(penalty_entry(
            AdjustmentKind::MissedSla,
            penalties.missed_sla * f64::from(overlay.missed_sla),
            format!("{} missed lead SLA(s)", overlay.missed_sla),
        ));
    }
    if activity.documents.rejected > 0 {
        adjustments.push(penalty_entry(
            AdjustmentKind::RejectedDocuments,
            penalties.rejected_document * f64::from(activity.documents.rejected),
            format!("{} rejected document(s)", activity.documents.rejected),
        ));
    }
    if activity.complaints > 0 {
        adjustments.push(penalty_entry(
            AdjustmentKind::Complaints,
            penalties.complaint * f64::from(activity.complaints),
            format!("{} complaint(s)", activity.complaints),
        ));
    }

    // Accounts that never published are measured from registration.
    let since = last_update(activity).unwrap_or(activity.registered_at);
    let gap_days = days_between(since, now);
    let frequency = &config.update_frequency;
    if gap_days > frequency.minimum as f64 {
        adjustments.push(penalty_entry(
            AdjustmentKind::NoUpdatesMonth,
            penalties.no_updates_month,
            format!("no update for {gap_days:.0} days"),
        ));
    } else if gap_days > frequency.recommended_days as f64 {
        adjustments.push(penalty_entry(
            AdjustmentKind::NoUpdatesWeek,
            penalties.no_updates_week,
            format!("no update for {gap_days:.0} days"),
        ));
    }

    adjustments
}

fn bonus_entry(kind: AdjustmentKind, points: f64, notes: String) -> ScoreAdjustment {
    ScoreAdjustment {
        kind,
        points,
        notes,
    }
}

fn penalty_entry(kind: AdjustmentKind, points: f64, notes: String) -> ScoreAdjustment {
    ScoreAdjustment {
        kind,
        points: -points,
        notes,
    }
}

/// Consecutive 7-day windows, counted back from `now`, each holding at least one update.
pub(crate) fn consecutive_update_weeks(updates: &[DateTime<Utc>], now: DateTime<Utc>) -> u32 {
    let mut weeks = 0u32;
    loop {
        let end = now - Duration::weeks(i64::from(weeks));
        let start = end - Duration::weeks(1);
        let covered = updates.iter().any(|at| *at > start && *at <= end);
        if !covered {
            return weeks;
        }
        weeks += 1;
    }
}

fn last_update(activity: &PromoteurActivity) -> Option<DateTime<Utc>> {
    activity.update_timestamps.iter().max().copied()
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (f64::from(part) / f64::from(whole)).min(1.0)
    }
}

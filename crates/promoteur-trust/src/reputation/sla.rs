//! Pure deadline arithmetic. Nothing here mutates state; sweeps persist verdicts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::appeals::domain::Appeal;
use super::cases::domain::CaseRecord;
use super::domain::round2;
use super::leads::domain::LeadRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaVerdict {
    pub breached: bool,
    pub hours_elapsed: f64,
    pub hours_allowed: f64,
}

impl SlaVerdict {
    fn measure(start: DateTime<Utc>, end: DateTime<Utc>, allowed: Duration) -> Self {
        let elapsed = end - start;
        Self {
            breached: elapsed > allowed,
            hours_elapsed: round2(hours(elapsed)),
            hours_allowed: round2(hours(allowed)),
        }
    }
}

fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

/// Time to first contact against the grade's window. Answered leads are judged on their
/// response time, so the verdict stops moving once a response is logged.
pub fn check_lead_sla(lead: &LeadRecord, now: DateTime<Utc>) -> SlaVerdict {
    let end = lead.first_response_at.unwrap_or(now);
    SlaVerdict::measure(
        lead.created_at,
        end,
        Duration::hours(i64::from(lead.sla_hours)),
    )
}

/// Cases are judged against their stored deadline until resolved or closed.
pub fn check_case_sla(case: &CaseRecord, now: DateTime<Utc>) -> SlaVerdict {
    let end = case
        .resolution
        .as_ref()
        .map(|resolution| resolution.resolved_at)
        .or(case.closed_at)
        .unwrap_or(now);
    SlaVerdict::measure(case.created_at, end, case.sla_deadline - case.created_at)
}

/// Appeals are judged against the window of their current level only.
pub fn check_appeal_deadline(appeal: &Appeal, now: DateTime<Utc>) -> SlaVerdict {
    let start = appeal.window_opened_at();
    let end = appeal.resolved_at.unwrap_or(now);
    SlaVerdict::measure(start, end, appeal.deadline - start)
}

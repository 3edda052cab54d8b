use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::cases::domain::CasePriority;
use super::sanctions::domain::SanctionType;

/// Business rules that are not admin-managed score configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompliancePolicy {
    pub escalation: EscalationPolicy,
    pub case_sla: CaseSlaHours,
    pub appeals: AppealWindows,
}

/// Automatic escalation from SLA breaches in a rolling window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub breach_window_days: i64,
    pub warning_after: u32,
    pub suspension_after: u32,
    pub warning_days: i64,
    pub suspension_days: i64,
    /// Unrevoked temporary suspensions in the lookback after which the next one is permanent.
    pub permanent_after_suspensions: u32,
    pub suspension_lookback_days: i64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            breach_window_days: 30,
            warning_after: 2,
            suspension_after: 3,
            warning_days: 30,
            suspension_days: 7,
            permanent_after_suspensions: 2,
            suspension_lookback_days: 365,
        }
    }
}

impl EscalationPolicy {
    pub fn breach_window(&self) -> Duration {
        Duration::days(self.breach_window_days)
    }

    /// Sanction warranted by `breaches` in the window, given prior suspensions.
    pub fn target_for(&self, breaches: u32, prior_suspensions: u32) -> Option<SanctionType> {
        if breaches >= self.suspension_after {
            if prior_suspensions >= self.permanent_after_suspensions {
                Some(SanctionType::PermanentSuspension)
            } else {
                Some(SanctionType::TemporarySuspension)
            }
        } else if breaches >= self.warning_after {
            Some(SanctionType::Warning)
        } else {
            None
        }
    }

    pub fn duration_for(&self, sanction_type: SanctionType) -> Option<Duration> {
        match sanction_type {
            SanctionType::Warning => Some(Duration::days(self.warning_days)),
            SanctionType::TemporarySuspension => Some(Duration::days(self.suspension_days)),
            SanctionType::PermanentSuspension | SanctionType::Restriction => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSlaHours {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

impl Default for CaseSlaHours {
    fn default() -> Self {
        Self {
            low: 168,
            medium: 72,
            high: 24,
            critical: 4,
        }
    }
}

impl CaseSlaHours {
    pub fn window_for(&self, priority: CasePriority) -> Duration {
        let hours = match priority {
            CasePriority::Low => self.low,
            CasePriority::Medium => self.medium,
            CasePriority::High => self.high,
            CasePriority::Critical => self.critical,
        };
        Duration::hours(hours)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealWindows {
    pub level_one_hours: i64,
    pub level_two_days: i64,
}

impl Default for AppealWindows {
    fn default() -> Self {
        Self {
            level_one_hours: 72,
            level_two_days: 7,
        }
    }
}

impl AppealWindows {
    pub fn for_level(&self, level: u8) -> Duration {
        if level >= 2 {
            Duration::days(self.level_two_days)
        } else {
            Duration::hours(self.level_one_hours)
        }
    }
}

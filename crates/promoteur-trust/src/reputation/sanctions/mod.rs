//! Sanction ladder, manual sanctions and derived standing.

pub mod domain;
mod service;

pub use domain::{
    effective_standing, fixed_term_end, is_lighter_replacement, sanction_status,
    EffectiveStanding, ManualSanctionRequest, Sanction, SanctionOrigin, SanctionStatus,
    SanctionType, SeverityLevel, StoredStanding, TargetType, Violation, ViolationKind,
    MAX_SANCTION_DAYS,
};
pub use service::{SanctionService, ViolationOutcome, ViolationReport};

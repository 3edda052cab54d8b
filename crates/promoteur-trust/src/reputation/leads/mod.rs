pub mod domain;
mod rules;
mod service;

pub use domain::{
    FinancingType, LeadContact, LeadGrade, LeadRecord, LeadScore, LeadScoreDetails, LeadSource,
    LeadSubmission, ProjectPricing, Timeframe,
};
pub use rules::LeadScoringEngine;
pub use service::LeadService;

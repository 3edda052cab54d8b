use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reputation::domain::{LeadId, ProjectId, PromoteurId};

/// Quality grade driving routing priority. `A` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeadGrade {
    A,
    B,
    C,
    D,
}

impl LeadGrade {
    pub const ALL: [LeadGrade; 4] = [LeadGrade::A, LeadGrade::B, LeadGrade::C, LeadGrade::D];
}

impl fmt::Display for LeadGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeadGrade::A => "A",
            LeadGrade::B => "B",
            LeadGrade::C => "C",
            LeadGrade::D => "D",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Timeframe {
    Immediate,
    WithinThreeMonths,
    WithinSixMonths,
    WithinYear,
    Exploring,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::Immediate,
        Timeframe::WithinThreeMonths,
        Timeframe::WithinSixMonths,
        Timeframe::WithinYear,
        Timeframe::Exploring,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinancingType {
    Cash,
    MortgagePreApproved,
    Mortgage,
    Installments,
    Undecided,
}

impl FinancingType {
    pub const ALL: [FinancingType; 5] = [
        FinancingType::Cash,
        FinancingType::MortgagePreApproved,
        FinancingType::Mortgage,
        FinancingType::Installments,
        FinancingType::Undecided,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadSource {
    Referral,
    Website,
    Whatsapp,
    SocialMedia,
    Marketplace,
    Other,
}

impl LeadSource {
    pub const ALL: [LeadSource; 6] = [
        LeadSource::Referral,
        LeadSource::Website,
        LeadSource::Whatsapp,
        LeadSource::SocialMedia,
        LeadSource::Marketplace,
        LeadSource::Other,
    ];
}

/// Price range of the project the lead asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPricing {
    pub project_id: ProjectId,
    pub price_from: u64,
    pub price_to: Option<u64>,
}

/// Contact details. Every optional field counts toward profile completeness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadContact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub interested_typology: Option<String>,
    pub preferred_contact_time: Option<String>,
    pub city: Option<String>,
    pub message: Option<String>,
}

impl LeadContact {
    pub(crate) fn optional_fields(&self) -> [Option<&str>; 5] {
        [
            self.whatsapp.as_deref(),
            self.interested_typology.as_deref(),
            self.preferred_contact_time.as_deref(),
            self.city.as_deref(),
            self.message.as_deref(),
        ]
    }
}

/// Inbound buyer inquiry as received from the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub promoteur_id: PromoteurId,
    pub project: ProjectPricing,
    pub budget: Option<u64>,
    pub timeframe: Option<Timeframe>,
    pub financing: Option<FinancingType>,
    pub source: LeadSource,
    pub contact: LeadContact,
}

/// The four persisted sub-scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadScoreDetails {
    pub budget_match: u8,
    pub timeline_match: u8,
    pub engagement_level: u8,
    pub profile_completeness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub grade: LeadGrade,
    pub composite: f64,
    pub details: LeadScoreDetails,
    pub sla_hours: u32,
}

/// Stored lead. Score fields are written once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: LeadId,
    pub promoteur_id: PromoteurId,
    pub project_id: ProjectId,
    pub grade: LeadGrade,
    pub composite_score: f64,
    pub details: LeadScoreDetails,
    pub sla_hours: u32,
    pub created_at: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    /// Settled by the SLA sweep: `Some(false)` once a breach has been recorded.
    pub response_sla_met: Option<bool>,
    pub contact: LeadContact,
}

impl LeadRecord {
    pub fn awaiting_sla_verdict(&self) -> bool {
        self.response_sla_met.is_none()
    }
}

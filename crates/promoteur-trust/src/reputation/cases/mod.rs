pub mod domain;
mod service;

pub use domain::{
    CaseNumber, CasePriority, CaseRecord, CaseResolution, CaseStatus, CaseSubject, CaseType,
    InvestigationNote, NewCase,
};
pub use service::{CaseSanction, CaseService, ResolveCase};

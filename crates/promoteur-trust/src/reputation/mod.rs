//! Reputation and compliance engine for promoteurs on the marketplace.
//!
//! Scoring engines are pure functions of a resolved config snapshot. State machines
//! (sanctions, appeals, cases) persist through the storage traits in [`repository`], and
//! every automatic mutation leaves an audit entry behind.

pub mod appeals;
pub mod batch;
pub mod cases;
pub mod config_store;
pub mod domain;
pub(crate) mod effects;
pub mod engine;
pub mod error;
mod jobs;
pub mod leads;
pub mod memory;
pub mod policy;
pub mod repository;
pub mod router;
pub mod sanctions;
pub mod sla;
pub mod trust;

#[cfg(test)]
mod tests;

pub use batch::{BatchError, BatchReport, BatchRunner, ItemFailure};
pub use domain::{
    Actor, AppealId, CaseId, LeadId, PromoteurId, ProjectId, SanctionId, SnapshotId, ViolationId,
};
pub use engine::ReputationEngine;
pub use error::{EngineError, RepositoryError};
pub use jobs::{Job, JobReport, SlaSweepReport};
pub use memory::{InMemoryDirectory, InMemoryReputationStore, RecordingNotifier};
pub use policy::{AppealWindows, CaseSlaHours, CompliancePolicy, EscalationPolicy};
pub use repository::{
    AuditEntry, AuditSink, Notification, NotificationDispatcher, NotifyError, PromoteurDirectory,
    ReputationStore,
};
pub use router::reputation_router;

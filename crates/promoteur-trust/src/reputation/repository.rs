//! Storage seams. Every trait is synchronous and `Send + Sync` so services can share one
//! store behind an `Arc` and batch units can run on blocking worker threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::appeals::domain::Appeal;
use super::cases::domain::CaseRecord;
use super::config_store::{ConfigDocument, ConfigKind, ScoreConfig};
use super::domain::{Actor, AppealId, CaseId, LeadId, PromoteurId, SanctionId, SnapshotId};
use super::error::RepositoryError;
use super::leads::domain::LeadRecord;
use super::sanctions::domain::{Sanction, StoredStanding, Violation, ViolationKind};
use super::trust::domain::{PromoteurActivity, TrustScoreSnapshot};

pub trait ConfigRepository: Send + Sync {
    fn list_configs(&self, kind: Option<ConfigKind>) -> Result<Vec<ConfigDocument>, RepositoryError>;
    fn fetch_config(
        &self,
        kind: ConfigKind,
        name: &str,
    ) -> Result<Option<ConfigDocument>, RepositoryError>;
    fn active_config(&self, kind: ConfigKind) -> Result<Option<ConfigDocument>, RepositoryError>;
    /// Inserts or replaces by `(kind, name)`, bumping the version and keeping the active flag.
    fn upsert_config(
        &self,
        config: ScoreConfig,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, RepositoryError>;
    fn delete_config(&self, kind: ConfigKind, name: &str) -> Result<ConfigDocument, RepositoryError>;
    /// Marks `name` active and every other config of `kind` inactive in one step.
    fn activate_exclusive(
        &self,
        kind: ConfigKind,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, RepositoryError>;
}

/// Current trust score and its append-only history.
///
/// Snapshots are written ahead of the score update as drafts and only become visible to
/// readers once committed.
pub trait ScoreRepository: Send + Sync {
    fn trust_score(&self, promoteur: &PromoteurId) -> Result<Option<u8>, RepositoryError>;
    /// Returns the previous score, if any.
    fn update_trust_score(
        &self,
        promoteur: &PromoteurId,
        score: u8,
    ) -> Result<Option<u8>, RepositoryError>;
    fn insert_draft_snapshot(&self, snapshot: TrustScoreSnapshot) -> Result<(), RepositoryError>;
    fn commit_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError>;
    fn discard_draft_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError>;
    /// Committed snapshots at or after `since`, oldest first.
    fn snapshots_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreSnapshot>, RepositoryError>;
}

/// Read-only identity/project aggregates owned by the surrounding platform.
pub trait PromoteurDirectory: Send + Sync {
    fn promoteur_ids(&self) -> Result<Vec<PromoteurId>, RepositoryError>;
    fn activity(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Option<PromoteurActivity>, RepositoryError>;
}

pub trait LeadRepository: Send + Sync {
    fn insert_lead(&self, lead: LeadRecord) -> Result<LeadRecord, RepositoryError>;
    fn fetch_lead(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError>;
    /// Sets the first contact time; a lead already answered keeps its original time.
    fn record_first_response(
        &self,
        id: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError>;
    /// Settles the SLA verdict once. Returns `false` when a verdict was already stored.
    fn settle_response_sla(&self, id: &LeadId, met: bool) -> Result<bool, RepositoryError>;
    fn leads_awaiting_verdict(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Vec<LeadRecord>, RepositoryError>;
    fn promoteurs_with_unsettled_leads(&self) -> Result<Vec<PromoteurId>, RepositoryError>;
}

pub trait SanctionRepository: Send + Sync {
    fn insert_sanction(&self, sanction: Sanction) -> Result<Sanction, RepositoryError>;
    fn fetch_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, RepositoryError>;
    /// Optimistic write; the stored version must equal `expected_version`.
    fn update_sanction(
        &self,
        sanction: Sanction,
        expected_version: u64,
    ) -> Result<Sanction, RepositoryError>;
    fn sanctions_for(&self, promoteur: &PromoteurId) -> Result<Vec<Sanction>, RepositoryError>;
    /// Promoteurs with at least one sanction or a stored standing.
    fn sanctioned_promoteurs(&self) -> Result<Vec<PromoteurId>, RepositoryError>;
    fn record_violation(&self, violation: Violation) -> Result<(), RepositoryError>;
    fn violations_since(
        &self,
        promoteur: &PromoteurId,
        kind: ViolationKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Violation>, RepositoryError>;
    fn stored_standing(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Option<StoredStanding>, RepositoryError>;
    fn save_standing(
        &self,
        promoteur: &PromoteurId,
        standing: StoredStanding,
    ) -> Result<(), RepositoryError>;
}

pub trait CaseRepository: Send + Sync {
    /// Fails with `Conflict` when the case number is already taken.
    fn insert_case(&self, case: CaseRecord) -> Result<CaseRecord, RepositoryError>;
    fn fetch_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, RepositoryError>;
    fn update_case(
        &self,
        case: CaseRecord,
        expected_version: u64,
    ) -> Result<CaseRecord, RepositoryError>;
    /// Non-terminal cases whose breach has not been recorded yet.
    fn unbreached_open_cases(&self) -> Result<Vec<CaseRecord>, RepositoryError>;
    /// Writes the resolved case and the sanction it issues atomically. A stale
    /// `expected_version` writes nothing.
    fn commit_case_resolution(
        &self,
        case: CaseRecord,
        expected_version: u64,
        sanction: Option<Sanction>,
    ) -> Result<(CaseRecord, Option<Sanction>), RepositoryError>;
}

/// Dedicated per-year counter. Each call hands out a distinct, strictly increasing value.
pub trait CaseNumberSequence: Send + Sync {
    fn next_case_sequence(&self, year: i32) -> Result<u64, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanctionRevocation {
    pub sanction_id: SanctionId,
    pub expected_version: u64,
    pub revoked_by: String,
    pub revoked_at: DateTime<Utc>,
}

/// Sanction side of an appeal decision, committed together with the appeal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanctionChange {
    pub revoke: Option<SanctionRevocation>,
    pub replacement: Option<Sanction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedResolution {
    pub appeal: Appeal,
    pub revoked: Option<Sanction>,
    pub replacement: Option<Sanction>,
}

pub trait AppealRepository: Send + Sync {
    fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal, RepositoryError>;
    fn fetch_appeal(&self, id: &AppealId) -> Result<Option<Appeal>, RepositoryError>;
    fn update_appeal(&self, appeal: Appeal, expected_version: u64)
        -> Result<Appeal, RepositoryError>;
    fn open_appeals(&self) -> Result<Vec<Appeal>, RepositoryError>;
    fn open_appeal_for_sanction(
        &self,
        sanction: &SanctionId,
    ) -> Result<Option<Appeal>, RepositoryError>;
    /// Approved or partially approved appeals resolved at or after `since`.
    fn upheld_appeals_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;
    /// Writes the decided appeal and its sanction change atomically: either every version
    /// check passes and all records change, or nothing is written.
    fn commit_resolution(
        &self,
        appeal: Appeal,
        expected_version: u64,
        change: SanctionChange,
    ) -> Result<CommittedResolution, RepositoryError>;
}

/// Last fully processed entity id per batch job.
pub trait CheckpointStore: Send + Sync {
    fn checkpoint(&self, job: &str) -> Result<Option<String>, RepositoryError>;
    fn save_checkpoint(&self, job: &str, last_id: &str) -> Result<(), RepositoryError>;
    fn clear_checkpoint(&self, job: &str) -> Result<(), RepositoryError>;
}

/// Persisted audit record for every automatic or admin mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

pub trait AuditSink: Send + Sync {
    fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
    fn audit_trail(
        &self,
        entity: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError>;
}

/// Everything the engine persists, implemented by a single backing store.
pub trait ReputationStore:
    ConfigRepository
    + ScoreRepository
    + LeadRepository
    + SanctionRepository
    + CaseRepository
    + CaseNumberSequence
    + AppealRepository
    + CheckpointStore
    + AuditSink
{
}

impl<T> ReputationStore for T where
    T: ConfigRepository
        + ScoreRepository
        + LeadRepository
        + SanctionRepository
        + CaseRepository
        + CaseNumberSequence
        + AppealRepository
        + CheckpointStore
        + AuditSink
{
}

/// Outbound message handed to the delivery layer (email, WhatsApp, SMS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: String,
    pub template: String,
    pub payload: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Implementations enqueue and return; delivery happens elsewhere.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

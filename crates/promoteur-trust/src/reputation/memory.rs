//! In-process storage used by the API service, the CLI jobs and the test suites.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::appeals::domain::Appeal;
use super::cases::domain::{CaseNumber, CaseRecord};
use super::config_store::{ConfigDocument, ConfigKind, ScoreConfig};
use super::domain::{AppealId, CaseId, LeadId, PromoteurId, SanctionId, SnapshotId};
use super::error::RepositoryError;
use super::leads::domain::LeadRecord;
use super::repository::{
    AppealRepository, AuditEntry, AuditSink, CaseNumberSequence, CaseRepository, CheckpointStore,
    CommittedResolution, ConfigRepository, LeadRepository, Notification, NotificationDispatcher,
    NotifyError, PromoteurDirectory, SanctionChange, SanctionRepository, ScoreRepository,
};
use super::sanctions::domain::{Sanction, StoredStanding, Violation, ViolationKind};
use super::trust::domain::{PromoteurActivity, TrustScoreSnapshot};

#[derive(Debug, Clone)]
struct SnapshotRow {
    snapshot: TrustScoreSnapshot,
    committed: bool,
}

#[derive(Default)]
struct Tables {
    configs: BTreeMap<(ConfigKind, String), ConfigDocument>,
    trust_scores: HashMap<PromoteurId, u8>,
    snapshots: BTreeMap<SnapshotId, SnapshotRow>,
    leads: BTreeMap<LeadId, LeadRecord>,
    sanctions: BTreeMap<SanctionId, Sanction>,
    violations: Vec<Violation>,
    standings: BTreeMap<PromoteurId, StoredStanding>,
    cases: BTreeMap<CaseId, CaseRecord>,
    case_numbers: BTreeSet<CaseNumber>,
    appeals: BTreeMap<AppealId, Appeal>,
    checkpoints: HashMap<String, String>,
    audit: Vec<AuditEntry>,
}

/// Single-process store. Multi-record writes happen under one lock, which is what makes
/// appeal and case resolutions atomic here.
#[derive(Default)]
pub struct InMemoryReputationStore {
    tables: Mutex<Tables>,
    case_sequences: RwLock<HashMap<i32, Arc<AtomicU64>>>,
}

impl InMemoryReputationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft snapshots not yet committed or discarded.
    pub fn draft_snapshot_count(&self) -> Result<usize, RepositoryError> {
        Ok(self
            .tables()?
            .snapshots
            .values()
            .filter(|row| !row.committed)
            .count())
    }

    pub fn audit_log(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self.tables()?.audit.clone())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn check_version(stored: u64, expected: u64) -> Result<(), RepositoryError> {
    if stored == expected {
        Ok(())
    } else {
        Err(RepositoryError::VersionMismatch {
            expected,
            found: stored,
        })
    }
}

impl ConfigRepository for InMemoryReputationStore {
    fn list_configs(&self, kind: Option<ConfigKind>) -> Result<Vec<ConfigDocument>, RepositoryError> {
        Ok(self
            .tables()?
            .configs
            .values()
            .filter(|doc| kind.map_or(true, |kind| doc.kind() == kind))
            .cloned()
            .collect())
    }

    fn fetch_config(
        &self,
        kind: ConfigKind,
        name: &str,
    ) -> Result<Option<ConfigDocument>, RepositoryError> {
        Ok(self
            .tables()?
            .configs
            .get(&(kind, name.to_string()))
            .cloned())
    }

    fn active_config(&self, kind: ConfigKind) -> Result<Option<ConfigDocument>, RepositoryError> {
        Ok(self
            .tables()?
            .configs
            .values()
            .find(|doc| doc.kind() == kind && doc.is_active)
            .cloned())
    }

    fn upsert_config(
        &self,
        config: ScoreConfig,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, RepositoryError> {
        let mut tables = self.tables()?;
        let key = (config.kind(), config.name().to_string());
        let document = match tables.configs.get(&key) {
            Some(existing) => ConfigDocument {
                config,
                is_active: existing.is_active,
                version: existing.version + 1,
                updated_at: now,
            },
            None => ConfigDocument {
                config,
                is_active: false,
                version: 1,
                updated_at: now,
            },
        };
        tables.configs.insert(key, document.clone());
        Ok(document)
    }

    fn delete_config(&self, kind: ConfigKind, name: &str) -> Result<ConfigDocument, RepositoryError> {
        self.tables()?
            .configs
            .remove(&(kind, name.to_string()))
            .ok_or(RepositoryError::NotFound)
    }

    fn activate_exclusive(
        &self,
        kind: ConfigKind,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, RepositoryError> {
        let mut tables = self.tables()?;
        let key = (kind, name.to_string());
        if !tables.configs.contains_key(&key) {
            return Err(RepositoryError::NotFound);
        }

        let mut activated = None;
        for (doc_key, doc) in tables.configs.iter_mut() {
            if doc.kind() != kind {
                continue;
            }
            let active = *doc_key == key;
            if doc.is_active != active {
                doc.is_active = active;
                doc.version += 1;
                doc.updated_at = now;
            }
            if active {
                activated = Some(doc.clone());
            }
        }
        activated.ok_or(RepositoryError::NotFound)
    }
}

impl ScoreRepository for InMemoryReputationStore {
    fn trust_score(&self, promoteur: &PromoteurId) -> Result<Option<u8>, RepositoryError> {
        Ok(self.tables()?.trust_scores.get(promoteur).copied())
    }

    fn update_trust_score(
        &self,
        promoteur: &PromoteurId,
        score: u8,
    ) -> Result<Option<u8>, RepositoryError> {
        Ok(self.tables()?.trust_scores.insert(promoteur.clone(), score))
    }

    fn insert_draft_snapshot(&self, snapshot: TrustScoreSnapshot) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.snapshots.contains_key(&snapshot.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.snapshots.insert(
            snapshot.id.clone(),
            SnapshotRow {
                snapshot,
                committed: false,
            },
        );
        Ok(())
    }

    fn commit_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let row = tables.snapshots.get_mut(id).ok_or(RepositoryError::NotFound)?;
        row.committed = true;
        Ok(())
    }

    fn discard_draft_snapshot(&self, id: &SnapshotId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.snapshots.get(id) {
            Some(row) if row.committed => Err(RepositoryError::Conflict),
            Some(_) => {
                tables.snapshots.remove(id);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn snapshots_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrustScoreSnapshot>, RepositoryError> {
        let mut snapshots: Vec<TrustScoreSnapshot> = self
            .tables()?
            .snapshots
            .values()
            .filter(|row| {
                row.committed
                    && row.snapshot.promoteur_id == *promoteur
                    && row.snapshot.created_at >= since
            })
            .map(|row| row.snapshot.clone())
            .collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(snapshots)
    }
}

impl LeadRepository for InMemoryReputationStore {
    fn insert_lead(&self, lead: LeadRecord) -> Result<LeadRecord, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<LeadRecord>, RepositoryError> {
        Ok(self.tables()?.leads.get(id).cloned())
    }

    fn record_first_response(
        &self,
        id: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<LeadRecord, RepositoryError> {
        let mut tables = self.tables()?;
        let lead = tables.leads.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if lead.first_response_at.is_none() {
            lead.first_response_at = Some(at);
        }
        Ok(lead.clone())
    }

    fn settle_response_sla(&self, id: &LeadId, met: bool) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let lead = tables.leads.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if lead.response_sla_met.is_some() {
            return Ok(false);
        }
        lead.response_sla_met = Some(met);
        Ok(true)
    }

    fn leads_awaiting_verdict(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Vec<LeadRecord>, RepositoryError> {
        Ok(self
            .tables()?
            .leads
            .values()
            .filter(|lead| lead.promoteur_id == *promoteur && lead.awaiting_sla_verdict())
            .cloned()
            .collect())
    }

    fn promoteurs_with_unsettled_leads(&self) -> Result<Vec<PromoteurId>, RepositoryError> {
        let ids: BTreeSet<PromoteurId> = self
            .tables()?
            .leads
            .values()
            .filter(|lead| lead.awaiting_sla_verdict())
            .map(|lead| lead.promoteur_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }
}

impl SanctionRepository for InMemoryReputationStore {
    fn insert_sanction(&self, sanction: Sanction) -> Result<Sanction, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.sanctions.contains_key(&sanction.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.sanctions.insert(sanction.id.clone(), sanction.clone());
        Ok(sanction)
    }

    fn fetch_sanction(&self, id: &SanctionId) -> Result<Option<Sanction>, RepositoryError> {
        Ok(self.tables()?.sanctions.get(id).cloned())
    }

    fn update_sanction(
        &self,
        mut sanction: Sanction,
        expected_version: u64,
    ) -> Result<Sanction, RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables
            .sanctions
            .get_mut(&sanction.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(stored.version, expected_version)?;
        sanction.version = expected_version + 1;
        *stored = sanction.clone();
        Ok(sanction)
    }

    fn sanctions_for(&self, promoteur: &PromoteurId) -> Result<Vec<Sanction>, RepositoryError> {
        Ok(self
            .tables()?
            .sanctions
            .values()
            .filter(|sanction| sanction.promoteur_id == *promoteur)
            .cloned()
            .collect())
    }

    fn sanctioned_promoteurs(&self) -> Result<Vec<PromoteurId>, RepositoryError> {
        let tables = self.tables()?;
        let ids: BTreeSet<PromoteurId> = tables
            .sanctions
            .values()
            .map(|sanction| sanction.promoteur_id.clone())
            .chain(tables.standings.keys().cloned())
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn record_violation(&self, violation: Violation) -> Result<(), RepositoryError> {
        self.tables()?.violations.push(violation);
        Ok(())
    }

    fn violations_since(
        &self,
        promoteur: &PromoteurId,
        kind: ViolationKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Violation>, RepositoryError> {
        Ok(self
            .tables()?
            .violations
            .iter()
            .filter(|violation| {
                violation.promoteur_id == *promoteur
                    && violation.kind == kind
                    && violation.occurred_at >= since
            })
            .cloned()
            .collect())
    }

    fn stored_standing(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Option<StoredStanding>, RepositoryError> {
        Ok(self.tables()?.standings.get(promoteur).cloned())
    }

    fn save_standing(
        &self,
        promoteur: &PromoteurId,
        standing: StoredStanding,
    ) -> Result<(), RepositoryError> {
        self.tables()?.standings.insert(promoteur.clone(), standing);
        Ok(())
    }
}

impl CaseRepository for InMemoryReputationStore {
    fn insert_case(&self, case: CaseRecord) -> Result<CaseRecord, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.cases.contains_key(&case.id) || tables.case_numbers.contains(&case.case_number)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.case_numbers.insert(case.case_number.clone());
        tables.cases.insert(case.id.clone(), case.clone());
        Ok(case)
    }

    fn fetch_case(&self, id: &CaseId) -> Result<Option<CaseRecord>, RepositoryError> {
        Ok(self.tables()?.cases.get(id).cloned())
    }

    fn update_case(
        &self,
        mut case: CaseRecord,
        expected_version: u64,
    ) -> Result<CaseRecord, RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables.cases.get_mut(&case.id).ok_or(RepositoryError::NotFound)?;
        check_version(stored.version, expected_version)?;
        case.version = expected_version + 1;
        *stored = case.clone();
        Ok(case)
    }

    fn unbreached_open_cases(&self) -> Result<Vec<CaseRecord>, RepositoryError> {
        Ok(self
            .tables()?
            .cases
            .values()
            .filter(|case| !case.sla_breached && !case.status.is_terminal())
            .cloned()
            .collect())
    }

    fn commit_case_resolution(
        &self,
        mut case: CaseRecord,
        expected_version: u64,
        sanction: Option<Sanction>,
    ) -> Result<(CaseRecord, Option<Sanction>), RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables.cases.get(&case.id).ok_or(RepositoryError::NotFound)?;
        check_version(stored.version, expected_version)?;
        if let Some(sanction) = &sanction {
            if tables.sanctions.contains_key(&sanction.id) {
                return Err(RepositoryError::Conflict);
            }
        }

        case.version = expected_version + 1;
        tables.cases.insert(case.id.clone(), case.clone());
        if let Some(sanction) = &sanction {
            tables.sanctions.insert(sanction.id.clone(), sanction.clone());
        }
        Ok((case, sanction))
    }
}

impl CaseNumberSequence for InMemoryReputationStore {
    fn next_case_sequence(&self, year: i32) -> Result<u64, RepositoryError> {
        let existing = self
            .case_sequences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&year)
            .cloned();
        let counter = match existing {
            Some(counter) => counter,
            None => {
                let mut sequences = self
                    .case_sequences
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                Arc::clone(sequences.entry(year).or_default())
            }
        };
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl AppealRepository for InMemoryReputationStore {
    fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.appeals.contains_key(&appeal.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.appeals.insert(appeal.id.clone(), appeal.clone());
        Ok(appeal)
    }

    fn fetch_appeal(&self, id: &AppealId) -> Result<Option<Appeal>, RepositoryError> {
        Ok(self.tables()?.appeals.get(id).cloned())
    }

    fn update_appeal(
        &self,
        mut appeal: Appeal,
        expected_version: u64,
    ) -> Result<Appeal, RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables
            .appeals
            .get_mut(&appeal.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(stored.version, expected_version)?;
        appeal.version = expected_version + 1;
        *stored = appeal.clone();
        Ok(appeal)
    }

    fn open_appeals(&self) -> Result<Vec<Appeal>, RepositoryError> {
        Ok(self
            .tables()?
            .appeals
            .values()
            .filter(|appeal| !appeal.status.is_terminal())
            .cloned()
            .collect())
    }

    fn open_appeal_for_sanction(
        &self,
        sanction: &SanctionId,
    ) -> Result<Option<Appeal>, RepositoryError> {
        Ok(self
            .tables()?
            .appeals
            .values()
            .find(|appeal| {
                !appeal.status.is_terminal()
                    && appeal.original_action.sanction_id.as_ref() == Some(sanction)
            })
            .cloned())
    }

    fn upheld_appeals_since(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        Ok(self
            .tables()?
            .appeals
            .values()
            .filter(|appeal| {
                appeal.promoteur_id == *promoteur
                    && appeal.status.is_upheld()
                    && appeal.resolved_at.is_some_and(|at| at >= since)
            })
            .count() as u32)
    }

    fn commit_resolution(
        &self,
        mut appeal: Appeal,
        expected_version: u64,
        change: SanctionChange,
    ) -> Result<CommittedResolution, RepositoryError> {
        let mut tables = self.tables()?;

        // Validate everything before touching any record.
        let stored_appeal = tables
            .appeals
            .get(&appeal.id)
            .ok_or(RepositoryError::NotFound)?;
        check_version(stored_appeal.version, expected_version)?;
        let revoked = match &change.revoke {
            Some(revocation) => {
                let sanction = tables
                    .sanctions
                    .get(&revocation.sanction_id)
                    .ok_or(RepositoryError::NotFound)?;
                check_version(sanction.version, revocation.expected_version)?;
                if sanction.revoked {
                    return Err(RepositoryError::Conflict);
                }
                let mut revoked = sanction.clone();
                revoked.revoked = true;
                revoked.revoked_at = Some(revocation.revoked_at);
                revoked.revoked_by = Some(revocation.revoked_by.clone());
                revoked.version = revocation.expected_version + 1;
                Some(revoked)
            }
            None => None,
        };
        if let Some(replacement) = &change.replacement {
            if tables.sanctions.contains_key(&replacement.id) {
                return Err(RepositoryError::Conflict);
            }
        }

        appeal.version = expected_version + 1;
        tables.appeals.insert(appeal.id.clone(), appeal.clone());
        if let Some(revoked) = &revoked {
            tables.sanctions.insert(revoked.id.clone(), revoked.clone());
        }
        if let Some(replacement) = &change.replacement {
            tables
                .sanctions
                .insert(replacement.id.clone(), replacement.clone());
        }

        Ok(CommittedResolution {
            appeal,
            revoked,
            replacement: change.replacement,
        })
    }
}

impl CheckpointStore for InMemoryReputationStore {
    fn checkpoint(&self, job: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.tables()?.checkpoints.get(job).cloned())
    }

    fn save_checkpoint(&self, job: &str, last_id: &str) -> Result<(), RepositoryError> {
        self.tables()?
            .checkpoints
            .insert(job.to_string(), last_id.to_string());
        Ok(())
    }

    fn clear_checkpoint(&self, job: &str) -> Result<(), RepositoryError> {
        self.tables()?.checkpoints.remove(job);
        Ok(())
    }
}

impl AuditSink for InMemoryReputationStore {
    fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.tables()?.audit.push(entry);
        Ok(())
    }

    fn audit_trail(
        &self,
        entity: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self
            .tables()?
            .audit
            .iter()
            .filter(|entry| entry.entity == entity && entry.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

/// Promoteur aggregates held in memory, standing in for the platform's data source.
#[derive(Default)]
pub struct InMemoryDirectory {
    activities: RwLock<BTreeMap<PromoteurId, PromoteurActivity>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activities(activities: impl IntoIterator<Item = PromoteurActivity>) -> Self {
        let directory = Self::default();
        for activity in activities {
            directory.upsert(activity);
        }
        directory
    }

    pub fn upsert(&self, activity: PromoteurActivity) {
        self.activities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(activity.promoteur_id.clone(), activity);
    }
}

impl PromoteurDirectory for InMemoryDirectory {
    fn promoteur_ids(&self) -> Result<Vec<PromoteurId>, RepositoryError> {
        Ok(self
            .activities
            .read()
            .map_err(|_| RepositoryError::Unavailable("directory lock poisoned".to_string()))?
            .keys()
            .cloned()
            .collect())
    }

    fn activity(
        &self,
        promoteur: &PromoteurId,
    ) -> Result<Option<PromoteurActivity>, RepositoryError> {
        Ok(self
            .activities
            .read()
            .map_err(|_| RepositoryError::Unavailable("directory lock poisoned".to_string()))?
            .get(promoteur)
            .cloned())
    }
}

/// Keeps every dispatched notification in memory, in dispatch order.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn templates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notification| notification.template)
            .collect()
    }
}

impl NotificationDispatcher for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("recorder lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

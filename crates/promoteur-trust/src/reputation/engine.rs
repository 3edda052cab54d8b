use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::appeals::{AppealService, ResolveAppealCommand};
use super::batch::BatchRunner;
use super::cases::{CaseRecord, CaseService, ResolveCase};
use super::config_store::{ActiveConfigProvider, ConfigStore};
use super::domain::{CaseId, SanctionId};
use super::error::EngineError;
use super::leads::LeadService;
use super::policy::CompliancePolicy;
use super::repository::{
    CommittedResolution, NotificationDispatcher, PromoteurDirectory, ReputationStore,
};
use super::sanctions::{
    ManualSanctionRequest, Sanction, SanctionService, ViolationOutcome, ViolationReport,
};
use super::trust::{ScoreHistory, TrustScoreService};

/// Wires every service over one store. Operations spanning several services (standing
/// refresh after a sanction change, score recompute after an upheld appeal) live here.
pub struct ReputationEngine<S, D, N> {
    pub(crate) store: Arc<S>,
    pub(crate) directory: Arc<D>,
    pub(crate) notifier: Arc<N>,
    pub(crate) configs: Arc<ConfigStore<S>>,
    pub(crate) trust: Arc<TrustScoreService<S, D>>,
    pub(crate) history: ScoreHistory<S>,
    pub(crate) leads: LeadService<S>,
    pub(crate) sanctions: Arc<SanctionService<S, N>>,
    pub(crate) appeals: Arc<AppealService<S, N>>,
    pub(crate) cases: Arc<CaseService<S, N>>,
    pub(crate) batch: BatchRunner<S>,
}

impl<S, D, N> ReputationEngine<S, D, N>
where
    S: ReputationStore + 'static,
    D: PromoteurDirectory + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        notifier: Arc<N>,
        policy: CompliancePolicy,
        batch: BatchRunner<S>,
    ) -> Self {
        let configs = Arc::new(ConfigStore::new(Arc::clone(&store)));
        let provider: Arc<dyn ActiveConfigProvider> = configs.clone();
        let sanctions = Arc::new(SanctionService::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            policy.escalation,
        ));

        Self {
            trust: Arc::new(TrustScoreService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&provider),
            )),
            history: ScoreHistory::new(Arc::clone(&store)),
            leads: LeadService::new(Arc::clone(&store), provider),
            appeals: Arc::new(AppealService::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                policy.appeals,
            )),
            cases: Arc::new(CaseService::new(
                Arc::clone(&store),
                Arc::clone(&sanctions),
                policy.case_sla,
            )),
            sanctions,
            configs,
            store,
            directory,
            notifier,
            batch,
        }
    }

    pub fn configs(&self) -> &ConfigStore<S> {
        &self.configs
    }

    pub fn trust(&self) -> &TrustScoreService<S, D> {
        &self.trust
    }

    pub fn history(&self) -> &ScoreHistory<S> {
        &self.history
    }

    pub fn leads(&self) -> &LeadService<S> {
        &self.leads
    }

    pub fn sanctions(&self) -> &SanctionService<S, N> {
        &self.sanctions
    }

    pub fn appeals(&self) -> &AppealService<S, N> {
        &self.appeals
    }

    pub fn cases(&self) -> &CaseService<S, N> {
        &self.cases
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn record_violation(
        &self,
        report: ViolationReport,
        now: DateTime<Utc>,
    ) -> Result<ViolationOutcome, EngineError> {
        let outcome = self.sanctions.record_violation(report, now)?;
        if outcome.escalated_to.is_some() {
            self.sanctions
                .refresh_standing(&outcome.violation.promoteur_id, now)?;
        }
        Ok(outcome)
    }

    pub fn apply_sanction(
        &self,
        request: ManualSanctionRequest,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        let sanction = self.sanctions.apply_manual(request, now)?;
        self.sanctions.refresh_standing(&sanction.promoteur_id, now)?;
        Ok(sanction)
    }

    pub fn revoke_sanction(
        &self,
        id: &SanctionId,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<Sanction, EngineError> {
        let sanction = self.sanctions.revoke(id, admin, now)?;
        self.sanctions.refresh_standing(&sanction.promoteur_id, now)?;
        Ok(sanction)
    }

    /// Commits the decision, then refreshes the standing. An upheld appeal also triggers
    /// a score recompute so the restoration bonus shows without waiting for the batch; a
    /// failed recompute is logged and left to the next scheduled run.
    pub fn resolve_appeal(
        &self,
        command: ResolveAppealCommand,
        now: DateTime<Utc>,
    ) -> Result<CommittedResolution, EngineError> {
        let resolution = self.appeals.resolve(command, now)?;
        let promoteur = resolution.appeal.promoteur_id.clone();
        if resolution.revoked.is_some() || resolution.replacement.is_some() {
            self.sanctions.refresh_standing(&promoteur, now)?;
        }
        if resolution.appeal.status.is_upheld() {
            if let Err(error) = self.trust.recompute(&promoteur, now) {
                warn!(
                    promoteur = %promoteur,
                    error = %error,
                    "score recompute after upheld appeal failed"
                );
            }
        }
        Ok(resolution)
    }

    pub fn resolve_case(
        &self,
        id: &CaseId,
        request: ResolveCase,
        now: DateTime<Utc>,
    ) -> Result<CaseRecord, EngineError> {
        let case = self.cases.resolve(id, request, now)?;
        let sanctioned = case
            .resolution
            .as_ref()
            .is_some_and(|resolution| resolution.sanction_id.is_some());
        if let (true, Some(promoteur)) = (sanctioned, &case.subject.promoteur_id) {
            self.sanctions.refresh_standing(promoteur, now)?;
        }
        Ok(case)
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::calculator::{TrustInputs, TrustScoreCalculator};
use super::domain::{ComplianceOverlay, TrustScoreOutcome, TrustScoreSnapshot, TrustTier};
use crate::reputation::config_store::{ActiveConfigProvider, TrustScoreConfig};
use crate::reputation::domain::{next_key, Actor, PromoteurId, SnapshotId};
use crate::reputation::effects::Audit;
use crate::reputation::error::{EngineError, RepositoryError, CONFLICT_BACKOFF};
use crate::reputation::repository::{
    AppealRepository, AuditSink, PromoteurDirectory, SanctionRepository, ScoreRepository,
};
use crate::reputation::sanctions::domain::ViolationKind;

/// Current score as read by ranking and publication gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStanding {
    pub promoteur_id: PromoteurId,
    pub score: u8,
    pub tier: TrustTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub promoteur_id: PromoteurId,
    pub project_type: String,
    pub score: u8,
    pub minimum: u8,
    pub eligible: bool,
}

/// Recomputes and persists trust scores. The only writer of the current score.
pub struct TrustScoreService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    configs: Arc<dyn ActiveConfigProvider>,
}

impl<S, D> TrustScoreService<S, D>
where
    S: ScoreRepository + SanctionRepository + AppealRepository + AuditSink + 'static,
    D: PromoteurDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, configs: Arc<dyn ActiveConfigProvider>) -> Self {
        Self {
            store,
            directory,
            configs,
        }
    }

    /// Recomputes against the config active right now.
    pub fn recompute(
        &self,
        promoteur: &PromoteurId,
        now: DateTime<Utc>,
    ) -> Result<TrustScoreOutcome, EngineError> {
        let config = self.configs.active_trust_config()?;
        self.recompute_with(config, promoteur, now)
    }

    /// Recomputes against a config snapshot resolved by the caller, as batch runs do.
    pub fn recompute_with(
        &self,
        config: Arc<TrustScoreConfig>,
        promoteur: &PromoteurId,
        now: DateTime<Utc>,
    ) -> Result<TrustScoreOutcome, EngineError> {
        let activity = self
            .directory
            .activity(promoteur)?
            .ok_or_else(|| EngineError::not_found("promoteur", promoteur))?;

        let lookback_start = now - Duration::days(config.penalties.lookback_days);
        let overlay = ComplianceOverlay {
            missed_sla: self
                .store
                .violations_since(promoteur, ViolationKind::SlaBreach, lookback_start)?
                .len() as u32,
            upheld_appeals: self.store.upheld_appeals_since(promoteur, lookback_start)?,
        };
        let jump_window_start = now - Duration::days(config.gaming_detection.score_jump_window_days);
        let recent = self.store.snapshots_since(promoteur, jump_window_start)?;

        let calculator = TrustScoreCalculator::new(config);
        let outcome = calculator.compute(
            TrustInputs {
                activity: &activity,
                overlay,
                recent_snapshots: &recent,
            },
            now,
        );
        debug!(
            promoteur = %promoteur,
            base = outcome.weighted_base,
            score = outcome.score,
            adjustments = outcome.adjustments.len(),
            "trust score computed"
        );
        if !outcome.gaming_signals.is_empty() {
            warn!(promoteur = %promoteur, signals = ?outcome.gaming_signals, "gaming signals detected");
        }

        let previous = self.persist_score(promoteur, outcome.score, now)?;

        Audit::new(Actor::System, "trust_score.recompute", "promoteur", promoteur, now)
            .before(&previous)
            .after(&outcome)
            .write(self.store.as_ref())?;
        info!(promoteur = %promoteur, ?previous, score = outcome.score, "trust score updated");
        Ok(outcome)
    }

    pub fn current(&self, promoteur: &PromoteurId) -> Result<TrustStanding, EngineError> {
        let score = self
            .store
            .trust_score(promoteur)?
            .ok_or_else(|| EngineError::not_found("trust score", promoteur))?;
        Ok(TrustStanding {
            promoteur_id: promoteur.clone(),
            score,
            tier: TrustTier::for_score(score),
        })
    }

    pub fn eligibility(
        &self,
        promoteur: &PromoteurId,
        project_type: &str,
    ) -> Result<Eligibility, EngineError> {
        let config = self.configs.active_trust_config()?;
        let standing = self.current(promoteur)?;
        let minimum = config.threshold_for(project_type);
        let calculator = TrustScoreCalculator::new(config);
        Ok(Eligibility {
            promoteur_id: promoteur.clone(),
            project_type: project_type.to_string(),
            score: standing.score,
            minimum,
            eligible: calculator.is_eligible(project_type, standing.score),
        })
    }

    /// Draft snapshot, then score, then commit. A failed score update discards the draft so
    /// history never shows a score that was not applied.
    fn persist_score(
        &self,
        promoteur: &PromoteurId,
        score: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<u8>, EngineError> {
        let snapshot = TrustScoreSnapshot {
            id: SnapshotId::new(next_key("snap")),
            promoteur_id: promoteur.clone(),
            score,
            created_at: now,
        };
        let snapshot_id = snapshot.id.clone();

        retry_once("insert snapshot", || {
            self.store.insert_draft_snapshot(snapshot.clone())
        })?;

        let previous = match self.store.update_trust_score(promoteur, score) {
            Ok(previous) => previous,
            Err(err) => {
                if let Err(discard) = self.store.discard_draft_snapshot(&snapshot_id) {
                    error!(
                        snapshot = %snapshot_id,
                        error = %discard,
                        "draft snapshot left behind after failed score update"
                    );
                }
                return Err(err.into());
            }
        };

        retry_once("commit snapshot", || self.store.commit_snapshot(&snapshot_id)).map_err(
            |err| {
                error!(
                    promoteur = %promoteur,
                    snapshot = %snapshot_id,
                    error = %err,
                    "score applied but snapshot still in draft"
                );
                EngineError::from(err)
            },
        )?;

        Ok(previous)
    }
}

fn retry_once<T>(
    step: &'static str,
    mut operation: impl FnMut() -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    operation().or_else(|err| {
        warn!(step, error = %err, "score write step failed, retrying once");
        std::thread::sleep(CONFLICT_BACKOFF);
        operation()
    })
}

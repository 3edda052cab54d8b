use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{LeadRecord, LeadSubmission};
use super::rules::LeadScoringEngine;
use crate::reputation::config_store::ActiveConfigProvider;
use crate::reputation::domain::{next_key, Actor, LeadId};
use crate::reputation::effects::Audit;
use crate::reputation::error::{EngineError, RepositoryError};
use crate::reputation::repository::{AuditSink, LeadRepository};
use crate::reputation::sla::{check_lead_sla, SlaVerdict};

/// Grades leads at intake and records first contact.
pub struct LeadService<S> {
    store: Arc<S>,
    configs: Arc<dyn ActiveConfigProvider>,
}

impl<S> LeadService<S>
where
    S: LeadRepository + AuditSink + 'static,
{
    pub fn new(store: Arc<S>, configs: Arc<dyn ActiveConfigProvider>) -> Self {
        Self { store, configs }
    }

    /// Scores and stores a new lead. The score is never recomputed afterwards.
    pub fn submit(
        &self,
        submission: LeadSubmission,
        now: DateTime<Utc>,
    ) -> Result<LeadRecord, EngineError> {
        let engine = LeadScoringEngine::new(self.configs.active_lead_config()?);
        let score = engine.score(&submission)?;

        let record = LeadRecord {
            id: LeadId::new(next_key("lead")),
            promoteur_id: submission.promoteur_id,
            project_id: submission.project.project_id,
            grade: score.grade,
            composite_score: score.composite,
            details: score.details,
            sla_hours: score.sla_hours,
            created_at: now,
            first_response_at: None,
            response_sla_met: None,
            contact: submission.contact,
        };
        let stored = self.store.insert_lead(record)?;

        Audit::new(Actor::System, "lead.scored", "lead", &stored.id, now)
            .after(&score)
            .write(self.store.as_ref())?;
        info!(
            lead = %stored.id,
            promoteur = %stored.promoteur_id,
            grade = %stored.grade,
            composite = stored.composite_score,
            sla_hours = stored.sla_hours,
            "lead graded"
        );
        Ok(stored)
    }

    /// Logs the promoteur's first contact with the lead. Later calls keep the first time.
    pub fn record_response(
        &self,
        id: &LeadId,
        at: DateTime<Utc>,
    ) -> Result<LeadRecord, EngineError> {
        let lead = self.get(id)?;
        if at < lead.created_at {
            return Err(EngineError::validation(format!(
                "response time precedes creation of lead {id}"
            )));
        }

        let updated = self
            .store
            .record_first_response(id, at)
            .map_err(|err| match err {
                RepositoryError::NotFound => EngineError::not_found("lead", id),
                other => other.into(),
            })?;
        if lead.first_response_at.is_none() {
            info!(lead = %id, responded_at = %at, "lead response recorded");
        }
        Ok(updated)
    }

    pub fn get(&self, id: &LeadId) -> Result<LeadRecord, EngineError> {
        self.store
            .fetch_lead(id)?
            .ok_or_else(|| EngineError::not_found("lead", id))
    }

    pub fn sla(&self, id: &LeadId, now: DateTime<Utc>) -> Result<SlaVerdict, EngineError> {
        Ok(check_lead_sla(&self.get(id)?, now))
    }
}

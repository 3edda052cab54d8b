use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{ConfigDocument, ConfigKind, LeadScoringConfig, ScoreConfig, TrustScoreConfig};
use crate::reputation::domain::Actor;
use crate::reputation::effects::Audit;
use crate::reputation::error::{EngineError, RepositoryError};
use crate::reputation::repository::{AuditSink, ConfigRepository};

/// Resolves the configuration snapshot a computation runs against. Callers resolve once at
/// the start of a computation or batch and pass the snapshot down.
pub trait ActiveConfigProvider: Send + Sync {
    fn active_trust_config(&self) -> Result<Arc<TrustScoreConfig>, EngineError>;
    fn active_lead_config(&self) -> Result<Arc<LeadScoringConfig>, EngineError>;
}

#[derive(Default)]
struct ActiveCache {
    generation: u64,
    trust: Option<Arc<TrustScoreConfig>>,
    lead: Option<Arc<LeadScoringConfig>>,
}

/// Admin-facing config management with a cached view of the active configs.
pub struct ConfigStore<R> {
    repository: Arc<R>,
    cache: RwLock<ActiveCache>,
}

impl<R> ConfigStore<R>
where
    R: ConfigRepository + AuditSink + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            cache: RwLock::new(ActiveCache::default()),
        }
    }

    pub fn list(&self, kind: Option<ConfigKind>) -> Result<Vec<ConfigDocument>, EngineError> {
        Ok(self.repository.list_configs(kind)?)
    }

    pub fn get(&self, kind: ConfigKind, name: &str) -> Result<ConfigDocument, EngineError> {
        self.repository
            .fetch_config(kind, name)?
            .ok_or_else(|| config_not_found(kind, name))
    }

    /// Creates or replaces a named config. Saving the active config takes effect for the
    /// next computation.
    pub fn save(
        &self,
        config: ScoreConfig,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, EngineError> {
        config.validate()?;

        let total = config.total_weight();
        if (total - 100.0).abs() > f64::EPSILON {
            warn!(
                kind = %config.kind(),
                name = config.name(),
                total,
                "config weights do not total 100; scores are normalised by the actual total"
            );
        }

        let before = self.repository.fetch_config(config.kind(), config.name())?;
        let saved = self.repository.upsert_config(config, now)?;
        if saved.is_active {
            self.invalidate();
        }

        let actor = Actor::Admin(admin.to_string());
        Audit::new(actor, "config.save", "config", config_key(&saved), now)
            .before(&before)
            .after(&saved)
            .write(self.repository.as_ref())?;
        info!(kind = %saved.kind(), name = saved.name(), version = saved.version, "config saved");
        Ok(saved)
    }

    /// Activates `name`, deactivating every other config of the same kind.
    pub fn activate(
        &self,
        kind: ConfigKind,
        name: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfigDocument, EngineError> {
        let previous = self.repository.active_config(kind)?;
        let activated = self
            .repository
            .activate_exclusive(kind, name, now)
            .map_err(|err| match err {
                RepositoryError::NotFound => config_not_found(kind, name),
                other => other.into(),
            })?;
        self.invalidate();

        let actor = Actor::Admin(admin.to_string());
        Audit::new(actor, "config.activate", "config", config_key(&activated), now)
            .before(&previous.map(|doc| doc.name().to_string()))
            .after(&activated)
            .write(self.repository.as_ref())?;
        info!(%kind, name, "config activated");
        Ok(activated)
    }

    /// The active config cannot be deleted; activate another one first.
    pub fn delete(
        &self,
        kind: ConfigKind,
        name: &str,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let existing = self.get(kind, name)?;
        if existing.is_active {
            return Err(EngineError::validation(format!(
                "{kind} config {name} is active and cannot be deleted"
            )));
        }

        self.repository.delete_config(kind, name)?;
        let actor = Actor::Admin(admin.to_string());
        Audit::new(actor, "config.delete", "config", config_key(&existing), now)
            .before(&existing)
            .write(self.repository.as_ref())?;
        info!(%kind, name, "config deleted");
        Ok(())
    }

    /// Seeds and activates the standard configs for kinds that have no active config.
    pub fn ensure_defaults(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let defaults = [
            ScoreConfig::TrustScore(TrustScoreConfig::standard()),
            ScoreConfig::LeadScoring(LeadScoringConfig::standard()),
        ];
        for config in defaults {
            let kind = config.kind();
            if self.repository.active_config(kind)?.is_some() {
                continue;
            }
            let name = config.name().to_string();
            if self.repository.fetch_config(kind, &name)?.is_none() {
                self.repository.upsert_config(config, now)?;
            }
            self.repository.activate_exclusive(kind, &name, now)?;
            Audit::new(Actor::System, "config.seed", "config", format!("{kind}/{name}"), now)
                .write(self.repository.as_ref())?;
            info!(%kind, name, "seeded default config");
        }
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.generation += 1;
        cache.trust = None;
        cache.lead = None;
    }

    fn load_active(&self, kind: ConfigKind) -> Result<ScoreConfig, EngineError> {
        let document = self.repository.active_config(kind)?.ok_or_else(|| {
            EngineError::Configuration(format!("no active {kind} configuration"))
        })?;
        Ok(document.config)
    }

    /// Stores a freshly loaded value unless an invalidation happened while loading.
    fn remember(&self, observed_generation: u64, update: impl FnOnce(&mut ActiveCache)) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.generation == observed_generation {
            update(&mut cache);
        }
    }
}

impl<R> ActiveConfigProvider for ConfigStore<R>
where
    R: ConfigRepository + AuditSink + 'static,
{
    fn active_trust_config(&self) -> Result<Arc<TrustScoreConfig>, EngineError> {
        let generation = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = &cache.trust {
                return Ok(Arc::clone(config));
            }
            cache.generation
        };

        let config = match self.load_active(ConfigKind::TrustScore)? {
            ScoreConfig::TrustScore(config) => Arc::new(config),
            ScoreConfig::LeadScoring(_) => {
                return Err(EngineError::Configuration(
                    "active trust-score slot holds a lead-scoring config".to_string(),
                ))
            }
        };
        self.remember(generation, |cache| cache.trust = Some(Arc::clone(&config)));
        Ok(config)
    }

    fn active_lead_config(&self) -> Result<Arc<LeadScoringConfig>, EngineError> {
        let generation = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = &cache.lead {
                return Ok(Arc::clone(config));
            }
            cache.generation
        };

        let config = match self.load_active(ConfigKind::LeadScoring)? {
            ScoreConfig::LeadScoring(config) => Arc::new(config),
            ScoreConfig::TrustScore(_) => {
                return Err(EngineError::Configuration(
                    "active lead-scoring slot holds a trust-score config".to_string(),
                ))
            }
        };
        self.remember(generation, |cache| cache.lead = Some(Arc::clone(&config)));
        Ok(config)
    }
}

fn config_not_found(kind: ConfigKind, name: &str) -> EngineError {
    EngineError::not_found("config", format!("{kind}/{name}"))
}

fn config_key(document: &ConfigDocument) -> String {
    format!("{}/{}", document.kind(), document.name())
}

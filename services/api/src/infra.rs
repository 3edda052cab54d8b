use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use promoteur_trust::config::EngineConfig;
use promoteur_trust::error::AppError;
use promoteur_trust::reputation::{
    BatchRunner, CompliancePolicy, InMemoryDirectory, InMemoryReputationStore, Notification,
    NotificationDispatcher, NotifyError, ReputationEngine,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ServiceEngine =
    ReputationEngine<InMemoryReputationStore, InMemoryDirectory, LogNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Hands notifications to the log until a delivery channel is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogNotifier;

impl NotificationDispatcher for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            target: "reputation::notifications",
            recipient = %notification.recipient_id,
            template = %notification.template,
            payload = %notification.payload,
            "notification queued"
        );
        Ok(())
    }
}

pub(crate) struct Wiring {
    pub(crate) engine: Arc<ServiceEngine>,
    pub(crate) directory: Arc<InMemoryDirectory>,
}

/// Builds the engine over the in-memory store and seeds the standard configs.
pub(crate) fn build_engine(config: &EngineConfig, now: DateTime<Utc>) -> Result<Wiring, AppError> {
    let store = Arc::new(InMemoryReputationStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let batch = BatchRunner::new(
        Arc::clone(&store),
        config.batch_concurrency,
        config.batch_budget,
    );
    let engine = Arc::new(ReputationEngine::new(
        store,
        Arc::clone(&directory),
        Arc::new(LogNotifier),
        CompliancePolicy::default(),
        batch,
    ));
    engine.configs().ensure_defaults(now)?;

    Ok(Wiring { engine, directory })
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoteur_trust::reputation::config_store::ConfigKind;

    #[test]
    fn built_engine_has_active_defaults() {
        let wiring = build_engine(&EngineConfig::default(), Utc::now()).expect("engine builds");

        for kind in [ConfigKind::TrustScore, ConfigKind::LeadScoring] {
            let configs = wiring.engine.configs().list(Some(kind)).expect("configs");
            assert!(configs.iter().any(|document| document.is_active));
        }
    }

    #[test]
    fn parses_offsets_into_utc() {
        let instant = parse_instant("2025-03-03T10:00:00+01:00").expect("valid timestamp");
        assert_eq!(instant.to_rfc3339(), "2025-03-03T09:00:00+00:00");
        assert!(parse_instant("next tuesday").is_err());
    }
}

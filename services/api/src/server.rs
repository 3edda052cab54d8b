use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState, ServiceEngine};
use crate::routes::with_reputation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use promoteur_trust::config::{AppConfig, EngineConfig};
use promoteur_trust::error::AppError;
use promoteur_trust::reputation::{BatchError, Job};
use promoteur_trust::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let wiring = build_engine(&config.engine, Utc::now())?;
    let scheduler = if args.no_scheduler {
        Vec::new()
    } else {
        spawn_scheduler(Arc::clone(&wiring.engine), &config.engine)
    };

    let app = with_reputation_routes(wiring.engine, wiring.directory)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scheduled_jobs = scheduler.len(),
        "promoteur trust engine ready"
    );

    let served = axum::serve(listener, app).await;
    for handle in scheduler {
        handle.abort();
    }
    served?;
    Ok(())
}

fn schedule(config: &EngineConfig) -> [(Job, Duration); 3] {
    [
        (Job::RecalculateScores, config.score_interval),
        (Job::SlaMonitoring, config.sla_interval),
        (Job::ExpirySweep, config.expiry_interval),
    ]
}

/// One interval loop per job. A zero period disables that job.
fn spawn_scheduler(engine: Arc<ServiceEngine>, config: &EngineConfig) -> Vec<JoinHandle<()>> {
    schedule(config)
        .into_iter()
        .filter(|(job, period)| {
            if period.is_zero() {
                info!(%job, "scheduled job disabled");
            }
            !period.is_zero()
        })
        .map(|(job, period)| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // the first tick completes immediately; let the service settle first
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    match engine.run_job(job, Utc::now()).await {
                        Ok(report) => debug!(%job, ?report, "scheduled job finished"),
                        Err(BatchError::AlreadyRunning(name)) => {
                            info!(%job, running = %name, "previous run still active, skipping tick")
                        }
                        Err(err) => warn!(%job, error = %err, "scheduled job failed"),
                    }
                }
            })
        })
        .collect()
}

use crate::infra::{build_engine, parse_instant, Wiring};
use chrono::{DateTime, Utc};
use clap::Args;
use promoteur_trust::config::AppConfig;
use promoteur_trust::error::AppError;
use promoteur_trust::reputation::trust::PromoteurActivity;
use promoteur_trust::reputation::{EngineError, Job, JobReport};
use promoteur_trust::telemetry;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct JobsArgs {
    /// Job to run once: scores, sla or expiry
    pub(crate) job: String,
    /// JSON array of promoteur activity records loaded into the directory first
    #[arg(long)]
    pub(crate) activities: Option<PathBuf>,
    /// Reference instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) at: Option<DateTime<Utc>>,
}

pub(crate) async fn run_jobs(args: JobsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let job = parse_job(&args.job)?;
    let now = args.at.unwrap_or_else(Utc::now);
    let wiring = build_engine(&config.engine, now)?;
    if let Some(path) = args.activities.as_deref() {
        let loaded = seed_directory(&wiring, path)?;
        info!(path = %path.display(), loaded, "promoteur activities loaded");
    }

    let report = run_once(&wiring, job, now).await?;
    serde_json::to_writer_pretty(std::io::stdout().lock(), &report)
        .map_err(std::io::Error::from)?;
    println!();
    Ok(())
}

fn parse_job(raw: &str) -> Result<Job, AppError> {
    Job::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Job::ALL.iter().map(|job| job.name()).collect();
        AppError::from(EngineError::validation(format!(
            "unknown job '{raw}', expected one of {}",
            known.join(", ")
        )))
    })
}

fn seed_directory(wiring: &Wiring, path: &Path) -> Result<usize, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let activities: Vec<PromoteurActivity> = serde_json::from_str(&raw).map_err(|err| {
        EngineError::validation(format!("invalid activity file {}: {err}", path.display()))
    })?;
    let loaded = activities.len();
    for activity in activities {
        wiring.directory.upsert(activity);
    }
    Ok(loaded)
}

async fn run_once(wiring: &Wiring, job: Job, now: DateTime<Utc>) -> Result<JobReport, AppError> {
    let report = wiring.engine.run_job(job, now).await?;
    info!(%job, "one-shot job finished");
    Ok(report)
}

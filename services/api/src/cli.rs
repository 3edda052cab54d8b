use crate::demo::{print_default_configs, run_demo, DemoArgs};
use crate::oneshot::{run_jobs, JobsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use promoteur_trust::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Promoteur Trust",
    about = "Run the promoteur reputation and compliance engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the job scheduler (default command)
    Serve(ServeArgs),
    /// Run one batch job to completion and print its report
    Jobs(JobsArgs),
    /// Replay the reference scoring, SLA and appeal scenarios against an in-memory store
    Demo(DemoArgs),
    /// Print the standard trust-score and lead-scoring configs as JSON
    Defaults,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve the API without starting the periodic jobs
    #[arg(long)]
    pub(crate) no_scheduler: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Jobs(args) => run_jobs(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Defaults => print_default_configs(),
    }
}

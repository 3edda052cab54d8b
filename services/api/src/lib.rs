mod cli;
mod demo;
mod infra;
mod oneshot;
mod routes;
mod server;

use promoteur_trust::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

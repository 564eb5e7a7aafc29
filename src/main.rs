mod cli;
mod config;
mod error;
mod metrics;
mod notion;
mod pipeline;
mod registry;
mod report;
mod schema;

use chrono::Utc;
use clap::Parser;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::ReporterError;
use crate::notion::NotionClient;
use crate::report::ReportRecord;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,battery_reporter=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

fn main() {
    let cli = Cli::parse();
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    init_tracing();

    if let Err(err) = run(&cli) {
        tracing::error!(error = %err, "battery report failed");
        std::process::exit(err.exit_code());
    }
}

fn run(cli: &Cli) -> Result<(), ReporterError> {
    let config = Config::from_env(!cli.dry_run)?;
    let node = registry::read_registry(&config)?;

    if cli.dry_run {
        let metrics = metrics::extract(&node)?;
        let record = ReportRecord::new(metrics, Utc::now());
        println!("{:#}", record.to_page_payload("dry-run"));
        return Ok(());
    }

    let client = NotionClient::new(&config)?;
    let record_id = pipeline::run_report(&node, &client, Utc::now(), cli.skip_schema)?;
    tracing::info!(page_id = %record_id, "battery report uploaded");
    Ok(())
}

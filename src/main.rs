use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

mod args;
mod auth;
mod browser_fetch;
mod cfg;
mod csv_sink;
mod fetch;
mod format;
mod html_fetch;
mod job;
mod retention;
mod sheets;
#[cfg(test)]
mod testing;
mod transform;

use args::Args;
use cfg::{Cfg, Credentials};
use fetch::DataFetcher;
use job::{RunError, RunReport};
use sheets::SheetsClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("Starting rate_sheet");

    // Load configuration
    let cfg = Cfg::load(args)?;
    cfg.validate()?;

    let fetcher = fetch::build_fetcher(&cfg)?;

    if cfg.dry_run {
        job::run_dry(&cfg, fetcher.as_ref()).await?;
        info!("Dry run completed");
        return Ok(());
    }

    let Some(credentials) = cfg.credentials.as_ref() else {
        anyhow::bail!("no credentials configured");
    };

    if cfg.once {
        info!("Running once and exiting");
        let report = run_once(&cfg, credentials, fetcher.as_ref()).await?;
        info!("Run report: {}", serde_json::to_string(&report)?);
    } else {
        info!("Running every {} seconds", cfg.interval_secs);
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
        loop {
            ticker.tick().await;
            match run_once(&cfg, credentials, fetcher.as_ref()).await {
                Ok(report) => info!("Run report: {}", serde_json::to_string(&report)?),
                Err(e) => warn!("Run failed, waiting for the next one: {}", e),
            }
        }
    }

    info!("rate_sheet completed successfully");
    Ok(())
}

/// One invocation: a fresh authorized client, then the pipeline.
async fn run_once(
    cfg: &Cfg,
    credentials: &Credentials,
    fetcher: &dyn DataFetcher,
) -> Result<RunReport, RunError> {
    let hub = match auth::create_sheets_hub(credentials).await {
        Ok(hub) => hub,
        Err(e) => {
            error!("There was an error: {}", e);
            return Err(e.into());
        }
    };
    let backend = SheetsClient::new(hub, cfg.spreadsheet_id.as_str());

    job::run_with_error_handling(cfg, &backend, fetcher).await
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level {
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .init();

    Ok(())
}

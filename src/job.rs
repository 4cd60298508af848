use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::auth::AuthError;
use crate::cfg::Cfg;
use crate::csv_sink;
use crate::fetch::{DataFetcher, FetchError, Row};
use crate::format::format_sheet;
use crate::retention::enforce_retention;
use crate::sheets::{add_sheet, list_sheets, write_range, SheetsError, SpreadsheetBackend};
use crate::transform::sort_rows;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("CSV export failed: {0:#}")]
    Export(anyhow::Error),
}

/// What a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sheet_id: i32,
    pub sheet_name: String,
    pub range: String,
    pub rows: usize,
    pub deleted_sheet: Option<i32>,
}

/// Sheet title for a run on `date`.
pub fn sheet_name_for(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub async fn run_job(
    cfg: &Cfg,
    backend: &dyn SpreadsheetBackend,
    fetcher: &dyn DataFetcher,
) -> Result<RunReport, RunError> {
    let sheet_name = sheet_name_for(Utc::now().date_naive());
    run_job_as(cfg, backend, fetcher, &sheet_name).await
}

/// list → retention → (create ‖ fetch) → sort → write → format.
pub async fn run_job_as(
    cfg: &Cfg,
    backend: &dyn SpreadsheetBackend,
    fetcher: &dyn DataFetcher,
    sheet_name: &str,
) -> Result<RunReport, RunError> {
    info!("Starting job execution");

    let sheets = list_sheets(backend).await?;
    let deleted = enforce_retention(backend, &sheets, cfg.retention_cap, cfg.retention_order).await?;

    // Neither branch needs the other; the first error wins and the other result is dropped.
    let (sheet, rows) = tokio::try_join!(
        async { add_sheet(backend, sheet_name).await.map_err(RunError::from) },
        async { fetch_timed(fetcher, &cfg.crawl_url).await.map_err(RunError::from) },
    )?;

    let rows = sort_rows(rows);
    let range = write_range(backend, sheet_name, &rows).await?;
    format_sheet(backend, sheet.id, &rows).await?;

    info!(
        "finished writing data and formatting sheetId {} (name \"{}\")",
        sheet.id, sheet_name
    );

    Ok(RunReport {
        sheet_id: sheet.id,
        sheet_name: sheet_name.to_string(),
        range,
        rows: rows.len(),
        deleted_sheet: deleted.map(|sheet| sheet.id),
    })
}

/// Runs the pipeline, logging the outcome. The result is still handed back so a
/// scheduler can react to failures.
pub async fn run_with_error_handling(
    cfg: &Cfg,
    backend: &dyn SpreadsheetBackend,
    fetcher: &dyn DataFetcher,
) -> Result<RunReport, RunError> {
    match run_job(cfg, backend, fetcher).await {
        Ok(report) => {
            info!("Job completed successfully");
            debug!("Run report: {:?}", report);
            Ok(report)
        }
        Err(e) => {
            error!("There was an error: {}", e);
            Err(e)
        }
    }
}

/// Fetch and sort only, then export as CSV. No spreadsheet calls.
pub async fn run_dry(cfg: &Cfg, fetcher: &dyn DataFetcher) -> Result<Vec<Row>, RunError> {
    info!("Dry run: spreadsheet will not be touched");
    let rows = sort_rows(fetch_timed(fetcher, &cfg.crawl_url).await?);
    csv_sink::write_rows(cfg.csv_path.as_deref(), &rows, true).map_err(RunError::Export)?;
    Ok(rows)
}

async fn fetch_timed(fetcher: &dyn DataFetcher, url: &str) -> Result<Vec<Row>, FetchError> {
    info!("Starting to get data from {} ({} strategy)", url, fetcher.name());
    let before = Instant::now();
    let rows = fetcher.fetch_rows(url).await?;
    info!(
        "Finished getting {} rows in {} milliseconds",
        rows.len(),
        before.elapsed().as_millis()
    );
    Ok(rows)
}

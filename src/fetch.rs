//! The data-acquisition contract shared by both fetch strategies.
//!
//! A strategy returns the table's rows in DOM order, header first. Each row
//! carries exactly three cells, trimmed, keeping only the first line of any
//! multi-line cell. Anything else fails the whole fetch.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::browser_fetch::BrowserFetcher;
use crate::cfg::{Cfg, FetchStrategy};
use crate::html_fetch::HtmlFetcher;

pub const ROW_WIDTH: usize = 3;

/// One scraped record: label, value-A, value-B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub [String; ROW_WIDTH]);

impl Row {
    pub fn new(label: impl Into<String>, a: impl Into<String>, b: impl Into<String>) -> Self {
        Row([label.into(), a.into(), b.into()])
    }

    pub fn label(&self) -> &str {
        &self.0[0]
    }

    pub fn cells(&self) -> &[String] {
        &self.0
    }
}

impl From<[&str; ROW_WIDTH]> for Row {
    fn from(cells: [&str; ROW_WIDTH]) -> Self {
        Row(cells.map(str::to_string))
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("browser automation failed: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("browser could not be configured: {0}")]
    BrowserConfig(String),
    #[error("invalid table selector {0:?}")]
    Selector(String),
    #[error("table {0:?} not found on page")]
    TableNotFound(String),
    #[error("table {0:?} has no rows")]
    EmptyTable(String),
    #[error("row {index} has {found} cells, expected at least 3")]
    ShortRow { index: usize, found: usize },
    #[error("unexpected extraction result: {0}")]
    Extraction(String),
}

#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    async fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, FetchError>;
}

/// Picks the strategy once, at construction time.
pub fn build_fetcher(cfg: &Cfg) -> Result<Box<dyn DataFetcher>, FetchError> {
    info!("Using {:?} fetch strategy", cfg.strategy);
    let fetcher: Box<dyn DataFetcher> = match cfg.strategy {
        FetchStrategy::Static => Box::new(HtmlFetcher::new(
            &cfg.table_selector,
            Duration::from_secs(cfg.http_timeout_secs),
        )?),
        FetchStrategy::Rendered => Box::new(BrowserFetcher::new(
            &cfg.table_selector,
            cfg.chrome_executable.clone(),
        )),
    };
    Ok(fetcher)
}

/// Trims a cell and keeps its first line.
pub fn clean_cell(text: &str) -> String {
    text.trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim_end()
        .to_string()
}

/// Turns raw per-row cell texts into `Row`s, ignoring cells past the third.
pub fn rows_from_cells(selector: &str, raw: Vec<Vec<String>>) -> Result<Vec<Row>, FetchError> {
    if raw.is_empty() {
        return Err(FetchError::EmptyTable(selector.to_string()));
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, cells)| match cells.as_slice() {
            [label, a, b, ..] => Ok(Row::new(clean_cell(label), clean_cell(a), clean_cell(b))),
            _ => Err(FetchError::ShortRow {
                index,
                found: cells.len(),
            }),
        })
        .collect()
}

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::fetch::{rows_from_cells, DataFetcher, FetchError, Row};

/// Static strategy: one GET, parse the body, read the table. Page scripts never run.
pub struct HtmlFetcher {
    client: Client,
    selector: String,
}

impl HtmlFetcher {
    pub fn new(selector: &str, timeout: Duration) -> Result<Self, FetchError> {
        Selector::parse(selector).map_err(|_| FetchError::Selector(selector.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            selector: selector.to_string(),
        })
    }
}

#[async_trait]
impl DataFetcher for HtmlFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, FetchError> {
        debug!("GET {}", url);
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("Received {} bytes", body.len());

        extract_table(&body, &self.selector)
    }
}

/// Reads the first three cells of every row of the table matching `selector`.
pub fn extract_table(html: &str, selector: &str) -> Result<Vec<Row>, FetchError> {
    let table_selector =
        Selector::parse(selector).map_err(|_| FetchError::Selector(selector.to_string()))?;
    let document = Html::parse_document(html);

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| FetchError::TableNotFound(selector.to_string()))?;

    let raw = table_rows(table)
        .into_iter()
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| cell.text().collect::<String>())
                .collect()
        })
        .collect();

    rows_from_cells(selector, raw)
}

/// The table's own rows, like `HTMLTableElement.rows`: head rows first, foot
/// rows last, and nothing from nested tables.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut head = Vec::new();
    let mut body = Vec::new();
    let mut foot = Vec::new();

    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => body.push(child),
            section @ ("thead" | "tbody" | "tfoot") => {
                let rows = child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "tr");
                match section {
                    "thead" => head.extend(rows),
                    "tfoot" => foot.extend(rows),
                    _ => body.extend(rows),
                }
            }
            _ => {}
        }
    }

    head.into_iter().chain(body).chain(foot).collect()
}

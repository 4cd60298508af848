use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::process::ExitStatus;
use tracing::{debug, warn};

use crate::fetch::{rows_from_cells, DataFetcher, FetchError, Row};

const CHROME_ARGS: [&str; 3] = ["--disable-gpu", "--single-process", "--disable-setuid-sandbox"];

/// What the in-page extraction hands back.
#[derive(Debug, Deserialize)]
struct Extracted {
    found: bool,
    rows: Vec<Vec<String>>,
}

/// Rendered strategy: headless Chromium with page scripts disabled and images
/// blocked. Only the extraction expression runs in the page.
pub struct BrowserFetcher {
    selector: String,
    executable: Option<String>,
}

impl BrowserFetcher {
    pub fn new(selector: &str, executable: Option<String>) -> Self {
        Self {
            selector: selector.to_string(),
            executable,
        }
    }

    fn config(&self) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder().no_sandbox().args(CHROME_ARGS);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(FetchError::BrowserConfig)
    }

    async fn extract(&self, browser: &Browser, url: &str) -> Result<Vec<Row>, FetchError> {
        let page = browser.new_page("about:blank").await?;
        page.execute(SetScriptExecutionDisabledParams::new(true)).await?;

        let blocker = block_images(&page).await?;
        let outcome = self.navigate_and_read(&page, url).await;
        blocker.abort();
        outcome
    }

    async fn navigate_and_read(&self, page: &Page, url: &str) -> Result<Vec<Row>, FetchError> {
        debug!("Navigating to {}", url);
        page.goto(url).await?;

        let params = EvaluateParams::builder()
            .expression(extraction_script(&self.selector))
            .return_by_value(true)
            .build()
            .map_err(FetchError::Extraction)?;
        let extracted: Extracted = page
            .evaluate_expression(params)
            .await?
            .into_value()
            .map_err(|e| FetchError::Extraction(e.to_string()))?;

        if !extracted.found {
            return Err(FetchError::TableNotFound(self.selector.clone()));
        }
        rows_from_cells(&self.selector, extracted.rows)
    }

    /// Launches a browser, extracts the table and tears the process down
    /// whatever the extraction outcome. The outer error is a failed launch; the
    /// exit status is that of the reaped browser process.
    async fn fetch_and_reap(
        &self,
        url: &str,
    ) -> Result<(Result<Vec<Row>, FetchError>, Option<ExitStatus>), FetchError> {
        let (mut browser, mut handler) = Browser::launch(self.config()?).await?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let outcome = self.extract(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        let exit = match browser.wait().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to reap browser process: {}", e);
                None
            }
        };
        events.abort();
        debug!("Browser exited with {:?}", exit);

        Ok((outcome, exit))
    }
}

#[async_trait]
impl DataFetcher for BrowserFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch_rows(&self, url: &str) -> Result<Vec<Row>, FetchError> {
        let (outcome, _exit) = self.fetch_and_reap(url).await?;
        outcome
    }
}

/// Intercepts image requests and fails them before they hit the network.
async fn block_images(page: &Page) -> Result<tokio::task::JoinHandle<()>, FetchError> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    page.execute(
        EnableParams::builder()
            .pattern(
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(ResourceType::Image)
                    .build(),
            )
            .build(),
    )
    .await?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let blocked = page
                .execute(FailRequestParams::new(
                    event.request_id.clone(),
                    ErrorReason::BlockedByClient,
                ))
                .await;
            if let Err(e) = blocked {
                debug!("Could not block image request: {}", e);
            }
        }
    }))
}

/// Page-context expression returning `{ found, rows }`, one inner array per
/// table row holding every cell's `innerText`.
fn extraction_script(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{\n  const table = document.querySelector({quoted});\n  if (!table) return {{ found: false, rows: [] }};\n  return {{ found: true, rows: Array.from(table.rows, tr => Array.from(tr.cells, td => td.innerText)) }};\n}})()"
    )
}

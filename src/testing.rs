//! In-memory doubles for the spreadsheet backend and the data fetcher.

use async_trait::async_trait;
use google_sheets4::api::{
    AddSheetResponse, BatchUpdateSpreadsheetResponse, Request, Response, SheetProperties,
    ValueRange,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::fetch::{DataFetcher, FetchError, Row};
use crate::sheets::{SheetsError, SpreadsheetBackend};

#[derive(Debug, Clone)]
pub enum BackendCall {
    SheetProperties,
    BatchUpdate(Vec<Request>),
    UpdateValues { range: String, values: Vec<Vec<Value>> },
}

/// Keeps a sheet list in memory, applies add/delete requests to it and records
/// every call in order.
pub struct RecordingBackend {
    sheets: Mutex<Vec<SheetProperties>>,
    calls: Mutex<Vec<BackendCall>>,
    next_id: Mutex<i32>,
    fail_listing: bool,
}

impl RecordingBackend {
    pub fn with_sheets(sheets: &[(i32, &str)]) -> Self {
        let props = sheets
            .iter()
            .map(|(id, title)| SheetProperties {
                sheet_id: Some(*id),
                title: Some(title.to_string()),
                ..Default::default()
            })
            .collect();
        let next_id = sheets.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;

        Self {
            sheets: Mutex::new(props),
            calls: Mutex::new(Vec::new()),
            next_id: Mutex::new(next_id),
            fail_listing: false,
        }
    }

    /// `count` sheets with ids `1..=count`, listed in id order.
    pub fn with_sheet_count(count: i32) -> Self {
        let titles: Vec<String> = (1..=count).map(|id| format!("Sheet{}", id)).collect();
        let sheets: Vec<(i32, &str)> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| (i as i32 + 1, title.as_str()))
            .collect();
        Self::with_sheets(&sheets)
    }

    pub fn failing_listing() -> Self {
        Self {
            fail_listing: true,
            ..Self::with_sheets(&[])
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sheet_ids(&self) -> Vec<i32> {
        self.sheets
            .lock()
            .unwrap()
            .iter()
            .filter_map(|props| props.sheet_id)
            .collect()
    }

    pub fn batch_updates(&self) -> Vec<Vec<Request>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::BatchUpdate(requests) => Some(requests),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SpreadsheetBackend for RecordingBackend {
    async fn sheet_properties(&self) -> Result<Vec<SheetProperties>, SheetsError> {
        self.calls.lock().unwrap().push(BackendCall::SheetProperties);
        if self.fail_listing {
            return Err(SheetsError::Malformed("listing unavailable".to_string()));
        }
        Ok(self.sheets.lock().unwrap().clone())
    }

    async fn batch_update(
        &self,
        requests: Vec<Request>,
    ) -> Result<BatchUpdateSpreadsheetResponse, SheetsError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::BatchUpdate(requests.clone()));

        let mut sheets = self.sheets.lock().unwrap();
        let mut replies = Vec::new();
        for request in requests {
            let mut reply = Response::default();
            if let Some(add) = request.add_sheet {
                let mut props = add.properties.unwrap_or_default();
                let mut next_id = self.next_id.lock().unwrap();
                props.sheet_id = Some(*next_id);
                *next_id += 1;
                let at = (props.index.unwrap_or(0).max(0) as usize).min(sheets.len());
                sheets.insert(at, props.clone());
                reply.add_sheet = Some(AddSheetResponse {
                    properties: Some(props),
                });
            }
            if let Some(delete) = request.delete_sheet {
                sheets.retain(|props| props.sheet_id != delete.sheet_id);
            }
            replies.push(reply);
        }

        Ok(BatchUpdateSpreadsheetResponse {
            replies: Some(replies),
            ..Default::default()
        })
    }

    async fn update_values(&self, range: &str, values: ValueRange) -> Result<(), SheetsError> {
        self.calls.lock().unwrap().push(BackendCall::UpdateValues {
            range: range.to_string(),
            values: values.values.unwrap_or_default(),
        });
        Ok(())
    }
}

/// Returns canned rows, or a missing-table error.
pub struct StubFetcher {
    rows: Option<Vec<Row>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows: Some(rows),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            rows: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataFetcher for StubFetcher {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch_rows(&self, _url: &str) -> Result<Vec<Row>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rows
            .clone()
            .ok_or_else(|| FetchError::TableNotFound("#stub".to_string()))
    }
}

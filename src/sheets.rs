use async_trait::async_trait;
use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse,
    DeleteSheetRequest, Request, Scope, SheetProperties, ValueRange,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::SheetsHub;
use crate::fetch::Row;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Sheets API call failed: {0}")]
    Api(#[from] google_sheets4::Error),
    #[error("malformed spreadsheet response: {0}")]
    Malformed(String),
    #[error("batch update returned no addSheet reply")]
    MissingReply,
}

/// A tab within the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub id: i32,
    pub title: String,
}

/// The three Sheets API calls the pipeline consumes.
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    async fn sheet_properties(&self) -> Result<Vec<SheetProperties>, SheetsError>;

    async fn batch_update(
        &self,
        requests: Vec<Request>,
    ) -> Result<BatchUpdateSpreadsheetResponse, SheetsError>;

    async fn update_values(&self, range: &str, values: ValueRange) -> Result<(), SheetsError>;
}

/// `SpreadsheetBackend` over a google-sheets4 hub, bound to one spreadsheet.
pub struct SheetsClient {
    hub: SheetsHub,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(hub: SheetsHub, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            hub,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }
}

#[async_trait]
impl SpreadsheetBackend for SheetsClient {
    async fn sheet_properties(&self) -> Result<Vec<SheetProperties>, SheetsError> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(&self.spreadsheet_id)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await?;

        Ok(spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .collect())
    }

    async fn batch_update(
        &self,
        requests: Vec<Request>,
    ) -> Result<BatchUpdateSpreadsheetResponse, SheetsError> {
        let body = BatchUpdateSpreadsheetRequest {
            requests: Some(requests),
            ..Default::default()
        };
        let (_, response) = self
            .hub
            .spreadsheets()
            .batch_update(body, &self.spreadsheet_id)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await?;
        Ok(response)
    }

    async fn update_values(&self, range: &str, values: ValueRange) -> Result<(), SheetsError> {
        self.hub
            .spreadsheets()
            .values_update(values, &self.spreadsheet_id, range)
            .value_input_option("RAW")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await?;
        Ok(())
    }
}

/// Sheet ids and titles in backend listing order.
pub async fn list_sheets(backend: &dyn SpreadsheetBackend) -> Result<Vec<SheetInfo>, SheetsError> {
    let sheets = backend
        .sheet_properties()
        .await?
        .into_iter()
        .map(|props| {
            let id = props
                .sheet_id
                .ok_or_else(|| SheetsError::Malformed("sheet without a sheetId".to_string()))?;
            Ok(SheetInfo {
                id,
                title: props.title.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, SheetsError>>()?;

    info!("Spreadsheet has {} sheets", sheets.len());
    Ok(sheets)
}

/// Inserts a new leftmost tab named `name`.
pub async fn add_sheet(
    backend: &dyn SpreadsheetBackend,
    name: &str,
) -> Result<SheetInfo, SheetsError> {
    info!("Adding sheet {:?}", name);
    let request = Request {
        add_sheet: Some(AddSheetRequest {
            properties: Some(SheetProperties {
                title: Some(name.to_string()),
                index: Some(0),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    let response = backend.batch_update(vec![request]).await?;
    let props = response
        .replies
        .and_then(|replies| replies.into_iter().next())
        .and_then(|reply| reply.add_sheet)
        .and_then(|added| added.properties)
        .ok_or(SheetsError::MissingReply)?;
    let id = props
        .sheet_id
        .ok_or_else(|| SheetsError::Malformed("addSheet reply without a sheetId".to_string()))?;

    debug!("Created sheet {} ({})", id, name);
    Ok(SheetInfo {
        id,
        title: props.title.unwrap_or_else(|| name.to_string()),
    })
}

pub async fn delete_sheet(backend: &dyn SpreadsheetBackend, sheet_id: i32) -> Result<(), SheetsError> {
    info!("Deleting sheet {}", sheet_id);
    let request = Request {
        delete_sheet: Some(DeleteSheetRequest {
            sheet_id: Some(sheet_id),
        }),
        ..Default::default()
    };
    backend.batch_update(vec![request]).await?;
    Ok(())
}

/// Writes `rows` as raw values starting at A1 of `sheet_name`. Returns the range written.
pub async fn write_range(
    backend: &dyn SpreadsheetBackend,
    sheet_name: &str,
    rows: &[Row],
) -> Result<String, SheetsError> {
    let width = rows.first().map(|row| row.cells().len()).unwrap_or(0);
    let range = format!("{}!{}", quote_sheet_name(sheet_name), get_data_range(rows.len(), width));
    debug!("Writing {} rows to {}", rows.len(), range);

    let values = rows
        .iter()
        .map(|row| row.cells().iter().cloned().map(Value::String).collect())
        .collect();
    let body = ValueRange {
        range: Some(range.clone()),
        values: Some(values),
        ..Default::default()
    };

    backend.update_values(&range, body).await?;
    Ok(range)
}

/// `A1:<last column><last row>` for a grid of the given size.
pub fn get_data_range(row_count: usize, column_count: usize) -> String {
    format!("A1:{}{}", column_letter(column_count), row_count)
}

/// Bijective base-26 column name: 1 → A, 26 → Z, 27 → AA, 703 → AAA.
pub fn column_letter(column: usize) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quotes a sheet title for A1 notation.
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, RecordingBackend};

    #[test]
    fn column_letters_are_bijective_base_26() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(3), "C");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(53), "BA");
        assert_eq!(column_letter(702), "ZZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn data_range_covers_the_grid() {
        assert_eq!(get_data_range(3, 3), "A1:C3");
        assert_eq!(get_data_range(41, 26), "A1:Z41");
        assert_eq!(get_data_range(2, 28), "A1:AB2");
    }

    #[test]
    fn sheet_names_are_quoted() {
        assert_eq!(quote_sheet_name("2026-10-19"), "'2026-10-19'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
    }

    #[tokio::test]
    async fn list_sheets_keeps_backend_order() {
        let backend = RecordingBackend::with_sheets(&[(7, "2026-01-02"), (3, "2026-01-01")]);
        let sheets = list_sheets(&backend).await.unwrap();
        assert_eq!(
            sheets,
            vec![
                SheetInfo { id: 7, title: "2026-01-02".to_string() },
                SheetInfo { id: 3, title: "2026-01-01".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn list_sheets_of_empty_spreadsheet() {
        let backend = RecordingBackend::with_sheets(&[]);
        assert!(list_sheets(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_sheet_inserts_at_index_zero_and_reads_the_reply() {
        let backend = RecordingBackend::with_sheets(&[]);
        let sheet = add_sheet(&backend, "2026-10-19").await.unwrap();

        assert_eq!(sheet.title, "2026-10-19");
        match &backend.calls()[..] {
            [BackendCall::BatchUpdate(requests)] => {
                let props = requests[0]
                    .add_sheet
                    .as_ref()
                    .and_then(|add| add.properties.as_ref())
                    .unwrap();
                assert_eq!(props.index, Some(0));
                assert_eq!(props.title.as_deref(), Some("2026-10-19"));
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }

    #[tokio::test]
    async fn write_range_sends_raw_strings() {
        let backend = RecordingBackend::with_sheets(&[]);
        let rows = vec![Row::from(["name", "buy", "sell"]), Row::from(["USD", "3.50", "3.60"])];
        let range = write_range(&backend, "2026-10-19", &rows).await.unwrap();

        assert_eq!(range, "'2026-10-19'!A1:C2");
        match &backend.calls()[..] {
            [BackendCall::UpdateValues { range, values }] => {
                assert_eq!(range, "'2026-10-19'!A1:C2");
                assert_eq!(values[1][0], Value::String("USD".to_string()));
                assert_eq!(values.len(), 2);
            }
            other => panic!("unexpected calls: {:?}", other),
        }
    }
}

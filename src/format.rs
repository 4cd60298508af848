use google_sheets4::api::{
    AutoResizeDimensionsRequest, Border, CellData, CellFormat, DimensionRange, GridProperties,
    GridRange, RepeatCellRequest, Request, SheetProperties, TextFormat, UpdateBordersRequest,
    UpdateSheetPropertiesRequest,
};
use google_sheets4::FieldMask;
use tracing::{debug, info};

use crate::fetch::Row;
use crate::sheets::{SheetsError, SpreadsheetBackend};

/// Sends the cosmetic pass for a freshly written sheet in one batch update.
pub async fn format_sheet(
    backend: &dyn SpreadsheetBackend,
    sheet_id: i32,
    rows: &[Row],
) -> Result<(), SheetsError> {
    let columns = rows.first().map(|row| row.cells().len()).unwrap_or(0);
    let requests = format_requests(sheet_id, rows.len(), columns);
    info!("Formatting sheet {} ({}x{})", sheet_id, rows.len(), columns);
    debug!("Format requests: {:?}", requests);

    backend.batch_update(requests).await?;
    Ok(())
}

/// Borders, bold header, centred value columns, grid trimmed to the data, then
/// autosized columns. The trim comes after the content requests.
pub fn format_requests(sheet_id: i32, rows: usize, columns: usize) -> Vec<Request> {
    let rows = to_index(rows);
    let columns = to_index(columns);

    vec![
        Request {
            update_borders: Some(UpdateBordersRequest {
                range: Some(GridRange {
                    sheet_id: Some(sheet_id),
                    start_row_index: Some(0),
                    end_row_index: Some(rows),
                    start_column_index: Some(0),
                    end_column_index: Some(columns),
                }),
                top: Some(solid()),
                bottom: Some(solid()),
                left: Some(solid()),
                right: Some(solid()),
                inner_horizontal: Some(solid()),
                inner_vertical: Some(solid()),
            }),
            ..Default::default()
        },
        Request {
            repeat_cell: Some(RepeatCellRequest {
                range: Some(GridRange {
                    sheet_id: Some(sheet_id),
                    start_row_index: Some(0),
                    end_row_index: Some(1),
                    ..Default::default()
                }),
                cell: Some(CellData {
                    user_entered_format: Some(CellFormat {
                        text_format: Some(TextFormat {
                            bold: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&["userEnteredFormat.textFormat.bold"])),
            }),
            ..Default::default()
        },
        Request {
            repeat_cell: Some(RepeatCellRequest {
                range: Some(GridRange {
                    sheet_id: Some(sheet_id),
                    start_column_index: Some(1),
                    end_column_index: Some(columns),
                    ..Default::default()
                }),
                cell: Some(CellData {
                    user_entered_format: Some(CellFormat {
                        horizontal_alignment: Some("CENTER".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&["userEnteredFormat.horizontalAlignment"])),
            }),
            ..Default::default()
        },
        Request {
            update_sheet_properties: Some(UpdateSheetPropertiesRequest {
                properties: Some(SheetProperties {
                    sheet_id: Some(sheet_id),
                    grid_properties: Some(GridProperties {
                        row_count: Some(rows),
                        column_count: Some(columns),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&[
                    "gridProperties.rowCount",
                    "gridProperties.columnCount",
                ])),
            }),
            ..Default::default()
        },
        Request {
            auto_resize_dimensions: Some(AutoResizeDimensionsRequest {
                dimensions: Some(DimensionRange {
                    sheet_id: Some(sheet_id),
                    dimension: Some("COLUMNS".to_string()),
                    start_index: Some(0),
                    end_index: Some(columns),
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]
}

fn solid() -> Border {
    Border {
        style: Some("SOLID".to_string()),
        width: Some(1),
        ..Default::default()
    }
}

fn to_index(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

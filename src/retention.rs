use chrono::NaiveDate;
use tracing::{debug, info};

use crate::cfg::RetentionOrder;
use crate::sheets::{delete_sheet, SheetInfo, SheetsError, SpreadsheetBackend};

/// Deletes the oldest sheet once the count reaches `cap`. At most one sheet is
/// removed per call; the deletion is permanent.
pub async fn enforce_retention(
    backend: &dyn SpreadsheetBackend,
    sheets: &[SheetInfo],
    cap: usize,
    order: RetentionOrder,
) -> Result<Option<SheetInfo>, SheetsError> {
    if sheets.is_empty() || sheets.len() < cap {
        debug!("{} sheets, below retention cap {}", sheets.len(), cap);
        return Ok(None);
    }

    let Some(oldest) = oldest_sheet(sheets, order) else {
        return Ok(None);
    };

    info!(
        "Sheet count {} reached retention cap {}, removing sheet {} ({:?})",
        sheets.len(),
        cap,
        oldest.id,
        oldest.title
    );
    delete_sheet(backend, oldest.id).await?;
    Ok(Some(oldest.clone()))
}

/// New sheets go in at index 0, so with `Listing` the tail is the oldest.
/// `TitleDate` trusts the ISO date in the title instead and only falls back to
/// the tail when no title parses.
pub fn oldest_sheet(sheets: &[SheetInfo], order: RetentionOrder) -> Option<&SheetInfo> {
    match order {
        RetentionOrder::Listing => sheets.last(),
        RetentionOrder::TitleDate => sheets
            .iter()
            .filter_map(|sheet| {
                NaiveDate::parse_from_str(&sheet.title, "%Y-%m-%d")
                    .ok()
                    .map(|date| (date, sheet))
            })
            .min_by_key(|(date, _)| *date)
            .map(|(_, sheet)| sheet)
            .or_else(|| sheets.last()),
    }
}

use anyhow::Result;
use csv::Writer;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::fetch::Row;

/// Writes rows as CSV, header row included, to `csv_path` or stdout.
/// An existing file is replaced.
pub fn write_rows(csv_path: Option<&str>, rows: &[Row], ensure_directories: bool) -> Result<()> {
    match csv_path {
        Some(csv_path) => {
            let path = Path::new(csv_path);
            info!("Writing {} rows to CSV file: {}", rows.len(), csv_path);

            if ensure_directories {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                    debug!("Created directory: {:?}", parent);
                }
            }

            write_to(File::create(path)?, rows)
        }
        None => write_to(io::stdout().lock(), rows),
    }
}

fn write_to<W: Write>(sink: W, rows: &[Row]) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows_creating_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/rates.csv");
        let rows = vec![
            Row::from(["name", "buy", "sell"]),
            Row::from(["EUR", "4,10", "4.20"]),
        ];

        write_rows(Some(path.to_str().unwrap()), &rows, true).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "name,buy,sell\nEUR,\"4,10\",4.20\n");
    }

    #[test]
    fn existing_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(&path, "stale\n").unwrap();

        write_rows(Some(path.to_str().unwrap()), &[Row::from(["a", "b", "c"])], false).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b,c\n");
    }
}

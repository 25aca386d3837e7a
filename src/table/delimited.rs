use csv::{ReaderBuilder, Trim};
use std::io::Cursor;
use tracing::{debug, warn};

use super::infer::{clean_str, convert_cell, infer_column_type};
use super::{Table, Value};
use crate::error::{PipelineError, Result};

/// Read a comma-separated file with a header row. Column types are inferred
/// over every row before any cell is converted.
pub fn read_csv(bytes: &[u8]) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(Cursor::new(bytes));

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| PipelineError::parse("csv", e))?
        .iter()
        .map(|h| clean_str(h).to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::parse("csv", "missing header row"));
    }

    let mut raw: Vec<Vec<String>> = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            warn!(record = idx + 1, error = %e, "CSV parsing failed");
            PipelineError::parse("csv", format!("record {}: {}", idx + 1, e))
        })?;
        raw.push(record.iter().map(|s| s.to_string()).collect());
    }

    let types: Vec<_> = (0..headers.len())
        .map(|col| infer_column_type(raw.iter().map(move |row| row[col].as_str())))
        .collect();
    debug!(?types, "inferred column types");

    let rows: Vec<Vec<Value>> = raw
        .iter()
        .map(|row| {
            row.iter()
                .zip(&types)
                .map(|(cell, ty)| convert_cell(cell, *ty))
                .collect()
        })
        .collect();

    Table::new(headers, rows)
}

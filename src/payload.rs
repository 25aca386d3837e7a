use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::table::Table;

/// The request body for one selected row.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    /// 1-based row the payload was built from.
    pub row: usize,
    /// Pretty-printed JSON, as shown to the analyst and sent on the wire.
    pub text: String,
    pub body: Json,
}

/// Serialize row `row` (1-based) of `table` into a JSON object, columns in
/// file order, datetimes as ISO-8601. Building the same row twice gives
/// byte-identical output.
pub fn build_payload(table: &Table, row: usize) -> Result<Payload> {
    let count = table.len();
    let record = row
        .checked_sub(1)
        .and_then(|i| table.record(i))
        .ok_or(PipelineError::RowOutOfRange { row, count })?;

    let object: Map<String, Json> = record
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_json()))
        .collect();
    let body = Json::Object(object);
    let text = serde_json::to_string_pretty(&body)
        .map_err(|e| PipelineError::parse("payload", e))?;

    debug!(row, payload = %text, "built payload");
    info!(row, fields = record.iter().count(), "payload ready");
    Ok(Payload { row, text, body })
}

use chrono::NaiveDateTime;
use serde_json::Value as Json;
use tracing::{info, warn};

use crate::datetime;
use crate::error::{PipelineError, Result, Warning};
use crate::reconcile::Reconciliation;
use crate::table::{Record, Value};

pub const RECEIVED_DATE: &str = "msdyn_receiveddate";

/// A datetime kept both as a value for arithmetic and as the string shown
/// to the analyst.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub at: NaiveDateTime,
    pub display: String,
}

impl Timestamp {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            display: datetime::to_display(&at),
            at,
        }
    }
}

/// The prediction as presented: one result entry joined with its source row
/// and, once an actuals file is applied, the reconciliation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayRecord {
    pub ticket_number: Option<Value>,
    pub received: Option<Timestamp>,
    pub predicted_resolved: Option<Timestamp>,
    pub predicted_resolution_minutes: Option<u64>,
    pub reconciliation: Option<Reconciliation>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Record(DisplayRecord),
    Warning(Warning),
}

/// Round to the nearest whole minute, ties to even.
pub fn round_minutes(minutes: f64) -> i64 {
    minutes.round_ties_even() as i64
}

/// Build the display record from an inference response and the row that
/// produced it. Only the first result entry is used.
pub fn project_response(response: &Json, source: Record<'_>) -> Result<Projection> {
    let object = response
        .as_object()
        .ok_or_else(|| PipelineError::InvalidResponse("expected a JSON object".into()))?;

    let results: &[Json] = match object.get("results") {
        None | Some(Json::Null) => &[],
        Some(Json::Array(items)) => items,
        Some(_) => {
            return Err(PipelineError::InvalidResponse(
                "`results` is not a list".into(),
            ))
        }
    };

    let Some(entry) = results.first() else {
        warn!("inference returned no results");
        return Ok(Projection::Warning(Warning::EmptyResult));
    };
    if results.len() > 1 {
        warn!(
            ignored = results.len() - 1,
            "response holds several results, using the first"
        );
    }
    let entry = entry
        .as_object()
        .ok_or_else(|| PipelineError::InvalidResponse("result entry is not an object".into()))?;

    let ticket_number = entry
        .get("TicketNumber")
        .map(Value::from)
        .filter(|v| !v.is_null());

    let predicted_resolution_minutes = match entry.get("predicted_resolution_minutes") {
        None | Some(Json::Null) => None,
        Some(raw) => Some(resolution_minutes(raw)?),
    };

    let predicted_resolved = match entry.get("predicted_resolved_date") {
        None | Some(Json::Null) => None,
        Some(raw) => Some(json_timestamp("predicted_resolved_date", raw)?),
    };

    let received = match source.get(RECEIVED_DATE) {
        None | Some(Value::Null) => None,
        Some(value) => Some(Timestamp::new(value.as_datetime().ok_or_else(|| {
            PipelineError::InvalidDateTime {
                field: RECEIVED_DATE.into(),
                value: value.to_string(),
            }
        })?)),
    };

    let record = DisplayRecord {
        ticket_number,
        received,
        predicted_resolved,
        predicted_resolution_minutes,
        reconciliation: None,
    };
    info!(
        ticket = ?record.ticket_number,
        minutes = ?record.predicted_resolution_minutes,
        "prediction projected"
    );
    Ok(Projection::Record(record))
}

fn resolution_minutes(raw: &Json) -> Result<u64> {
    let minutes = match raw {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|m| m.is_finite())
    .ok_or_else(|| {
        PipelineError::InvalidResponse(format!(
            "predicted_resolution_minutes is not numeric: {}",
            raw
        ))
    })?;

    let rounded = round_minutes(minutes);
    if rounded < 0 {
        warn!(minutes, "negative predicted resolution, clamping to 0");
    }
    Ok(rounded.max(0) as u64)
}

fn json_timestamp(field: &str, raw: &Json) -> Result<Timestamp> {
    raw.as_str()
        .and_then(datetime::parse_datetime)
        .map(Timestamp::new)
        .ok_or_else(|| PipelineError::InvalidDateTime {
            field: field.into(),
            value: raw.to_string(),
        })
}

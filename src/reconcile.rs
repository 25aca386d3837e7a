use std::fmt;
use tracing::{info, warn};

use crate::datetime;
use crate::error::{PipelineError, Result, Warning};
use crate::projection::{round_minutes, DisplayRecord, Timestamp};
use crate::table::{Table, Value};

pub const TICKET_NUMBER: &str = "TicketNumber";
pub const ACTUAL_RESOLVE_DT: &str = "actual_resolve_dt";
pub const ACTUAL_DURATION: &str = "actual_Duration";

const REQUIRED_COLUMNS: [&str; 3] = [TICKET_NUMBER, ACTUAL_RESOLVE_DT, ACTUAL_DURATION];

/// Label derived from the sign of `actual - predicted`. A positive delta,
/// resolved after the prediction, is labelled `Early`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlaStatus {
    Early,
    Delay,
}

impl SlaStatus {
    pub fn from_delta(delta_minutes: f64) -> Self {
        if delta_minutes > 0.0 {
            SlaStatus::Early
        } else {
            SlaStatus::Delay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlaStatus::Early => "Early",
            SlaStatus::Delay => "Delay",
        }
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub actual_resolved: Timestamp,
    /// Copied from the actuals file without unit conversion.
    pub actual_duration: Value,
    /// `actual - predicted` in minutes.
    pub signed_delta_minutes: f64,
    pub delta_minutes: u64,
    pub sla_status: SlaStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    Reconciled,
    Warning(Warning),
}

/// Check that an actuals upload carries the columns reconciliation reads.
pub fn check_actuals_columns(actuals: &Table) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !actuals.has_column(c))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::parse(
            "actuals",
            format!("missing required columns: {}", missing.join(", ")),
        ))
    }
}

/// Match `record` against the actuals table by ticket number and fill in
/// the reconciliation. The first matching row wins. On a miss or an error
/// the record is left as it was; a hit replaces any earlier reconciliation.
pub fn reconcile_actuals(actuals: &Table, record: &mut DisplayRecord) -> Result<ReconcileOutcome> {
    check_actuals_columns(actuals)?;

    let ticket = record
        .ticket_number
        .as_ref()
        .ok_or_else(|| PipelineError::MissingField(TICKET_NUMBER.into()))?;

    let Some(row) = actuals.records().find(|row| {
        row.get(TICKET_NUMBER)
            .map_or(false, |candidate| candidate.same_key(ticket))
    }) else {
        warn!(ticket = %ticket, "ticket not found in actuals");
        return Ok(ReconcileOutcome::Warning(Warning::NotFound {
            ticket_id: ticket.to_string(),
        }));
    };

    let predicted = record
        .predicted_resolved
        .as_ref()
        .ok_or_else(|| PipelineError::MissingField("predicted_resolved_date".into()))?;

    let raw_actual = row.get(ACTUAL_RESOLVE_DT);
    let actual_at = raw_actual
        .and_then(Value::as_datetime)
        .ok_or_else(|| PipelineError::InvalidDateTime {
            field: ACTUAL_RESOLVE_DT.into(),
            value: raw_actual.map(|v| v.to_string()).unwrap_or_default(),
        })?;

    let signed = datetime::minutes_between(&predicted.at, &actual_at);
    let reconciliation = Reconciliation {
        actual_resolved: Timestamp::new(actual_at),
        actual_duration: row.get(ACTUAL_DURATION).cloned().unwrap_or(Value::Null),
        signed_delta_minutes: signed,
        delta_minutes: round_minutes(signed.abs()) as u64,
        sla_status: SlaStatus::from_delta(signed),
    };
    info!(
        ticket = %ticket,
        delta_minutes = signed,
        status = %reconciliation.sla_status,
        "actuals reconciled"
    );
    record.reconciliation = Some(reconciliation);
    Ok(ReconcileOutcome::Reconciled)
}

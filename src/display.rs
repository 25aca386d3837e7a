use serde_json::{Map, Value as Json};

use crate::projection::DisplayRecord;

/// Presentation columns, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayField {
    TicketNumber,
    ReceivedDate,
    PredictedResolvedDate,
    ActualResolveValue,
    ActualDuration,
    PredictedResolutionMinutes,
    DeltaMinutes,
    SlaStatus,
}

impl DisplayField {
    pub const ORDER: [DisplayField; 8] = [
        DisplayField::TicketNumber,
        DisplayField::ReceivedDate,
        DisplayField::PredictedResolvedDate,
        DisplayField::ActualResolveValue,
        DisplayField::ActualDuration,
        DisplayField::PredictedResolutionMinutes,
        DisplayField::DeltaMinutes,
        DisplayField::SlaStatus,
    ];

    /// Field name as it appears in files and responses.
    pub fn key(&self) -> &'static str {
        match self {
            DisplayField::TicketNumber => "TicketNumber",
            DisplayField::ReceivedDate => "msdyn_receiveddate",
            DisplayField::PredictedResolvedDate => "predicted_resolved_date",
            DisplayField::ActualResolveValue => "Actual_Resolve_Value",
            DisplayField::ActualDuration => "actual_Duration",
            DisplayField::PredictedResolutionMinutes => "predicted_resolution_minutes",
            DisplayField::DeltaMinutes => "Delta_Minutes",
            DisplayField::SlaStatus => "SLA_Status",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayField::TicketNumber => "Ticket Number",
            DisplayField::ReceivedDate => "Received Date",
            DisplayField::PredictedResolvedDate => "Predicted Resolve Date",
            DisplayField::ActualResolveValue => "Actual Resolve Date",
            DisplayField::ActualDuration => "Actual Duration",
            DisplayField::PredictedResolutionMinutes => "Predicted Resolution (min)",
            DisplayField::DeltaMinutes => "Delta (min)",
            DisplayField::SlaStatus => "SLA Status",
        }
    }

    fn value(&self, record: &DisplayRecord) -> Option<String> {
        let rec = record.reconciliation.as_ref();
        match self {
            DisplayField::TicketNumber => record.ticket_number.as_ref().map(|v| v.to_string()),
            DisplayField::ReceivedDate => record.received.as_ref().map(|t| t.display.clone()),
            DisplayField::PredictedResolvedDate => {
                record.predicted_resolved.as_ref().map(|t| t.display.clone())
            }
            DisplayField::ActualResolveValue => rec.map(|r| r.actual_resolved.display.clone()),
            DisplayField::ActualDuration => rec.map(|r| r.actual_duration.to_string()),
            DisplayField::PredictedResolutionMinutes => {
                record.predicted_resolution_minutes.map(|m| m.to_string())
            }
            DisplayField::DeltaMinutes => rec.map(|r| r.delta_minutes.to_string()),
            DisplayField::SlaStatus => rec.map(|r| r.sla_status.to_string()),
        }
    }
}

/// Ordered `(label, value)` pairs for every field the record carries.
pub fn format_display(record: &DisplayRecord) -> Vec<(&'static str, String)> {
    DisplayField::ORDER
        .iter()
        .filter_map(|field| field.value(record).map(|v| (field.label(), v)))
        .collect()
}

/// The same fields as a JSON object keyed by source field name.
pub fn display_json(record: &DisplayRecord) -> Json {
    let fields: Map<String, Json> = DisplayField::ORDER
        .iter()
        .filter_map(|field| {
            field
                .value(record)
                .map(|v| (field.key().to_string(), Json::String(v)))
        })
        .collect();
    Json::Object(fields)
}

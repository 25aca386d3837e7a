use tracing::{info, warn};

use crate::display::format_display;
use crate::error::{PipelineError, Result, Warning};
use crate::inference::InferenceBackend;
use crate::payload::{build_payload, Payload};
use crate::projection::{project_response, DisplayRecord, Projection};
use crate::reconcile::{reconcile_actuals, ReconcileOutcome};
use crate::table::{load_table, Table};

/// State of one interactive session. Each method is one user action: it
/// either completes or returns an error with the prior state intact.
#[derive(Debug, Default)]
pub struct Session {
    table: Option<Table>,
    payload: Option<Payload>,
    display: Option<DisplayRecord>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn display_record(&self) -> Option<&DisplayRecord> {
        self.display.as_ref()
    }

    /// Replace the primary table. A new table invalidates the payload and
    /// prediction built from the old one.
    pub fn load_table(&mut self, bytes: &[u8], file_name: &str) -> Result<usize> {
        let table = load_table(bytes, file_name)?;
        let count = table.len();
        self.table = Some(table);
        self.payload = None;
        self.display = None;
        Ok(count)
    }

    pub fn build_payload(&mut self, row: usize) -> Result<&Payload> {
        let table = self.table.as_ref().ok_or(PipelineError::NoTable)?;
        let payload = build_payload(table, row)?;
        Ok(self.payload.insert(payload))
    }

    /// Send the built payload and project the response. An empty result
    /// keeps the previous prediction and is returned as a warning.
    pub fn run_inference(&mut self, backend: &dyn InferenceBackend) -> Result<Option<Warning>> {
        let payload = self.payload.as_ref().ok_or(PipelineError::NoPayload)?;
        let table = self.table.as_ref().ok_or(PipelineError::NoTable)?;
        let source = table
            .record(payload.row - 1)
            .ok_or(PipelineError::RowOutOfRange {
                row: payload.row,
                count: table.len(),
            })?;

        let response = backend.predict(payload)?;
        match project_response(&response, source)? {
            Projection::Record(record) => {
                info!(row = payload.row, "prediction ready");
                self.display = Some(record);
                Ok(None)
            }
            Projection::Warning(w) => {
                warn!(warning = %w, "inference produced no prediction");
                Ok(Some(w))
            }
        }
    }

    /// Load an actuals file and reconcile it against the current prediction.
    pub fn reconcile_actuals(&mut self, bytes: &[u8], file_name: &str) -> Result<ReconcileOutcome> {
        let record = self.display.as_mut().ok_or(PipelineError::NoPrediction)?;
        let actuals = load_table(bytes, file_name)?;
        reconcile_actuals(&actuals, record)
    }

    /// Labelled rows of the current prediction, if there is one.
    pub fn display_rows(&self) -> Option<Vec<(&'static str, String)>> {
        self.display.as_ref().map(format_display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::SlaStatus;
    use serde_json::{json, Value as Json};
    use std::cell::RefCell;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,casesla=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const TICKETS: &str = "TicketNumber,msdyn_receiveddate,Priority\n\
                           T-1,2024-05-01 07:00:00,1\n\
                           T-2,2024-05-01 09:30:00,2\n\
                           T-3,2024-05-01 11:00:00,3\n";

    /// Replays a canned response and keeps the payloads it was sent.
    struct Stub {
        response: Result<Json>,
        seen: RefCell<Vec<Json>>,
    }

    impl Stub {
        fn ok(response: Json) -> Self {
            Self {
                response: Ok(response),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn timing_out() -> Self {
            Self {
                response: Err(PipelineError::Timeout { secs: 240 }),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl InferenceBackend for Stub {
        fn predict(&self, payload: &Payload) -> Result<Json> {
            self.seen.borrow_mut().push(payload.body.clone());
            match &self.response {
                Ok(json) => Ok(json.clone()),
                Err(_) => Err(PipelineError::Timeout { secs: 240 }),
            }
        }
    }

    fn t2_response() -> Json {
        json!({"results": [{
            "TicketNumber": "T-2",
            "predicted_resolved_date": "2024-05-02T08:00:00",
            "predicted_resolution_minutes": 30.2
        }]})
    }

    fn predicted_session() -> Session {
        let mut session = Session::new();
        session.load_table(TICKETS.as_bytes(), "tickets.csv").unwrap();
        session.build_payload(2).unwrap();
        session.run_inference(&Stub::ok(t2_response())).unwrap();
        session
    }

    #[test]
    fn end_to_end_row_two() {
        init_test_logging();
        let mut session = Session::new();
        assert_eq!(session.load_table(TICKETS.as_bytes(), "tickets.csv").unwrap(), 3);

        let payload = session.build_payload(2).unwrap();
        assert_eq!(payload.body["TicketNumber"], "T-2");
        assert_eq!(payload.body["Priority"], 2);

        let stub = Stub::ok(t2_response());
        assert_eq!(session.run_inference(&stub).unwrap(), None);
        assert_eq!(stub.seen.borrow().len(), 1);
        assert_eq!(stub.seen.borrow()[0]["TicketNumber"], "T-2");

        let record = session.display_record().unwrap();
        assert_eq!(record.predicted_resolution_minutes, Some(30));
        assert_eq!(
            record.predicted_resolved.as_ref().unwrap().display,
            "05/02/2024 08:00:00"
        );
        assert_eq!(
            record.received.as_ref().unwrap().display,
            "05/01/2024 09:30:00"
        );

        let actuals = "TicketNumber,actual_resolve_dt,actual_Duration\n\
                       T-1,2024-05-01 08:00:00,60\n\
                       T-2,2024-05-02 07:45:00,1335\n";
        let outcome = session
            .reconcile_actuals(actuals.as_bytes(), "actuals.csv")
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Reconciled);
        let rec = session.display_record().unwrap().reconciliation.as_ref().unwrap();
        assert_eq!(rec.delta_minutes, 15);
        assert_eq!(rec.sla_status, SlaStatus::Delay);

        let rows = session.display_rows().unwrap();
        let labels: Vec<&str> = rows.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            [
                "Ticket Number",
                "Received Date",
                "Predicted Resolve Date",
                "Actual Resolve Date",
                "Actual Duration",
                "Predicted Resolution (min)",
                "Delta (min)",
                "SLA Status",
            ]
        );
        assert_eq!(rows[4].1, "1335");
    }

    #[test]
    fn failed_upload_keeps_previous_table() {
        let mut session = predicted_session();
        let err = session.load_table(b"a,b\n1\n", "broken.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(session.load_table(b"x", "notes.txt").is_err());
        assert_eq!(session.table().unwrap().len(), 3);
        assert!(session.payload().is_some());
        assert!(session.display_record().is_some());
    }

    #[test]
    fn new_upload_resets_downstream_state() {
        let mut session = predicted_session();
        session.load_table(b"TicketNumber\nT-9\n", "other.csv").unwrap();
        assert!(session.payload().is_none());
        assert!(session.display_record().is_none());
    }

    #[test]
    fn actions_require_earlier_stages() {
        let mut session = Session::new();
        assert!(matches!(session.build_payload(1), Err(PipelineError::NoTable)));
        assert!(matches!(
            session.run_inference(&Stub::ok(t2_response())),
            Err(PipelineError::NoPayload)
        ));
        assert!(matches!(
            session.reconcile_actuals(b"TicketNumber\n", "a.csv"),
            Err(PipelineError::NoPrediction)
        ));
        session.load_table(TICKETS.as_bytes(), "tickets.csv").unwrap();
        assert!(matches!(
            session.build_payload(4),
            Err(PipelineError::RowOutOfRange { row: 4, count: 3 })
        ));
        assert!(session.display_rows().is_none());
    }

    #[test]
    fn failed_or_empty_inference_keeps_prediction() {
        let mut session = predicted_session();
        let before = session.display_record().cloned();

        let err = session.run_inference(&Stub::timing_out()).unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { secs: 240 }));
        assert_eq!(session.display_record().cloned(), before);

        let warning = session
            .run_inference(&Stub::ok(json!({"results": []})))
            .unwrap();
        assert_eq!(warning, Some(Warning::EmptyResult));
        assert_eq!(session.display_record().cloned(), before);
    }

    #[test]
    fn unmatched_actuals_warn() {
        let mut session = predicted_session();
        let outcome = session
            .reconcile_actuals(
                b"TicketNumber,actual_resolve_dt,actual_Duration\nT-7,2024-05-02 07:45:00,5\n",
                "actuals.csv",
            )
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Warning(Warning::NotFound {
                ticket_id: "T-2".into()
            })
        );
        let rows = session.display_rows().unwrap();
        assert!(rows.iter().all(|(l, _)| *l != "Delta (min)" && *l != "SLA Status"));
    }

    #[test]
    fn actuals_without_required_columns_fail() {
        let mut session = predicted_session();
        let err = session
            .reconcile_actuals(b"TicketNumber,resolved\nT-2,x\n", "actuals.csv")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
        assert!(session.display_record().unwrap().reconciliation.is_none());
    }
}

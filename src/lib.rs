pub mod config;
pub mod datetime;
pub mod display;
pub mod error;
pub mod inference;
pub mod payload;
pub mod projection;
pub mod reconcile;
pub mod session;
pub mod table;

pub use config::Config;
pub use display::{display_json, format_display, DisplayField};
pub use error::{PipelineError, Result, Warning};
pub use inference::{HttpInferenceClient, InferenceBackend};
pub use payload::{build_payload, Payload};
pub use projection::{project_response, DisplayRecord, Projection, Timestamp};
pub use reconcile::{reconcile_actuals, ReconcileOutcome, SlaStatus};
pub use session::Session;
pub use table::{load_table, Table, Value};

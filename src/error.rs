use std::fmt;

/// Failures raised by a pipeline action. None of them end the session; the
/// caller reports the message and lets the user retry.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not read {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("row {row} is out of range, expected 1..={count}")]
    RowOutOfRange { row: usize, count: usize },

    #[error("no table loaded")]
    NoTable,

    #[error("no payload built")]
    NoPayload,

    #[error("no prediction available to reconcile")]
    NoPrediction,

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("the request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid inference response: {0}")]
    InvalidResponse(String),

    #[error("field {field} holds an unparseable datetime: {value}")]
    InvalidDateTime { field: String, value: String },

    #[error("missing field {0}")]
    MissingField(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn parse(file: &str, reason: impl fmt::Display) -> Self {
        PipelineError::Parse {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Non-fatal conditions that leave session state as it was.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    EmptyResult,
    NotFound { ticket_id: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EmptyResult => write!(f, "no results found in the response"),
            Warning::NotFound { ticket_id } => {
                write!(f, "ticket {} not found in the actuals file", ticket_id)
            }
        }
    }
}

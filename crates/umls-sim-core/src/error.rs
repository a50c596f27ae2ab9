//! Error types for umls-sim-core

use thiserror::Error;
use umls_toolkit::ToolkitError;

/// Errors surfaced by the similarity service and the batch dispatcher
#[derive(Error, Debug)]
pub enum Error {
    /// An identifier-shaped input is not a well-formed CUI.
    /// Raised before any toolkit process is started.
    #[error("Invalid CUI pair #{index}: `{value}` {reason}")]
    InvalidCuiPair {
        index: usize,
        value: String,
        reason: String,
    },

    /// The toolkit could not be run or exited non-zero
    #[error("{operation} failed ({context}): {source}")]
    ExternalTool {
        operation: String,
        context: String,
        #[source]
        source: ToolkitError,
    },

    /// The toolkit output could not be parsed at all
    #[error("Could not parse {operation} output ({context}): {detail}")]
    OutputParse {
        operation: String,
        context: String,
        detail: String,
    },

    /// Measure name outside the supported catalog
    #[error("Unknown measure: {0}")]
    UnknownMeasure(String),

    /// Batch task names a function that does not exist
    #[error("Unknown function: {0} (expected similarity, shortest_path or lcs)")]
    UnknownTask(String),

    /// Batch task arguments do not fit the function
    #[error("Invalid arguments for {function}: {detail}")]
    InvalidTaskArguments { function: String, detail: String },

    /// A term resolved to several concepts and the policy forbids picking one
    #[error("Term `{term}` in pair #{index} is ambiguous: {candidates:?}")]
    AmbiguousTerm {
        index: usize,
        term: String,
        candidates: Vec<String>,
    },

    /// A batch worker panicked or was cancelled
    #[error("Task worker aborted: {0}")]
    TaskPanicked(String),

    /// Configuration problem
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ToolkitError> for Error {
    fn from(err: ToolkitError) -> Self {
        match err {
            ToolkitError::MissingConnectionField(_) => Error::Config(err.to_string()),
            other => Error::ExternalTool {
                operation: "toolkit".to_string(),
                context: "setup".to_string(),
                source: other,
            },
        }
    }
}

impl Error {
    /// Captured toolkit stderr for external failures.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::ExternalTool { source, .. } => source.stderr(),
            _ => None,
        }
    }
}

/// Result type for umls-sim-core operations
pub type Result<T> = std::result::Result<T, Error>;

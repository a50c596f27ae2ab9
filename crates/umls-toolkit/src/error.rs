//! Error types for umls-toolkit

use thiserror::Error;

/// Errors that can occur while driving the toolkit scripts
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// A required connection setting is empty
    #[error("Connection setting `{0}` is required")]
    MissingConnectionField(&'static str),

    /// Interpreter or script missing on disk
    #[error("Toolkit file not found: {0}")]
    ToolNotFound(String),

    /// The child process could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The script exited with a non-zero status
    #[error("{script} exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        script: String,
        exit_code: i32,
        stderr: String,
    },

    /// The script exceeded the configured timeout and was killed
    #[error("{script} timed out after {timeout_secs} seconds")]
    TimedOut { script: String, timeout_secs: u64 },

    /// IO error (infile handling, output capture)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolkitError {
    /// Captured stderr, when the failure carries any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolkitError::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

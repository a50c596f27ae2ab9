//! UMLS-Toolkit: process wrapper for the UMLS::Similarity scripts
//!
//! This crate is the only place that knows how the external toolkit is
//! laid out and launched. It builds the argument vector for each script,
//! writes the pair infile, runs the child process and captures what it
//! prints. It does not interpret the output.
//!
//! ## Scripts
//!
//! - `umls-similarity.pl`: one relatedness measure over an infile of pairs
//! - `findShortestPath.pl`: path between two concepts given as arguments
//! - `findLeastCommonSubsumer.pl`: LCS and depths over an infile of pairs

pub mod command;
pub mod config;
pub mod error;
pub mod fakes;
pub mod runner;

pub use command::{redact_args, Script, ToolCommand, ToolInput};
pub use config::{ConnectionConfig, ToolkitConfig};
pub use error::ToolkitError;
pub use runner::{is_toolkit_available, InvocationResult, ProcessInvoker, ToolInvoker};

/// Result type for toolkit operations
pub type Result<T> = std::result::Result<T, ToolkitError>;

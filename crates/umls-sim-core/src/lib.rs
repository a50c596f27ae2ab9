//! UMLS-Sim Core Library
//!
//! Pair validation, toolkit output parsing, result assembly and concurrent
//! batch dispatch on top of the UMLS::Similarity command-line toolkit.

pub mod assemble;
pub mod concept;
pub mod dispatch;
pub mod error;
pub mod measure;
pub mod normalize;
pub mod parse;
pub mod service;
pub mod table;
pub mod telemetry;

pub use assemble::AmbiguityPolicy;
pub use concept::{ConceptPair, ConceptRef, Cui};
pub use dispatch::{BatchResult, Task, TaskOutcome, TaskSpec};
pub use error::{Error, Result};
pub use measure::Measure;
pub use normalize::{classify, normalize_pairs, split_pair_line};
pub use parse::{Mention, Score};
pub use service::{SimilarityOptions, UmlsSimilarity};
pub use table::{MergeKey, PathOutcome, ResultRow, ResultTable, SkippedPair, Subsumer};
pub use telemetry::init_tracing;

pub use umls_toolkit::{ConnectionConfig, ToolkitConfig};

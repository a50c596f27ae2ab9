//! Toolkit scripts and the argument vectors used to invoke them.

use crate::config::{ConnectionConfig, ToolkitConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The three toolkit entry points this crate drives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    /// umls-similarity.pl --measure=NAME --infile=FILE
    Similarity,

    /// findShortestPath.pl --length LEFT RIGHT
    ShortestPath,

    /// findLeastCommonSubsumer.pl --depth --infile=FILE
    LeastCommonSubsumer,
}

impl Script {
    pub const ALL: [Script; 3] = [
        Script::Similarity,
        Script::ShortestPath,
        Script::LeastCommonSubsumer,
    ];

    /// Script file name inside the toolkit's bin directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Script::Similarity => "umls-similarity.pl",
            Script::ShortestPath => "findShortestPath.pl",
            Script::LeastCommonSubsumer => "findLeastCommonSubsumer.pl",
        }
    }

    /// Flags specific to this script, ahead of measure/input flags.
    fn mode_flags(&self) -> &'static [&'static str] {
        match self {
            Script::Similarity => &[],
            Script::ShortestPath => &["--length"],
            Script::LeastCommonSubsumer => &["--depth"],
        }
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// How concept pairs reach the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolInput {
    /// Written to a temporary infile, one `left<>right` line per pair.
    InFile(Vec<(String, String)>),

    /// Appended as two trailing positional arguments.
    Positional(String, String),
}

impl ToolInput {
    /// Number of pairs carried.
    pub fn len(&self) -> usize {
        match self {
            ToolInput::InFile(pairs) => pairs.len(),
            ToolInput::Positional(..) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Left/right sides of every pair carried by this input.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            ToolInput::InFile(pairs) => pairs
                .iter()
                .map(|(l, r)| (l.as_str(), r.as_str()))
                .collect(),
            ToolInput::Positional(l, r) => vec![(l.as_str(), r.as_str())],
        }
    }

    /// Infile body in the toolkit's `<>`-delimited format.
    pub fn infile_contents(&self) -> Option<String> {
        match self {
            ToolInput::InFile(pairs) => Some(
                pairs
                    .iter()
                    .map(|(left, right)| format!("{}<>{}\n", left, right))
                    .collect(),
            ),
            ToolInput::Positional(..) => None,
        }
    }
}

/// A single request to the toolkit: which script, which measure, which pairs.
///
/// Connection and runtime settings are added by the invoker when the
/// argument vector is rendered, so a command can be built and inspected
/// without any credentials at hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub script: Script,

    /// Measure name for [`Script::Similarity`].
    pub measure: Option<String>,

    pub input: ToolInput,
}

impl ToolCommand {
    pub fn similarity(measure: impl Into<String>, pairs: Vec<(String, String)>) -> Self {
        Self {
            script: Script::Similarity,
            measure: Some(measure.into()),
            input: ToolInput::InFile(pairs),
        }
    }

    pub fn shortest_path(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            script: Script::ShortestPath,
            measure: None,
            input: ToolInput::Positional(left.into(), right.into()),
        }
    }

    pub fn least_common_subsumer(pairs: Vec<(String, String)>) -> Self {
        Self {
            script: Script::LeastCommonSubsumer,
            measure: None,
            input: ToolInput::InFile(pairs),
        }
    }

    /// Program to execute: the Perl interpreter when configured, else the script.
    pub fn program(&self, toolkit: &ToolkitConfig) -> PathBuf {
        toolkit
            .perl_bin
            .clone()
            .unwrap_or_else(|| toolkit.script_path(self.script.file_name()))
    }

    /// Full argument vector (excluding the program itself).
    ///
    /// `infile` must be supplied for [`ToolInput::InFile`] commands.
    pub fn args(
        &self,
        connection: &ConnectionConfig,
        toolkit: &ToolkitConfig,
        infile: Option<&Path>,
    ) -> Vec<String> {
        let mut args = Vec::new();

        if toolkit.perl_bin.is_some() {
            args.push(
                toolkit
                    .script_path(self.script.file_name())
                    .to_string_lossy()
                    .into_owned(),
            );
        }

        for (flag, value) in connection.flags() {
            args.push(format!("{}={}", flag, value));
        }

        args.extend(self.script.mode_flags().iter().map(|f| f.to_string()));

        if let Some(measure) = &self.measure {
            args.push(format!("--measure={}", measure));
            args.push(format!("--precision={}", toolkit.precision));
        }

        if toolkit.forcerun {
            args.push("--forcerun".to_string());
        }

        match &self.input {
            ToolInput::InFile(_) => {
                if let Some(path) = infile {
                    args.push(format!("--infile={}", path.to_string_lossy()));
                }
            }
            ToolInput::Positional(left, right) => {
                args.push(left.clone());
                args.push(right.clone());
            }
        }

        args
    }

    /// Short label for logs and error messages.
    pub fn label(&self) -> String {
        match &self.measure {
            Some(measure) => format!("{} ({})", self.script, measure),
            None => self.script.to_string(),
        }
    }
}

/// Render an argument vector for logging with the password masked.
pub fn redact_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.starts_with("--password=") {
                "--password=****".to_string()
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

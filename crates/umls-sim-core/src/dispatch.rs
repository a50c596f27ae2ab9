//! Concurrent batch dispatch.
//!
//! A batch is a list of [`TaskSpec`]s, each naming one service function and
//! its arguments. Every task runs on its own tokio task; outcomes come back
//! in submission order and one failing task never takes down the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::measure::Measure;
use crate::service::UmlsSimilarity;
use crate::table::{MergeKey, ResultTable};

/// A task as submitted: function name plus positional JSON arguments.
///
/// ```json
/// {"function": "similarity", "arguments": [[["C0018563", "C0037303"]], ["lch", "wup"]]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub function: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl TaskSpec {
    pub fn new(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            arguments,
        }
    }
}

/// A decoded task.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Similarity {
        pairs: Vec<(String, String)>,
        measures: Vec<Measure>,
    },
    ShortestPath {
        pairs: Vec<(String, String)>,
    },
    Lcs {
        pairs: Vec<(String, String)>,
    },
}

impl Task {
    /// Function name as accepted in a [`TaskSpec`].
    pub fn function(&self) -> &'static str {
        match self {
            Task::Similarity { .. } => "similarity",
            Task::ShortestPath { .. } => "shortest_path",
            Task::Lcs { .. } => "lcs",
        }
    }

    /// Decode a spec. Similarity takes `[pairs]` or `[pairs, measures]`;
    /// the other functions take `[pairs]`.
    pub fn from_spec(spec: &TaskSpec) -> Result<Task> {
        let function = spec.function.trim();
        let max_args = match function {
            "similarity" => 2,
            "shortest_path" | "lcs" => 1,
            other => return Err(Error::UnknownTask(other.to_string())),
        };
        if spec.arguments.len() > max_args {
            return Err(invalid(
                function,
                format!(
                    "expected at most {max_args} arguments, got {}",
                    spec.arguments.len()
                ),
            ));
        }

        let pairs = decode_pairs(function, spec.arguments.first())?;
        Ok(match function {
            "similarity" => Task::Similarity {
                pairs,
                measures: decode_measures(function, spec.arguments.get(1))?,
            },
            "shortest_path" => Task::ShortestPath { pairs },
            _ => Task::Lcs { pairs },
        })
    }
}

fn invalid(function: &str, detail: impl Into<String>) -> Error {
    Error::InvalidTaskArguments {
        function: function.to_string(),
        detail: detail.into(),
    }
}

fn decode_pairs(function: &str, value: Option<&Value>) -> Result<Vec<(String, String)>> {
    let value = value.ok_or_else(|| invalid(function, "missing pair list"))?;
    serde_json::from_value(value.clone())
        .map_err(|e| invalid(function, format!("pairs must be a list of two-string lists: {e}")))
}

fn decode_measures(function: &str, value: Option<&Value>) -> Result<Vec<Measure>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let names: Vec<String> = serde_json::from_value(value.clone())
        .map_err(|e| invalid(function, format!("measures must be a list of names: {e}")))?;
    Measure::parse_list(&names)
}

/// The outcome of one batch slot.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Submission position.
    pub index: usize,
    pub function: String,
    pub result: Result<ResultTable>,
}

/// Outcomes of a batch, one per submitted task, in submission order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Result<ResultTable>> {
        self.outcomes.get(index).map(|o| &o.result)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Every successful table outer-joined into one, in submission order.
    ///
    /// Rows are joined on CUIs when every table was keyed by CUIs, and on
    /// terms otherwise.
    pub fn merged(&self) -> ResultTable {
        let tables: Vec<&ResultTable> = self
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .collect();
        let key = if tables.iter().all(|t| t.key == MergeKey::Cuis) {
            MergeKey::Cuis
        } else {
            MergeKey::Terms
        };

        let mut merged = ResultTable::new(key);
        for table in tables {
            merged.merge(table.clone(), key);
        }
        merged
    }

    pub fn into_results(self) -> Vec<Result<ResultTable>> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

impl UmlsSimilarity {
    /// Run one decoded task.
    pub async fn run_task(&self, task: Task) -> Result<ResultTable> {
        match task {
            Task::Similarity { pairs, measures } => self.similarity(&pairs, &measures).await,
            Task::ShortestPath { pairs } => self.find_shortest_path(&pairs).await,
            Task::Lcs { pairs } => self.find_least_common_subsumer(&pairs).await,
        }
    }

    /// Run every spec concurrently.
    ///
    /// Specs are decoded inside their own task, so an unknown function or
    /// malformed arguments fail only that slot.
    #[instrument(skip_all, fields(tasks = specs.len()))]
    pub async fn run_concurrently(&self, specs: Vec<TaskSpec>) -> BatchResult {
        let handles = specs
            .into_iter()
            .map(|spec| {
                let service = self.clone();
                let function = spec.function.clone();
                let handle = tokio::spawn(async move {
                    let task = Task::from_spec(&spec)?;
                    service.run_task(task).await
                });
                (function, handle)
            })
            .collect();
        collect_in_order(handles).await
    }

    /// Run already-decoded tasks concurrently.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn run_tasks(&self, tasks: Vec<Task>) -> BatchResult {
        let handles = tasks
            .into_iter()
            .map(|task| {
                let service = self.clone();
                let function = task.function().to_string();
                (function, tokio::spawn(async move { service.run_task(task).await }))
            })
            .collect();
        collect_in_order(handles).await
    }
}

async fn collect_in_order(
    handles: Vec<(String, JoinHandle<Result<ResultTable>>)>,
) -> BatchResult {
    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, (function, handle)) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(Error::TaskPanicked(join_err.to_string())),
        };
        match &result {
            Ok(table) => {
                debug!(index, function = %function, rows = table.len(), "task finished")
            }
            Err(err) => warn!(index, function = %function, error = %err, "task failed"),
        }
        outcomes.push(TaskOutcome {
            index,
            function,
            result,
        });
    }

    let batch = BatchResult { outcomes };
    info!(succeeded = batch.succeeded(), failed = batch.failed(), "batch finished");
    batch
}

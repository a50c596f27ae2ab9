//! The similarity service.
//!
//! [`UmlsSimilarity`] validates pairs, drives the toolkit through a
//! [`ToolInvoker`] and assembles the answers into a [`ResultTable`]. It holds
//! no per-call state, so clones can run side by side.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use umls_toolkit::{
    ConnectionConfig, InvocationResult, ProcessInvoker, ToolCommand, ToolInvoker, ToolkitConfig,
};

use crate::assemble::{
    align, lcs_table, merge_key, path_table, similarity_table, AmbiguityPolicy, MeasureOutput,
    PathSlot,
};
use crate::concept::{ConceptPair, Cui};
use crate::error::{Error, Result};
use crate::measure::Measure;
use crate::normalize::normalize_pairs;
use crate::parse::{parse_lcs, parse_shortest_path, parse_similarity, ParsedOutput, PathRecord};
use crate::table::ResultTable;

/// Tunables that do not belong to the toolkit itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

/// Entry point for similarity, shortest path and least common subsumer.
#[derive(Clone)]
pub struct UmlsSimilarity {
    invoker: Arc<dyn ToolInvoker>,
    options: SimilarityOptions,
}

impl std::fmt::Debug for UmlsSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UmlsSimilarity")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl UmlsSimilarity {
    /// Service backed by the real toolkit scripts.
    pub fn new(connection: ConnectionConfig, toolkit: ToolkitConfig) -> Result<Self> {
        let invoker = ProcessInvoker::new(connection, toolkit)?;
        Ok(Self::with_invoker(Arc::new(invoker)))
    }

    pub fn with_invoker(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            options: SimilarityOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SimilarityOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SimilarityOptions {
        self.options
    }

    /// Score every pair under every measure.
    ///
    /// Measures run concurrently, one toolkit process each, and are joined
    /// back on pair position. Duplicate measures are collapsed and an empty
    /// list means [`Measure::DEFAULT`]. Nothing is spawned if a pair fails
    /// validation.
    #[instrument(skip_all, fields(pairs = pairs.len(), measures = measures.len()))]
    pub async fn similarity<S: AsRef<str>>(
        &self,
        pairs: &[(S, S)],
        measures: &[Measure],
    ) -> Result<ResultTable> {
        let pairs = normalize_pairs(pairs)?;
        let measures = Measure::dedup_or_default(measures);
        if pairs.is_empty() {
            let mut table = ResultTable::new(merge_key(&pairs));
            table.measures = measures;
            return Ok(table);
        }

        let inputs: Vec<(String, String)> = pairs.iter().map(ConceptPair::to_input).collect();
        let runs = measures.iter().map(|measure| {
            let command = ToolCommand::similarity(measure.name(), inputs.clone());
            self.call(command, "similarity", format!("measure {measure}"))
        });
        let outputs = join_all(runs).await;

        let mut per_measure = Vec::with_capacity(measures.len());
        for (measure, stdout) in measures.iter().zip(outputs) {
            let parsed = parse_similarity(&stdout?);
            check_parseable(&parsed, "similarity", format!("measure {measure}"))?;
            let aligned = align(&pairs, parsed.records, self.options.ambiguity)?;
            per_measure.push(MeasureOutput {
                measure: *measure,
                aligned,
                rejected: parsed.rejected,
            });
        }

        let table = similarity_table(&pairs, per_measure);
        info!(rows = table.len(), skipped = table.skipped.len(), "similarity done");
        Ok(table)
    }

    /// Shortest is-a path for every pair, one toolkit call per pair.
    #[instrument(skip_all, fields(pairs = pairs.len()))]
    pub async fn find_shortest_path<S: AsRef<str>>(&self, pairs: &[(S, S)]) -> Result<ResultTable> {
        let pairs = normalize_pairs(pairs)?;

        let mut slots = Vec::with_capacity(pairs.len());
        let mut warnings = Vec::new();
        for (index, pair) in pairs.iter().enumerate() {
            let context = format!("pair #{index} {pair}");
            let (left, right) = pair.to_input();
            let stdout = self
                .call(
                    ToolCommand::shortest_path(left, right),
                    "shortest path",
                    context.clone(),
                )
                .await?;

            let parsed = parse_shortest_path(&stdout);
            check_parseable(&parsed, "shortest path", context)?;
            warnings.extend(
                parsed
                    .rejected
                    .iter()
                    .map(|r| format!("shortest path: pair #{index}: skipped {r}")),
            );
            warnings.extend(
                parsed
                    .warnings
                    .iter()
                    .map(|w| format!("shortest path: pair #{index}: {w}")),
            );
            slots.push(self.pick_path(index, pair, parsed.records, &mut warnings)?);
        }

        let table = path_table(&pairs, slots, warnings);
        info!(rows = table.len(), skipped = table.skipped.len(), "shortest path done");
        Ok(table)
    }

    /// Least common subsumer for every pair, in a single toolkit call.
    #[instrument(skip_all, fields(pairs = pairs.len()))]
    pub async fn find_least_common_subsumer<S: AsRef<str>>(
        &self,
        pairs: &[(S, S)],
    ) -> Result<ResultTable> {
        let pairs = normalize_pairs(pairs)?;
        if pairs.is_empty() {
            let mut table = ResultTable::new(merge_key(&pairs));
            table.includes_lcs = true;
            return Ok(table);
        }

        let inputs: Vec<(String, String)> = pairs.iter().map(ConceptPair::to_input).collect();
        let stdout = self
            .call(
                ToolCommand::least_common_subsumer(inputs),
                "lcs",
                format!("{} pairs", pairs.len()),
            )
            .await?;

        let parsed = parse_lcs(&stdout);
        check_parseable(&parsed, "lcs", format!("{} pairs", pairs.len()))?;
        let aligned = align(&pairs, parsed.records, self.options.ambiguity)?;
        let table = lcs_table(&pairs, aligned, &parsed.rejected);
        info!(rows = table.len(), skipped = table.skipped.len(), "lcs done");
        Ok(table)
    }

    async fn call(&self, command: ToolCommand, operation: &str, context: String) -> Result<String> {
        debug!(command = %command.label(), "invoking toolkit");
        let result = self
            .invoker
            .invoke(&command)
            .await
            .and_then(InvocationResult::into_success)
            .map_err(|source| Error::ExternalTool {
                operation: operation.to_string(),
                context,
                source,
            })?;
        Ok(result.stdout)
    }

    /// Choose the path answer for one pair.
    fn pick_path(
        &self,
        index: usize,
        pair: &ConceptPair,
        records: Vec<PathRecord>,
        warnings: &mut Vec<String>,
    ) -> Result<PathSlot> {
        let mut records = records.into_iter();
        let Some(first) = records.next() else {
            return Ok(PathSlot::Missing(
                "no result returned by the toolkit".to_string(),
            ));
        };

        let mut candidates: Vec<(Cui, Cui)> = endpoints(&first).into_iter().collect();
        for record in records {
            if let Some(ends) = endpoints(&record) {
                if !candidates.contains(&ends) {
                    candidates.push(ends);
                }
            }
        }

        if candidates.len() > 1 {
            let term = if candidates[0].0 != candidates[1].0 {
                pair.first.as_input()
            } else {
                pair.second.as_input()
            };
            let rendered: Vec<String> = candidates
                .iter()
                .map(|(a, b)| format!("{a}<>{b}"))
                .collect();
            match self.options.ambiguity {
                AmbiguityPolicy::Error => {
                    return Err(Error::AmbiguousTerm {
                        index,
                        term: term.to_string(),
                        candidates: rendered,
                    })
                }
                AmbiguityPolicy::PickFirst => {
                    warn!(
                        index,
                        term,
                        count = candidates.len(),
                        "ambiguous term, using first concept"
                    );
                    warnings.push(format!(
                        "shortest path: pair #{index}: `{term}` resolved to {} concepts ({}); using the first",
                        candidates.len(),
                        rendered.join(", ")
                    ));
                }
            }
        }

        Ok(PathSlot::Record(first))
    }
}

fn endpoints(record: &PathRecord) -> Option<(Cui, Cui)> {
    match record {
        PathRecord::Found { first, second, .. } => Some((first.cui.clone(), second.cui.clone())),
        PathRecord::NotFound { .. } => None,
    }
}

fn check_parseable<T>(parsed: &ParsedOutput<T>, operation: &str, context: String) -> Result<()> {
    if parsed.is_unparseable() {
        let detail = parsed
            .rejected
            .first()
            .map(|r| r.to_string())
            .unwrap_or_default();
        return Err(Error::OutputParse {
            operation: operation.to_string(),
            context,
            detail,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umls_toolkit::fakes::ScriptedInvoker;
    use umls_toolkit::Script;

    use crate::table::PathOutcome;

    fn service(invoker: ScriptedInvoker) -> (UmlsSimilarity, Arc<ScriptedInvoker>) {
        let invoker = Arc::new(invoker);
        (UmlsSimilarity::with_invoker(invoker.clone()), invoker)
    }

    #[tokio::test]
    async fn test_invalid_pair_spawns_nothing() {
        let (svc, invoker) = service(ScriptedInvoker::constant(""));
        let err = svc
            .similarity(&[("C0018563", "C0037303"), ("C001856", "C0037303")], &[])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCuiPair { index: 1, .. }));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_one_process_per_distinct_measure() {
        let (svc, invoker) = service(ScriptedInvoker::constant(
            "0.5<>hand (C0018563)<>skull (C0037303)\n",
        ));
        let table = svc
            .similarity(
                &[("hand", "skull")],
                &[Measure::Path, Measure::Lin, Measure::Path],
            )
            .await
            .unwrap();

        assert_eq!(table.measures, vec![Measure::Path, Measure::Lin]);
        assert_eq!(invoker.calls_for(Script::Similarity).len(), 2);
    }

    #[tokio::test]
    async fn test_empty_measure_list_uses_default() {
        let (svc, invoker) = service(ScriptedInvoker::constant(""));
        svc.similarity(&[("C0018563", "C0037303")], &[]).await.unwrap();
        assert_eq!(invoker.calls()[0].measure.as_deref(), Some("lch"));
    }

    #[tokio::test]
    async fn test_empty_input_spawns_nothing() {
        let (svc, invoker) = service(ScriptedInvoker::constant(""));
        let pairs: [(&str, &str); 0] = [];
        let table = svc.similarity(&pairs, &[Measure::Wup]).await.unwrap();

        assert!(table.is_empty());
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_external_tool_error() {
        let (svc, _) = service(ScriptedInvoker::failing(
            1,
            "DBI connect('umls') failed: Access denied",
        ));
        let err = svc
            .find_least_common_subsumer(&[("C0035078", "C0035078")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExternalTool { .. }));
        assert!(err.stderr().unwrap().contains("Access denied"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_parse_error() {
        let (svc, _) = service(ScriptedInvoker::constant("Use of uninitialized value\n"));
        let err = svc
            .similarity(&[("C0018563", "C0037303")], &[Measure::Res])
            .await
            .unwrap_err();

        match err {
            Error::OutputParse { context, .. } => assert_eq!(context, "measure res"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shortest_path_ambiguity_error_policy() {
        let output = "The shortest path (length: 2) between cold (C0009264) and fever (C0015967):\n\
                      => C0009264 (cold) => C0015967 (fever)\n\
                      The shortest path (length: 3) between cold (C0009443) and fever (C0015967):\n\
                      => C0009443 (cold) => C0012634 (Disease) => C0015967 (fever)\n";
        let (svc, _) = service(ScriptedInvoker::constant(output));
        let svc = svc.with_options(SimilarityOptions {
            ambiguity: AmbiguityPolicy::Error,
        });

        let err = svc
            .find_shortest_path(&[("cold", "fever")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousTerm { ref term, .. } if term == "cold"));
    }

    #[tokio::test]
    async fn test_shortest_path_without_arrows_keeps_every_step() {
        let output = "The shortest path (length: 3) between hand (C0018563) and skull (C0037303):\n\
                      => C0018563 (Hand) C0229962 (Body Part) C0037303 (Skull)\n";
        let (svc, _) = service(ScriptedInvoker::constant(output));

        let table = svc
            .find_shortest_path(&[("C0018563", "C0037303")])
            .await
            .unwrap();
        match table.rows[0].path.as_ref().unwrap() {
            PathOutcome::Found { length, steps } => {
                assert_eq!(*length, 3);
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[1].term.as_deref(), Some("Body Part"));
            }
            other => panic!("unexpected path: {other:?}"),
        }
        assert!(table.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_shortest_path_length_mismatch_is_a_warning() {
        let output = "The shortest path (length: 5) between hand (C0018563) and skull (C0037303):\n\
                      => C0018563 (Hand) => C0037303 (Skull)\n";
        let (svc, _) = service(ScriptedInvoker::constant(output));

        let table = svc
            .find_shortest_path(&[("C0018563", "C0037303")])
            .await
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.warnings.len(), 1);
        assert!(table.warnings[0].starts_with("shortest path: pair #0: line 2:"));
        assert!(table.warnings[0].contains("length 5 but lists 2 concepts"));
    }
}

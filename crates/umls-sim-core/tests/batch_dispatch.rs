//! Concurrent batch dispatch: ordering, isolation and merging.

use std::sync::Arc;

use serde_json::json;
use umls_sim_core::{Error, Measure, MergeKey, Task, TaskSpec, UmlsSimilarity};
use umls_toolkit::fakes::ScriptedInvoker;
use umls_toolkit::{InvocationResult, Script};

const SIMILARITY: &str = "0.7000<>hand (C0018563)<>skull (C0037303)\n";
const LCS: &str = "The least common subsumer between hand (C0018563) and skull (C0037303) is Body Part (C0229962) with a min and max depth of 3 and 5\n";
const PATH: &str = "The shortest path (length: 3) between hand (C0018563) and skull (C0037303): => C0018563 (hand) => C0229962 (Body Part) => C0037303 (skull)\n";

fn toolkit() -> Arc<ScriptedInvoker> {
    Arc::new(ScriptedInvoker::new(|cmd| {
        let stdout = match cmd.script {
            Script::Similarity => SIMILARITY,
            Script::ShortestPath => PATH,
            Script::LeastCommonSubsumer => LCS,
        };
        Ok(InvocationResult::ok(cmd.script, stdout))
    }))
}

fn pairs() -> serde_json::Value {
    json!([["C0018563", "C0037303"]])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outcomes_keep_submission_order() {
    let svc = UmlsSimilarity::with_invoker(toolkit());
    let specs = vec![
        TaskSpec::new("similarity", vec![pairs(), json!(["wup"])]),
        TaskSpec::new("shortest_path", vec![pairs()]),
        TaskSpec::new("lcs", vec![pairs()]),
        TaskSpec::new("similarity", vec![pairs(), json!(["lch", "path"])]),
    ];

    let batch = svc.run_concurrently(specs).await;

    assert_eq!(batch.len(), 4);
    assert!(batch.all_succeeded());
    let functions: Vec<&str> = batch.outcomes.iter().map(|o| o.function.as_str()).collect();
    assert_eq!(functions, ["similarity", "shortest_path", "lcs", "similarity"]);
    assert_eq!(
        batch.get(3).unwrap().as_ref().unwrap().measures,
        vec![Measure::Lch, Measure::Path]
    );
    assert!(batch.get(1).unwrap().as_ref().unwrap().includes_path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_slot_does_not_affect_others() {
    let svc = UmlsSimilarity::with_invoker(toolkit());
    let specs = vec![
        TaskSpec::new("similarity", vec![pairs()]),
        TaskSpec::new("semantic_relatedness", vec![pairs()]),
        TaskSpec::new("lcs", vec![json!([["C0018563", "C00373"]])]),
        TaskSpec::new("lcs", vec![pairs()]),
    ];

    let batch = svc.run_concurrently(specs).await;

    assert_eq!(batch.len(), 4);
    assert_eq!(batch.succeeded(), 2);
    assert!(batch.get(0).unwrap().is_ok());
    assert!(matches!(batch.get(1), Some(Err(Error::UnknownTask(_)))));
    assert!(matches!(
        batch.get(2),
        Some(Err(Error::InvalidCuiPair { index: 0, .. }))
    ));
    assert!(batch.get(3).unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toolkit_failure_isolated_to_its_task() {
    let invoker = Arc::new(ScriptedInvoker::new(|cmd| match cmd.script {
        Script::LeastCommonSubsumer => Ok(InvocationResult::failed(
            cmd.script,
            255,
            "Can't connect to local MySQL server through socket",
        )),
        _ => Ok(InvocationResult::ok(cmd.script, SIMILARITY)),
    }));
    let svc = UmlsSimilarity::with_invoker(invoker.clone());

    let tasks = vec![
        Task::Lcs {
            pairs: vec![("hand".to_string(), "skull".to_string())],
        },
        Task::Similarity {
            pairs: vec![("hand".to_string(), "skull".to_string())],
            measures: vec![Measure::Wup],
        },
    ];
    let batch = svc.run_tasks(tasks).await;

    let err = batch.get(0).unwrap().as_ref().unwrap_err();
    assert!(err.stderr().unwrap().contains("MySQL"));
    assert_eq!(batch.get(1).unwrap().as_ref().unwrap().len(), 1);
    assert_eq!(invoker.call_count(), 2);
}

#[tokio::test]
async fn test_merged_table_joins_on_cuis() {
    let svc = UmlsSimilarity::with_invoker(toolkit());
    let specs = vec![
        TaskSpec::new("similarity", vec![pairs(), json!(["wup"])]),
        TaskSpec::new("lcs", vec![pairs()]),
        TaskSpec::new("bogus", vec![]),
    ];

    let batch = svc.run_concurrently(specs).await;
    let merged = batch.merged();

    assert_eq!(merged.key, MergeKey::Cuis);
    assert_eq!(merged.len(), 1);
    assert_eq!(
        merged.columns(),
        [
            "Term 1",
            "Term 2",
            "CUI 1",
            "CUI 2",
            "wup",
            "LCS Term",
            "LCS CUI",
            "Min Depth",
            "Max Depth"
        ]
    );
    assert_eq!(
        merged.to_tsv().lines().nth(1),
        Some("hand\tskull\tC0018563\tC0037303\t0.7000\tBody Part\tC0229962\t3\t5")
    );
}

#[tokio::test]
async fn test_empty_batch() {
    let svc = UmlsSimilarity::with_invoker(toolkit());
    let batch = svc.run_concurrently(Vec::new()).await;
    assert!(batch.is_empty());
    assert!(batch.merged().is_empty());
}

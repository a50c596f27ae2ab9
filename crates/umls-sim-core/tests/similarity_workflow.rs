//! End-to-end service behaviour against a toolkit stand-in that answers the
//! way the Perl scripts do.

use std::sync::Arc;

use umls_sim_core::{
    AmbiguityPolicy, Error, Measure, MergeKey, PathOutcome, SimilarityOptions, UmlsSimilarity,
};
use umls_toolkit::fakes::ScriptedInvoker;
use umls_toolkit::{InvocationResult, Script, ToolCommand};

const CONCEPTS: [(&str, &str); 5] = [
    ("hand", "C0018563"),
    ("skull", "C0037303"),
    ("Renal failure", "C0035078"),
    ("Kidney Diseases", "C0022658"),
    ("Body Part", "C0229962"),
];

fn lookup(input: &str) -> Option<(&'static str, &'static str)> {
    CONCEPTS
        .iter()
        .copied()
        .find(|(term, cui)| *cui == input || term.eq_ignore_ascii_case(input))
}

fn answer(cmd: &ToolCommand, scores: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (a, b) in cmd.input.pairs() {
        let (Some((ta, ca)), Some((tb, cb))) = (lookup(a), lookup(b)) else {
            if cmd.script == Script::ShortestPath {
                out.push_str(&format!(
                    "There is not a path between {a} and {b} given the current view of the UMLS.\n"
                ));
            }
            continue;
        };
        match cmd.script {
            Script::Similarity => {
                let measure = cmd.measure.as_deref().unwrap_or_default();
                let score = scores
                    .iter()
                    .find(|(m, _)| *m == measure)
                    .map(|(_, s)| *s)
                    .unwrap_or("0.1000");
                out.push_str(&format!("{score}<>{ta} ({ca})<>{tb} ({cb})\n"));
            }
            Script::ShortestPath => out.push_str(&format!(
                "The shortest path (length: 3) between {ta} ({ca}) and {tb} ({cb}):\n  => {ca} ({ta}) => C0229962 (Body Part) => {cb} ({tb})\n"
            )),
            Script::LeastCommonSubsumer if ca == cb => out.push_str(&format!(
                "The least common subsumer between {ta} ({ca}) and {tb} ({cb}) is {ta} ({ca}) with a min and max depth of 6 and 6\n"
            )),
            Script::LeastCommonSubsumer => out.push_str(&format!(
                "The least common subsumer between {ta} ({ca}) and {tb} ({cb}) is Body Part (C0229962) with a min and max depth of 3 and 5\n"
            )),
        }
    }
    out
}

fn toolkit(scores: &'static [(&'static str, &'static str)]) -> Arc<ScriptedInvoker> {
    Arc::new(ScriptedInvoker::new(move |cmd| {
        Ok(InvocationResult::ok(cmd.script, answer(cmd, scores)))
    }))
}

#[tokio::test]
async fn test_lch_wup_single_row() {
    let invoker = toolkit(&[("lch", "0.500"), ("wup", "0.700")]);
    let svc = UmlsSimilarity::with_invoker(invoker.clone());

    let table = svc
        .similarity(&[("C0018563", "C0037303")], &[Measure::Lch, Measure::Wup])
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.term1.as_deref(), Some("hand"));
    assert_eq!(row.term2.as_deref(), Some("skull"));
    assert_eq!(row.cui1.as_ref().unwrap().as_str(), "C0018563");
    assert_eq!(row.cui2.as_ref().unwrap().as_str(), "C0037303");
    assert_eq!(
        table.to_tsv(),
        "Term 1\tTerm 2\tCUI 1\tCUI 2\tlch\twup\nhand\tskull\tC0018563\tC0037303\t0.500\t0.700\n"
    );
    assert_eq!(invoker.calls_for(Script::Similarity).len(), 2);
}

#[tokio::test]
async fn test_rerun_gives_identical_table() {
    let svc = UmlsSimilarity::with_invoker(toolkit(&[("path", "0.2500"), ("lin", "0.4134")]));
    let pairs = [("hand", "skull"), ("C0035078", "C0022658")];

    let first = svc
        .similarity(&pairs, &[Measure::Path, Measure::Lin])
        .await
        .unwrap();
    let second = svc
        .similarity(&pairs, &[Measure::Path, Measure::Lin])
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.key, MergeKey::Terms);
}

#[tokio::test]
async fn test_malformed_cui_fails_before_any_invocation() {
    let invoker = toolkit(&[]);
    let svc = UmlsSimilarity::with_invoker(invoker.clone());

    for bad in ["c0018563", "0018563", "C018563", "D0018563"] {
        let err = svc
            .similarity(&[("C0037303", bad)], &[Measure::Lch])
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::InvalidCuiPair { index: 0, ref value, .. } if value == bad),
            "{bad}: {err}"
        );
    }
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_self_similarity_passes_through() {
    let svc = UmlsSimilarity::with_invoker(Arc::new(ScriptedInvoker::constant(
        "1.0000<>C0018563(Hand)<>C0018563(Hand)\n",
    )));
    let table = svc
        .similarity(&[("C0018563", "C0018563")], &[Measure::Wup])
        .await
        .unwrap();

    let score = table.rows[0].score(Measure::Wup).unwrap();
    assert_eq!(score.value, 1.0);
    assert_eq!(score.text, "1.0000");
}

#[tokio::test]
async fn test_negative_sentinel_is_kept() {
    let svc = UmlsSimilarity::with_invoker(toolkit(&[("res", "-1")]));
    let table = svc
        .similarity(&[("hand", "skull")], &[Measure::Res])
        .await
        .unwrap();

    let score = table.rows[0].score(Measure::Res).unwrap();
    assert!(score.is_undefined());
    assert!(table.to_tsv().ends_with("\t-1\n"));
}

#[tokio::test]
async fn test_unresolved_pair_is_skipped_not_fatal() {
    let svc = UmlsSimilarity::with_invoker(toolkit(&[("lch", "2.0794")]));
    let table = svc
        .similarity(&[("hand", "moon"), ("hand", "skull")], &[])
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].index, 1);
    assert_eq!(table.skipped.len(), 1);
    assert_eq!(table.skipped[0].second, "moon");
}

#[tokio::test]
async fn test_one_failing_measure_fails_the_call() {
    let invoker = Arc::new(ScriptedInvoker::new(|cmd| {
        if cmd.measure.as_deref() == Some("vector") {
            Ok(InvocationResult::failed(
                cmd.script,
                2,
                "vector measure requires --vectormatrix",
            ))
        } else {
            Ok(InvocationResult::ok(
                cmd.script,
                "0.5<>hand (C0018563)<>skull (C0037303)\n",
            ))
        }
    }));
    let svc = UmlsSimilarity::with_invoker(invoker);

    let err = svc
        .similarity(&[("hand", "skull")], &[Measure::Lch, Measure::Vector])
        .await
        .unwrap_err();
    match &err {
        Error::ExternalTool { context, .. } => assert_eq!(context, "measure vector"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.stderr().unwrap().contains("--vectormatrix"));
}

#[tokio::test]
async fn test_ambiguous_term_policies() {
    let output = "0.3000<>cold (C0009264)<>fever (C0015967)\n0.2000<>cold (C0009443)<>fever (C0015967)\n";
    let svc = UmlsSimilarity::with_invoker(Arc::new(ScriptedInvoker::constant(output)));

    let table = svc
        .similarity(&[("cold", "fever")], &[Measure::Path])
        .await
        .unwrap();
    assert_eq!(table.rows[0].cui1.as_ref().unwrap().as_str(), "C0009264");
    assert_eq!(table.warnings.len(), 1);

    let strict = svc.with_options(SimilarityOptions {
        ambiguity: AmbiguityPolicy::Error,
    });
    let err = strict
        .similarity(&[("cold", "fever")], &[Measure::Path])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousTerm { .. }));
}

#[tokio::test]
async fn test_lcs_self_subsumption() {
    let svc = UmlsSimilarity::with_invoker(toolkit(&[]));
    let table = svc
        .find_least_common_subsumer(&[("C0035078", "C0035078")])
        .await
        .unwrap();

    let lcs = table.rows[0].lcs.as_ref().unwrap();
    assert_eq!(lcs.cui.as_str(), "C0035078");
    assert_eq!(lcs.term.as_deref(), Some("Renal failure"));
    assert_eq!(lcs.min_depth, lcs.max_depth);
}

#[tokio::test]
async fn test_lcs_single_invocation_for_all_pairs() {
    let invoker = toolkit(&[]);
    let svc = UmlsSimilarity::with_invoker(invoker.clone());
    let table = svc
        .find_least_common_subsumer(&[("hand", "skull"), ("C0035078", "C0022658")])
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[1].lcs.as_ref().unwrap().cui.as_str(), "C0229962");
    assert_eq!(invoker.call_count(), 1);
}

#[tokio::test]
async fn test_shortest_path_found_and_missing() {
    let invoker = toolkit(&[]);
    let svc = UmlsSimilarity::with_invoker(invoker.clone());
    let table = svc
        .find_shortest_path(&[("C0018563", "C0037303"), ("hand", "moon")])
        .await
        .unwrap();

    assert_eq!(invoker.calls_for(Script::ShortestPath).len(), 2);
    assert_eq!(table.len(), 2);

    let found = table.rows[0].path.as_ref().unwrap();
    assert_eq!(found.length(), Some(3));
    assert_eq!(
        found.render_path(),
        "C0018563 (hand) => C0229962 (Body Part) => C0037303 (skull)"
    );
    assert_eq!(table.rows[1].path, Some(PathOutcome::NoPath));
    assert!(table.to_tsv().contains("No path found\tNo path found"));
}

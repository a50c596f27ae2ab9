//! Process-level tests for ProcessInvoker using stand-in shell scripts.
//!
//! The scripts are run through `/bin/sh` (configured as the interpreter)
//! so nothing here needs Perl or a UMLS database.

#![cfg(unix)]

use std::path::Path;

use umls_toolkit::{
    is_toolkit_available, ConnectionConfig, ProcessInvoker, Script, ToolCommand, ToolInvoker,
    ToolkitConfig, ToolkitError,
};

const ECHO_INFILE: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --infile=*) infile="${arg#--infile=}" ;;
    --measure=*) measure="${arg#--measure=}" ;;
  esac
done
while IFS= read -r line; do
  echo "0.5000<>$line"
done < "$infile"
echo "measure=$measure infile=$infile" >&2
"#;

const ECHO_ARGS: &str = r#"
echo "$@"
"#;

const FAIL: &str = r#"
echo "DBD::mysql::db do failed: Unknown database 'umls'" >&2
exit 3
"#;

const SLOW: &str = r#"
sleep 10
echo "too late"
"#;

fn write_script(dir: &Path, script: Script, body: &str) {
    std::fs::write(dir.join(script.file_name()), body).unwrap();
}

fn invoker(dir: &Path, timeout_secs: u64) -> ProcessInvoker {
    let connection =
        ConnectionConfig::new("umls", "s3cret", "localhost", "/tmp/mysql.sock", "umls");
    let toolkit = ToolkitConfig::new(dir)
        .with_perl("/bin/sh")
        .with_timeout(timeout_secs);
    ProcessInvoker::new(connection, toolkit).unwrap()
}

#[tokio::test]
async fn test_similarity_reads_infile_pairs() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), Script::Similarity, ECHO_INFILE);

    let cmd = ToolCommand::similarity(
        "wup",
        vec![
            ("C0018563".to_string(), "C0037303".to_string()),
            ("hand".to_string(), "skull".to_string()),
        ],
    );
    let result = invoker(dir.path(), 30).invoke(&cmd).await.unwrap();

    assert!(result.passed());
    assert_eq!(
        result.stdout,
        "0.5000<>C0018563<>C0037303\n0.5000<>hand<>skull\n"
    );
    assert!(result.stderr.contains("measure=wup"));

    // The infile is removed once the invocation returns.
    let infile = result
        .stderr
        .trim()
        .rsplit("infile=")
        .next()
        .unwrap()
        .to_string();
    assert!(!infile.is_empty());
    assert!(!Path::new(&infile).exists());
}

#[tokio::test]
async fn test_shortest_path_passes_pair_as_arguments() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), Script::ShortestPath, ECHO_ARGS);

    let result = invoker(dir.path(), 30)
        .invoke(&ToolCommand::shortest_path("C0018563", "C0037303"))
        .await
        .unwrap();

    let echoed = result.stdout.trim();
    assert!(echoed.contains("--username=umls"));
    assert!(echoed.contains("--socket=/tmp/mysql.sock"));
    assert!(echoed.contains("--length"));
    assert!(echoed.contains("--forcerun"));
    assert!(echoed.ends_with("C0018563 C0037303"));
}

#[tokio::test]
async fn test_non_zero_exit_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), Script::LeastCommonSubsumer, FAIL);

    let result = invoker(dir.path(), 30)
        .invoke(&ToolCommand::least_common_subsumer(vec![(
            "C0035078".to_string(),
            "C0035078".to_string(),
        )]))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 3);
    match result.into_success().unwrap_err() {
        ToolkitError::NonZeroExit { stderr, .. } => assert!(stderr.contains("Unknown database")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), Script::ShortestPath, SLOW);

    let err = invoker(dir.path(), 1)
        .invoke(&ToolCommand::shortest_path("a", "b"))
        .await
        .unwrap_err();

    assert!(matches!(err, ToolkitError::TimedOut { timeout_secs: 1, .. }));
}

#[test]
fn test_toolkit_available_when_all_scripts_present() {
    let dir = tempfile::tempdir().unwrap();
    for script in Script::ALL {
        write_script(dir.path(), script, ECHO_ARGS);
    }
    assert!(is_toolkit_available(&ToolkitConfig::new(dir.path())));
}

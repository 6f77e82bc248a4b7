/// End-to-end tests: properties -> reader -> pipeline -> rolling sinks
use eventcount::cli::run::{run_job, ExecutionMode, RunError, RunOptions};
use eventcount::config::types::*;
use eventcount::config::{FilesystemProbe, Properties};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_input(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("events.jsonl");
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(&path, body).unwrap();
    path
}

fn properties(input: &Path, output: &Path) -> Properties {
    let mut props = Properties::new();
    props.insert(DEBUG_MODE.into(), "false".into());
    props.insert(REGION.into(), "local".into());
    props.insert(STREAM_INIT_POSITION.into(), "TRIM_HORIZON".into());
    props.insert(INPUT_STREAM_NAME.into(), input.display().to_string());
    props.insert(SESSION_TIME_OUT_IN_MINUTES.into(), "5".into());
    props.insert(S3_OUTPUT_PATH.into(), output.display().to_string());
    props.insert(BUCKET_CHECK_INTERVAL_IN_SECONDS.into(), "1".into());
    props.insert(ROLLING_INTERVAL_IN_SECONDS.into(), "900".into());
    props.insert(INACTIVITY_INTERVAL_IN_SECONDS.into(), "300".into());
    props.insert(PARALLELISM.into(), "2".into());
    props
}

fn distributed() -> RunOptions {
    RunOptions {
        execution_mode: ExecutionMode::Distributed,
        follow: false,
    }
}

/// All finalized (non-hidden) lines written under a sink folder
fn finalized_lines(root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if !root.exists() {
        return lines;
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true);
            if !hidden {
                let content = fs::read_to_string(&path).unwrap();
                lines.extend(content.lines().map(str::to_string));
            }
        }
    }
    lines.sort();
    lines
}

#[tokio::test]
async fn test_informational_events_reach_messages_sink() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let input = write_input(
        input_dir.path(),
        &[
            r#"{"content":"started","type":3,"applicationid":"app","timestamp":0}"#,
            r#"{"content":"ready","type":7,"applicationid":"app","timestamp":90}"#,
        ],
    );

    let stats = run_job(
        &properties(&input, output_dir.path()),
        distributed(),
        &FilesystemProbe,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.records_received, 2);
    assert_eq!(stats.informational, 2);
    assert_eq!(stats.countable, 0);

    let messages = finalized_lines(&output_dir.path().join("messages"));
    assert_eq!(
        messages,
        vec![
            "(3, Thu Jan 01 00:00:00 UTC 1970, started)".to_string(),
            "(7, Thu Jan 01 00:01:30 UTC 1970, ready)".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_open_windows_are_discarded_at_end_of_input() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let input = write_input(
        input_dir.path(),
        &[
            r#"{"content":"a","type":20,"applicationid":"app","timestamp":0}"#,
            r#"{"content":"b","type":20,"applicationid":"app","timestamp":1}"#,
            r#"{"content":"c","type":21,"applicationid":"app","timestamp":2}"#,
        ],
    );

    let stats = run_job(
        &properties(&input, output_dir.path()),
        distributed(),
        &FilesystemProbe,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.countable, 3);
    assert_eq!(stats.windows_emitted, 0);
    assert_eq!(stats.windows_discarded, 2);
    assert!(finalized_lines(&output_dir.path().join("counters")).is_empty());
}

#[tokio::test]
async fn test_malformed_records_are_dropped() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let input = write_input(
        input_dir.path(),
        &[
            "not json at all",
            r#"{"content":"missing type","timestamp":5}"#,
            r#"{"content":"ok","type":1,"applicationid":"app","timestamp":0}"#,
        ],
    );

    let stats = run_job(
        &properties(&input, output_dir.path()),
        distributed(),
        &FilesystemProbe,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(stats.records_received, 3);
    assert_eq!(stats.decode_failures, 2);
    assert_eq!(
        finalized_lines(&output_dir.path().join("messages")),
        vec!["(1, Thu Jan 01 00:00:00 UTC 1970, ok)".to_string()]
    );
}

#[tokio::test]
async fn test_local_execution_is_refused() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let input = write_input(input_dir.path(), &[]);

    let options = RunOptions {
        execution_mode: ExecutionMode::Local,
        follow: false,
    };
    let result = run_job(
        &properties(&input, output_dir.path()),
        options,
        &FilesystemProbe,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(RunError::LocalExecution)));
    assert!(!output_dir.path().join("messages").exists());
}

#[tokio::test]
async fn test_missing_output_directory_fails_validation() {
    let input_dir = TempDir::new().unwrap();
    let input = write_input(input_dir.path(), &[]);
    let missing = input_dir.path().join("no-such-dir");

    let result = run_job(
        &properties(&input, &missing),
        distributed(),
        &FilesystemProbe,
        CancellationToken::new(),
    )
    .await;

    match result {
        Err(RunError::InvalidProperties(failures)) => assert_eq!(failures.len(), 1),
        other => panic!("expected invalid properties, got {:?}", other),
    }
}

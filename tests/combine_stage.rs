//! Combine stage convergence, tolerance and resumability tests.

use corpus_collector::combine::{CombineOutcome, CombineStage};
use corpus_collector::config::{
    PathsConfig, PerformanceConfig, PipelineConfig, SourceConfig, StageToggles, StoreConfig,
};
use std::io::Write;
use std::path::Path;

fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        stages: StageToggles::default(),
        store: StoreConfig {
            region: "us-east-1".to_string(),
            access_key: "test".to_string(),
            secret_key: "test".to_string(),
            bucket: "test".to_string(),
            url_expiry_minutes: 60,
        },
        source: SourceConfig {
            column: "object_key".to_string(),
            limit: 0,
        },
        performance: PerformanceConfig {
            url_workers: 4,
            download_workers: 4,
            combine_workers: 4,
        },
        paths: PathsConfig {
            key_file: dir.join("keys.csv"),
            download_dir: dir.join("downloads"),
            download_failure_log: dir.join("download_failures.log"),
            combine_failure_log: dir.join("combine_failures.log"),
            output_file: dir.join("corpus.jsonl"),
        },
    }
}

fn write_artifact(config: &PipelineConfig, name: &str, contents: &str) {
    std::fs::create_dir_all(&config.paths.download_dir).unwrap();
    let mut file = std::fs::File::create(config.paths.download_dir.join(name)).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

fn corpus_lines(config: &PipelineConfig) -> Vec<serde_json::Value> {
    let contents = std::fs::read_to_string(&config.paths.output_file).unwrap_or_default();
    contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn processed_names(config: &PipelineConfig) -> Vec<String> {
    let mut path = config.paths.output_file.as_os_str().to_os_string();
    path.push(".log");
    let contents = std::fs::read_to_string(path).unwrap_or_default();
    contents.lines().map(|l| l.to_string()).collect()
}

#[tokio::test]
async fn convergence_with_textless_artifacts() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    // A yields text, B has no items field, C has an item without the field.
    write_artifact(
        &config,
        "A.jsonl",
        r#"{"items": [{"formattedString": "hello"}]}
"#,
    );
    write_artifact(&config, "B.jsonl", "{\"metadata\": \"only\"}\n");
    write_artifact(&config, "C.jsonl", "{\"items\": [{}]}\n");

    let outcome = CombineStage::new(&config).run().await.unwrap();
    match outcome {
        CombineOutcome::Completed(summary) => {
            assert_eq!(summary.appended, 1);
            assert_eq!(summary.empty, 2);
            assert_eq!(summary.failed, 0);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let lines = corpus_lines(&config);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["source_file"], "A.jsonl");
    assert_eq!(lines[0]["text"], "hello");

    // Textless artifacts are marked processed so they are not re-scanned
    // on every future run.
    let mut processed = processed_names(&config);
    processed.sort();
    assert_eq!(processed, vec!["A.jsonl", "B.jsonl", "C.jsonl"]);

    let outcome = CombineStage::new(&config).run().await.unwrap();
    assert_eq!(outcome, CombineOutcome::NoPendingWork);
    assert_eq!(corpus_lines(&config).len(), 1);
}

#[tokio::test]
async fn malformed_lines_do_not_fail_the_artifact() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_artifact(
        &config,
        "mixed.jsonl",
        "this is not json\n{\"items\": [{\"formattedString\": \"survived\"}]}\n",
    );

    let outcome = CombineStage::new(&config).run().await.unwrap();
    match outcome {
        CombineOutcome::Completed(summary) => {
            assert_eq!(summary.appended, 1);
            assert_eq!(summary.failed, 0);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let lines = corpus_lines(&config);
    assert_eq!(lines[0]["text"], "survived");
}

#[tokio::test]
async fn corpus_grows_monotonically_across_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_artifact(
        &config,
        "first.jsonl",
        r#"{"items": [{"formattedString": "one"}]}
"#,
    );
    let outcome = CombineStage::new(&config).run().await.unwrap();
    assert!(matches!(outcome, CombineOutcome::Completed(_)));
    assert_eq!(corpus_lines(&config).len(), 1);

    // A later download run adds another artifact; only it is processed.
    write_artifact(
        &config,
        "second.jsonl",
        r#"{"items": [{"formattedString": "two"}]}
"#,
    );
    let outcome = CombineStage::new(&config).run().await.unwrap();
    match outcome {
        CombineOutcome::Completed(summary) => assert_eq!(summary.appended, 1),
        other => panic!("expected Completed, got {other:?}"),
    }

    let lines = corpus_lines(&config);
    assert_eq!(lines.len(), 2);
    let sources: Vec<&str> = lines
        .iter()
        .map(|l| l["source_file"].as_str().unwrap())
        .collect();
    assert!(sources.contains(&"first.jsonl"));
    assert!(sources.contains(&"second.jsonl"));
}

#[tokio::test]
async fn unreadable_artifact_stays_pending() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_artifact(
        &config,
        "good.jsonl",
        r#"{"items": [{"formattedString": "fine"}]}
"#,
    );
    // A directory with an artifact name: opening succeeds, reading fails.
    std::fs::create_dir_all(config.paths.download_dir.join("bad.jsonl")).unwrap();

    let outcome = CombineStage::new(&config).run().await.unwrap();
    match outcome {
        CombineOutcome::Completed(summary) => {
            assert_eq!(summary.appended, 1);
            assert_eq!(summary.failed, 1);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    // The failed artifact is not marked processed and will be retried.
    let processed = processed_names(&config);
    assert_eq!(processed, vec!["good.jsonl"]);

    let log = std::fs::read_to_string(&config.paths.combine_failure_log).unwrap();
    assert!(log.contains("Key: bad.jsonl"));
}

#[tokio::test]
async fn missing_download_dir_is_skipped() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    let outcome = CombineStage::new(&config).run().await.unwrap();
    assert_eq!(outcome, CombineOutcome::NoSourceDir);
    assert!(!config.paths.output_file.exists());
}

#[tokio::test]
async fn fully_processed_directory_short_circuits() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_artifact(
        &config,
        "done.jsonl",
        r#"{"items": [{"formattedString": "already"}]}
"#,
    );
    let mut log_path = config.paths.output_file.as_os_str().to_os_string();
    log_path.push(".log");
    std::fs::write(&log_path, "done.jsonl\n").unwrap();

    let outcome = CombineStage::new(&config).run().await.unwrap();
    assert_eq!(outcome, CombineOutcome::NoPendingWork);
    assert!(!config.paths.output_file.exists());
}

#[tokio::test]
async fn temporary_files_are_not_picked_up() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = test_config(dir.path());

    write_artifact(
        &config,
        "real.jsonl",
        r#"{"items": [{"formattedString": "real"}]}
"#,
    );
    // Leftover from an interrupted download run; never promoted.
    write_artifact(&config, "orphan.jsonl.tmp", "{\"items\": []}");

    let outcome = CombineStage::new(&config).run().await.unwrap();
    match outcome {
        CombineOutcome::Completed(summary) => {
            assert_eq!(summary.appended, 1);
            assert_eq!(summary.empty, 0);
            assert_eq!(summary.failed, 0);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(processed_names(&config), vec!["real.jsonl"]);
}

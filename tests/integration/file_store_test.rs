// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use gridcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use gridcrawl::domain::models::crawl_run::RunState;
use gridcrawl::domain::repositories::checkpoint_repository::CheckpointStore;
use gridcrawl::domain::repositories::result_sink::ResultSink;
use gridcrawl::infrastructure::storage::{
    FileCheckpointStore, FileResultSink, CHECKPOINT_FILE, LISTINGS_FILE, OWNERS_FILE,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

async fn run_once(dir: &Path, source: Arc<FakeSource>) -> gridcrawl::domain::models::crawl_run::RunSummary {
    let checkpoint = Arc::new(FileCheckpointStore::open(dir.join(CHECKPOINT_FILE)).await.unwrap());
    let sink = Arc::new(FileResultSink::open(dir).await.unwrap());
    let use_case = CrawlUseCase::new(
        source,
        checkpoint,
        sink,
        None,
        Arc::new(RecordingPublisher::default()),
    );
    let (_tx, rx) = watch::channel(false);
    use_case.execute(test_options(), rx).await.unwrap()
}

fn grid_source() -> Arc<FakeSource> {
    Arc::new(FakeSource::with_cells(&[
        ("r0c0", &["1", "2", "3"]),
        ("r0c1", &["3", "4", "5"]),
        ("r1c0", &["6", "7", "8"]),
        ("r1c1", &["9", "10", "11"]),
    ]))
}

#[tokio::test]
async fn test_restart_resumes_from_files() {
    let dir = tempfile::tempdir().unwrap();

    let first = run_once(dir.path(), grid_source()).await;
    assert_eq!(first.state, RunState::Done);
    assert_eq!(first.counters.processed_this_run, 11);

    // A fresh process opens the same directory
    let source = grid_source();
    let second = run_once(dir.path(), source.clone()).await;
    assert_eq!(second.counters.already_processed, 11);
    assert_eq!(second.counters.processed_this_run, 0);
    assert!(source.fetched().is_empty());

    let checkpoint = FileCheckpointStore::open(dir.path().join(CHECKPOINT_FILE)).await.unwrap();
    assert_eq!(checkpoint.load().await.unwrap().len(), 11);

    let sink = FileResultSink::open(dir.path()).await.unwrap();
    let rows = sink.load_all().await.unwrap();
    assert_eq!(rows.len(), 11);
    assert!(rows.iter().all(|r| r.owner.owner_listing_count == Some(1)));
    assert_eq!(sink.load_aggregates().await.unwrap().len(), 11);

    assert!(dir.path().join(LISTINGS_FILE).exists());
    assert!(dir.path().join(OWNERS_FILE).exists());
}

#[tokio::test]
async fn test_listing_rows_stay_unique_after_owner_updates() {
    let dir = tempfile::tempdir().unwrap();
    run_once(dir.path(), grid_source()).await;

    let contents = std::fs::read_to_string(dir.path().join(LISTINGS_FILE)).unwrap();
    let mut ids: Vec<String> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 11);
    assert_eq!(contents.lines().filter(|l| !l.trim().is_empty()).count(), 11);
}

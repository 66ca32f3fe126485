// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use gridcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use gridcrawl::domain::models::crawl_run::RunState;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn test_checkpointed_ids_are_not_fetched() {
    let source = Arc::new(FakeSource::with_cells(&[("r0c0", &["x", "y", "z"])]));
    let checkpoint = Arc::new(MemoryCheckpoint::with(&["x"]));
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        Arc::new(MemorySink::default()),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(summary.counters.discovered, 3);
    assert_eq!(summary.counters.already_processed, 1);
    assert_eq!(summary.counters.processed_this_run, 2);
    assert_eq!(source.fetched(), vec!["y".to_string(), "z".to_string()]);
    assert!(checkpoint.ids.lock().contains(&id("z")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_retried_on_next_run() {
    let source = Arc::new(FakeSource::with_cells(&[("r0c0", &["x", "y"])]));
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    sink.failing.lock().insert("y".to_string());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        sink.clone(),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (_tx, rx) = watch::channel(false);
    let first = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(first.state, RunState::Done);
    assert_eq!(first.counters.processed_this_run, 1);
    assert_eq!(first.counters.failed, 1);
    assert!(!checkpoint.ids.lock().contains(&id("y")));
    assert!(sink.row("y").is_none());

    // The disk recovers
    sink.failing.lock().clear();
    let (_tx, rx) = watch::channel(false);
    let second = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(second.counters.already_processed, 1);
    assert_eq!(second.counters.processed_this_run, 1);
    assert!(checkpoint.ids.lock().contains(&id("y")));
    assert!(sink.row("y").is_some());
    assert_eq!(source.fetched(), vec!["x".to_string(), "y".to_string(), "y".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_detail_fetch_leaves_id_unmarked() {
    let mut source = FakeSource::with_cells(&[("r0c0", &["x", "y"])]);
    source.failing_details.insert("x".to_string());
    let source = Arc::new(source);
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        Arc::new(MemorySink::default()),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(summary.counters.failed, 1);
    assert_eq!(summary.counters.processed_this_run, 1);
    // Three attempts for x, one for y
    assert_eq!(source.fetched().iter().filter(|i| *i == "x").count(), 3);
    assert!(!checkpoint.ids.lock().contains(&id("x")));
    assert!(checkpoint.ids.lock().contains(&id("y")));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_scope_listing_is_marked_but_not_stored() {
    let mut source = FakeSource::with_cells(&[("r0c0", &["near", "far"])]);
    source.details.insert(
        "far".to_string(),
        json!({"name": "Far away", "lat": 50.0, "lng": 50.0}),
    );
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    let use_case = CrawlUseCase::new(
        Arc::new(source),
        checkpoint.clone(),
        sink.clone(),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(summary.counters.skipped_out_of_scope, 1);
    assert_eq!(summary.counters.processed_this_run, 1);
    assert!(checkpoint.ids.lock().contains(&id("far")));
    assert!(sink.row("far").is_none());
    assert!(sink.row("near").is_some());
}

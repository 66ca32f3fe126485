// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use gridcrawl::application::use_cases::crawl_use_case::CrawlUseCase;
use gridcrawl::domain::models::crawl_run::RunState;
use gridcrawl::domain::models::owner::OwnerId;
use async_trait::async_trait;
use gridcrawl::domain::models::listing::EntityId;
use gridcrawl::domain::models::search::{DetailParams, SearchPage, SearchQuery};
use gridcrawl::domain::repositories::checkpoint_repository::CheckpointStore;
use gridcrawl::domain::repositories::publisher::{PublishCheckpoint, PublishError, Publisher};
use gridcrawl::sources::traits::{ListingSource, OwnerDirectory, SourceError};
use gridcrawl::utils::errors::{ConfigError, CrawlError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// 对指定ID的详情请求永远不返回，并在请求开始时发出通知
struct StallingSource {
    inner: FakeSource,
    stall_on: String,
    stalled: Notify,
}

#[async_trait]
impl ListingSource for StallingSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        self.inner.search(query).await
    }

    async fn fetch_detail(&self, id: &EntityId, params: &DetailParams) -> Result<Value, SourceError> {
        if id.as_str() == self.stall_on {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        self.inner.fetch_detail(id, params).await
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

/// 永远不结束的发布者
struct HangingPublisher;

#[async_trait]
impl Publisher for HangingPublisher {
    async fn publish(&self, _checkpoint: &PublishCheckpoint) -> Result<(), PublishError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

fn grid_source() -> FakeSource {
    FakeSource::with_cells(&[
        ("r0c0", &["1", "2", "3"]),
        ("r0c1", &["3", "4", "5"]),
        ("r1c0", &["6", "7", "8"]),
        ("r1c1", &["9", "10", "11"]),
    ])
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_two_by_two_grid() {
    let source = Arc::new(grid_source());
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        sink.clone(),
        None,
        publisher.clone(),
    );
    let (_tx, rx) = watch::channel(false);

    let summary = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.counters.discovered, 11);
    assert_eq!(summary.counters.processed_this_run, 11);
    assert_eq!(summary.counters.failed, 0);
    assert_eq!(sink.rows.lock().len(), 11);
    assert_eq!(checkpoint.ids.lock().len(), 11);
    assert_eq!(source.fetched().len(), 11);

    // Every listing has its own host, so each aggregate counts one listing
    let row = sink.row("4").unwrap();
    assert_eq!(row.listing.title.as_deref(), Some("Listing 4"));
    assert_eq!(row.owner.owner_listing_count, Some(1));
    assert_eq!(sink.aggregates.lock().len(), 11);

    // Only the final publish when no interval is configured
    let published = publisher.published.lock();
    assert_eq!(published.len(), 1);
    assert!(published[0].final_flush);
    assert_eq!(published[0].persisted, 11);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_processes_nothing_new() {
    let source = Arc::new(grid_source());
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        sink.clone(),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (_tx, rx) = watch::channel(false);
    use_case.execute(test_options(), rx).await.unwrap();
    let (_tx, rx) = watch::channel(false);
    let second = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(second.counters.discovered, 11);
    assert_eq!(second.counters.already_processed, 11);
    assert_eq!(second.counters.processed_this_run, 0);
    assert_eq!(source.fetched().len(), 11);
    assert_eq!(sink.rows.lock().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_max_listings_defers_the_rest() {
    let source = Arc::new(grid_source());
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    let use_case = CrawlUseCase::new(
        source,
        checkpoint.clone(),
        sink,
        None,
        Arc::new(RecordingPublisher::default()),
    );
    let mut options = test_options();
    options.max_listings = Some(4);

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(options, rx).await.unwrap();

    assert_eq!(summary.counters.processed_this_run, 4);
    assert_eq!(summary.counters.deferred, 7);
    assert_eq!(checkpoint.ids.lock().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shared_owner_counts_and_enrichment() {
    let mut source = FakeSource::with_cells(&[("r0c0", &["a", "b", "c"])]);
    for (listing, host, flagged) in [("a", "h1", false), ("b", "h1", false), ("c", "h2", true)] {
        source.details.insert(
            listing.to_string(),
            json!({"name": listing, "host": {"id": host, "is_superhost": flagged}}),
        );
    }
    let directory = Arc::new(FakeDirectory::default());
    let sink = Arc::new(MemorySink::default());
    let use_case = CrawlUseCase::new(
        Arc::new(source),
        Arc::new(MemoryCheckpoint::default()),
        sink.clone(),
        Some(directory.clone() as Arc<dyn OwnerDirectory>),
        Arc::new(RecordingPublisher::default()),
    );
    let mut options = test_options();
    options.enrichment.enabled = true;
    options.enrichment.budget = 1;
    options.enrichment.seed = Some(9);

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(options, rx).await.unwrap();

    assert_eq!(summary.counters.enriched_owners, 1);
    assert_eq!(directory.calls.lock().as_slice(), ["h1".to_string()]);

    let h1 = OwnerId::parse("h1").unwrap();
    let aggregates = sink.aggregates.lock().clone();
    assert_eq!(aggregates[&h1].listing_count, 2);
    assert!(aggregates[&h1].is_enriched());

    let row = sink.row("b").unwrap();
    assert_eq!(row.owner.owner_listing_count, Some(2));
    assert_eq!(row.owner.host_name.as_deref(), Some("Owner h1"));
    assert_eq!(row.owner.host_joined_year, Some(2019));
    assert_eq!(row.owner.host_years_active, Some(6));
    assert_eq!(sink.row("c").unwrap().owner.owner_listing_count, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_publishes_every_n_records() {
    let publisher = Arc::new(RecordingPublisher::default());
    let use_case = CrawlUseCase::new(
        Arc::new(grid_source()),
        Arc::new(MemoryCheckpoint::default()),
        Arc::new(MemorySink::default()),
        None,
        publisher.clone(),
    );
    let mut options = test_options();
    options.publish_every = 5;

    let (_tx, rx) = watch::channel(false);
    use_case.execute(options, rx).await.unwrap();

    let published = publisher.published.lock();
    let counts: Vec<(usize, bool)> = published.iter().map(|p| (p.persisted, p.final_flush)).collect();
    assert_eq!(counts, vec![(5, false), (10, false), (11, true)]);
}

#[tokio::test(start_paused = true)]
async fn test_configuration_error_fails_before_work() {
    let source = Arc::new(grid_source());
    let use_case = CrawlUseCase::new(
        source.clone(),
        Arc::new(MemoryCheckpoint::default()),
        Arc::new(MemorySink::default()),
        None,
        Arc::new(RecordingPublisher::default()),
    );
    let mut options = test_options();
    options.cols = 0;

    let (_tx, rx) = watch::channel(false);
    let result = use_case.execute(options, rx).await;

    assert!(matches!(
        result,
        Err(CrawlError::Config(ConfigError::InvalidGrid(_)))
    ));
    assert!(source.fetched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_stops_fetching() {
    let source = Arc::new(grid_source());
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        Arc::new(MemorySink::default()),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let summary = use_case.execute(test_options(), rx).await.unwrap();

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.counters.processed_this_run, 0);
    assert!(source.fetched().is_empty());
    assert!(checkpoint.load().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_fetching_keeps_persisted_work() {
    let source = Arc::new(StallingSource {
        inner: FakeSource::with_cells(&[("r0c0", &["a", "b", "c", "d"])]),
        stall_on: "c".to_string(),
        stalled: Notify::new(),
    });
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());
    let use_case = CrawlUseCase::new(
        source.clone(),
        checkpoint.clone(),
        sink.clone(),
        None,
        Arc::new(RecordingPublisher::default()),
    );

    let (tx, rx) = watch::channel(false);
    let stop_when_stalled = async {
        source.stalled.notified().await;
        tx.send(true).unwrap();
    };
    let (summary, ()) = tokio::join!(use_case.execute(test_options(), rx), stop_when_stalled);
    let summary = summary.unwrap();

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.counters.processed_this_run, 2);
    let marked = checkpoint.ids.lock().clone();
    assert!(marked.contains(&id("a")) && marked.contains(&id("b")));
    assert!(!marked.contains(&id("c")));
    assert!(!marked.contains(&id("d")));
    assert!(sink.row("c").is_none());
    assert!(sink.row("d").is_none());
    // Persisted rows still get their owner columns
    assert_eq!(sink.row("a").unwrap().owner.owner_listing_count, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_hung_publisher_does_not_stall_the_run() {
    let use_case = CrawlUseCase::new(
        Arc::new(grid_source()),
        Arc::new(MemoryCheckpoint::default()),
        Arc::new(MemorySink::default()),
        None,
        Arc::new(HangingPublisher),
    );
    let mut options = test_options();
    options.publish_every = 2;
    options.publish_timeout = Duration::from_secs(5);

    let (_tx, rx) = watch::channel(false);
    let summary = use_case.execute(options, rx).await.unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.counters.processed_this_run, 11);
}

#[tokio::test(start_paused = true)]
async fn test_enrichment_only_considers_owners_found_this_run() {
    let checkpoint = Arc::new(MemoryCheckpoint::default());
    let sink = Arc::new(MemorySink::default());

    let first = CrawlUseCase::new(
        Arc::new(FakeSource::with_cells(&[("r0c0", &["a", "b"])])),
        checkpoint.clone(),
        sink.clone(),
        None,
        Arc::new(RecordingPublisher::default()),
    );
    let (_tx, rx) = watch::channel(false);
    first.execute(test_options(), rx).await.unwrap();

    let directory = Arc::new(FakeDirectory::default());
    let second = CrawlUseCase::new(
        Arc::new(FakeSource::with_cells(&[("r1c1", &["z"])])),
        checkpoint.clone(),
        sink.clone(),
        Some(directory.clone() as Arc<dyn OwnerDirectory>),
        Arc::new(RecordingPublisher::default()),
    );
    let mut options = test_options();
    options.enrichment.enabled = true;
    options.enrichment.budget = 10;
    options.enrichment.seed = Some(1);

    let (_tx, rx) = watch::channel(false);
    let summary = second.execute(options, rx).await.unwrap();

    assert_eq!(summary.counters.enriched_owners, 1);
    assert_eq!(directory.calls.lock().as_slice(), ["host-z".to_string()]);
    // Earlier rows still count towards the aggregates
    assert_eq!(sink.aggregates.lock().len(), 3);
}

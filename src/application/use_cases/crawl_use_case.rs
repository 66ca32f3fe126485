// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::{
    models::{
        area::{Area, AreaBounds, Cell},
        crawl_run::{CrawlRun, RunState, RunSummary, TimeWindow},
        listing::{EntityId, ListingRecord, OwnerColumns},
        owner::{OwnerAggregate, OwnerId, OwnerProfile},
        search::{DetailParams, SearchParams},
    },
    repositories::{
        checkpoint_repository::{filter_remaining, CheckpointStore, WorkList},
        publisher::{PublishCheckpoint, Publisher},
        result_sink::{ResultSink, StoreError},
    },
    services::{
        aggregation_service::{merge_aggregates, recompute},
        area_grid::AreaGrid,
        detail_service::{
            DetailFetchStage, DetailOutcome, ListingNormalizer, UrlTemplates,
            DEFAULT_GEOFENCE_MARGIN, DEFAULT_REGISTRATION_PATTERN,
        },
        discovery_service::{DiscoveryFrontier, IdExtractor},
        enrichment_service::{select_for_enrichment, EnrichmentScheduler},
        field_extractor::DEFAULT_ID_PATHS,
    },
};
use crate::sources::traits::{ListingSource, OwnerDirectory};
use crate::utils::errors::{ConfigError, CrawlError};
use crate::utils::pacer::Pacer;
use crate::utils::retry_policy::RetryPolicy;
use chrono::{Datelike, Utc};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// 主人补全选项
#[derive(Debug, Clone)]
pub struct EnrichmentOptions {
    pub enabled: bool,
    /// 本次运行最多补全的主人数
    pub budget: usize,
    /// 忽略已有的补全信息重新获取
    pub force: bool,
    /// 是否额外统计主人的房源总数
    pub count_listings: bool,
    /// 随机抽样的种子，`None` 时使用随机种子
    pub seed: Option<u64>,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            budget: 50,
            force: false,
            count_listings: false,
            seed: None,
        }
    }
}

/// 各类调用的重试策略
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub search: RetryPolicy,
    pub detail: RetryPolicy,
    pub enrichment: RetryPolicy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            search: RetryPolicy::new(3, Duration::from_secs(2)),
            detail: RetryPolicy::new(3, Duration::from_secs(1)),
            enrichment: RetryPolicy::new(2, Duration::from_secs(1)),
        }
    }
}

/// 各类调用之间的最小间隔
#[derive(Debug, Clone)]
pub struct DelayOptions {
    pub search: Duration,
    pub detail: Duration,
    pub enrichment: Duration,
}

impl Default for DelayOptions {
    fn default() -> Self {
        Self {
            search: Duration::from_millis(2000),
            detail: Duration::from_millis(1000),
            enrichment: Duration::from_millis(500),
        }
    }
}

/// 一次运行的完整参数
///
/// 区域和网格以原始值保存，在运行开始时校验，
/// 这样配置错误会让运行进入 `Failed` 而不是在构造时崩溃
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub area: AreaBounds,
    pub rows: u32,
    pub cols: u32,
    pub overlap: f64,
    pub window: TimeWindow,
    /// 单次运行最多处理的新房源数
    pub max_listings: Option<usize>,
    /// 同时进行的详情抓取数
    pub detail_concurrency: usize,
    pub search: SearchParams,
    pub detail: DetailParams,
    pub enrichment: EnrichmentOptions,
    pub retry: RetryOptions,
    pub delays: DelayOptions,
    pub geofence_margin: f64,
    /// 登记编号正则，`None` 时不从文本中提取
    pub registration_pattern: Option<String>,
    pub id_paths: Vec<String>,
    pub urls: UrlTemplates,
    /// 每持久化多少条记录发布一次，0 表示只在结束时发布
    pub publish_every: usize,
    /// 单次发布的最长时间，超时后放弃本次发布继续处理
    pub publish_timeout: Duration,
    pub current_year: i32,
}

impl CrawlOptions {
    /// 使用默认参数创建
    pub fn new(area: AreaBounds, window: TimeWindow) -> Self {
        Self {
            area,
            rows: 3,
            cols: 3,
            overlap: 0.1,
            window,
            max_listings: None,
            detail_concurrency: 1,
            search: SearchParams::default(),
            detail: DetailParams {
                window: Some(window),
                ..DetailParams::default()
            },
            enrichment: EnrichmentOptions::default(),
            retry: RetryOptions::default(),
            delays: DelayOptions::default(),
            geofence_margin: DEFAULT_GEOFENCE_MARGIN,
            registration_pattern: Some(DEFAULT_REGISTRATION_PATTERN.to_string()),
            id_paths: DEFAULT_ID_PATHS.iter().map(|p| (*p).to_string()).collect(),
            urls: UrlTemplates::default(),
            publish_every: 0,
            publish_timeout: Duration::from_secs(120),
            current_year: Utc::now().year(),
        }
    }
}

/// 校验后的运行计划
struct RunPlan {
    area: Area,
    cells: Vec<Cell>,
    registration: Option<Regex>,
}

impl RunPlan {
    fn build(options: &CrawlOptions) -> Result<Self, ConfigError> {
        let area = Area::try_from(options.area)?;
        let cells = AreaGrid::partition(&area, options.rows, options.cols, options.overlap)?;

        if options.enrichment.enabled && options.enrichment.budget == 0 {
            return Err(ConfigError::InvalidBudget(
                "enrichment is enabled but the budget is 0".to_string(),
            ));
        }
        if options.detail_concurrency == 0 {
            return Err(ConfigError::InvalidParameter(
                "detail concurrency must be at least 1".to_string(),
            ));
        }
        if !(options.geofence_margin >= 0.0) || !options.geofence_margin.is_finite() {
            return Err(ConfigError::InvalidParameter(format!(
                "geofence margin must be non-negative, got {}",
                options.geofence_margin
            )));
        }
        if options.id_paths.is_empty() {
            return Err(ConfigError::InvalidParameter(
                "at least one id extraction path is required".to_string(),
            ));
        }

        let registration = options
            .registration_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ConfigError::InvalidParameter(format!("registration pattern: {e}")))?;

        Ok(Self {
            area,
            cells,
            registration,
        })
    }
}

/// 等待停止信号；发送端被丢弃时永远挂起
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 爬取用例
///
/// 驱动一次完整的运行：发现 → 过滤 → 详情 → [补全] → 汇总 → 持久化
pub struct CrawlUseCase<S, C, R>
where
    S: ListingSource + ?Sized,
    C: CheckpointStore + ?Sized,
    R: ResultSink + ?Sized,
{
    source: Arc<S>,
    checkpoint: Arc<C>,
    sink: Arc<R>,
    owners: Option<Arc<dyn OwnerDirectory>>,
    publisher: Arc<dyn Publisher>,
}

impl<S, C, R> CrawlUseCase<S, C, R>
where
    S: ListingSource + ?Sized,
    C: CheckpointStore + ?Sized,
    R: ResultSink + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        checkpoint: Arc<C>,
        sink: Arc<R>,
        owners: Option<Arc<dyn OwnerDirectory>>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            source,
            checkpoint,
            sink,
            owners,
            publisher,
        }
    }

    /// 执行一次运行
    ///
    /// # 参数
    ///
    /// * `options` - 运行参数
    /// * `shutdown` - 停止信号，值变为 `true` 时停止抓取新的详情
    ///
    /// # 返回值
    ///
    /// * `Ok(RunSummary)` - 以 `Done` 或 `Cancelled` 结束
    /// * `Err(CrawlError)` - 配置错误或整体持久化失败，运行进入 `Failed`
    pub async fn execute(
        &self,
        options: CrawlOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, CrawlError> {
        let mut run = CrawlRun::new(options.window);
        let span = info_span!("crawl_run", run_id = %run.id);

        async {
            match self.drive(&mut run, &options, shutdown).await {
                Ok(()) => {
                    let summary = run.summary();
                    info!(%summary, "Run finished");
                    metrics::counter!("gridcrawl_runs_total", "state" => run.state.to_string())
                        .increment(1);
                    Ok(summary)
                }
                Err(e) => {
                    error!(error = %e, "Run failed");
                    run.transition(RunState::Failed);
                    metrics::counter!("gridcrawl_runs_total", "state" => run.state.to_string())
                        .increment(1);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        run: &mut CrawlRun,
        options: &CrawlOptions,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), CrawlError> {
        let plan = RunPlan::build(options)?;
        run.cells = plan.cells.clone();

        // Discovery
        run.transition(RunState::Discovering);
        let frontier = DiscoveryFrontier::new(
            Arc::clone(&self.source),
            options.retry.search.clone(),
            Arc::new(Pacer::new("search", options.delays.search)),
            IdExtractor::new(options.id_paths.clone()),
            options.window,
            options.search.clone(),
        );
        let report = tokio::select! {
            biased;
            _ = cancelled(&mut shutdown) => None,
            report = frontier.discover(&plan.cells) => Some(report),
        };

        let mut was_cancelled = report.is_none();
        let mut discovered: BTreeSet<EntityId> = BTreeSet::new();

        if let Some(report) = report {
            discovered.clone_from(&report.ids);
            run.counters.discovered = report.ids.len();
            run.counters.dropped_hits = report.dropped_hits;
            run.counters.failed_cells = report.failed_cells.len();

            run.transition(RunState::FilteringAgainstCheckpoint);
            let done = self.checkpoint.load().await?;
            let work = filter_remaining(&report.ids, &done, options.max_listings);
            run.counters.already_processed = work.already_processed;
            run.counters.deferred = work.deferred;
            info!(
                discovered = run.counters.discovered,
                already_processed = work.already_processed,
                remaining = work.remaining.len(),
                deferred = work.deferred,
                "Work list computed"
            );

            run.transition(RunState::FetchingDetails);
            let normalizer = ListingNormalizer::new(
                &plan.area,
                options.geofence_margin,
                plan.registration.clone(),
                options.urls.clone(),
            );
            let stage = DetailFetchStage::new(
                Arc::clone(&self.source),
                options.retry.detail.clone(),
                Arc::new(Pacer::new("detail", options.delays.detail)),
                options.detail.clone(),
                normalizer,
            );
            was_cancelled = self
                .fetch_details(run, &stage, work, options, &mut shutdown)
                .await;
        } else {
            warn!("Cancelled during discovery");
        }

        let all = self.sink.load_all().await?;
        let previous = self.sink.load_aggregates().await?;

        let mut enrichment: BTreeMap<OwnerId, OwnerProfile> = BTreeMap::new();
        if options.enrichment.enabled && !was_cancelled {
            match &self.owners {
                Some(directory) => {
                    run.transition(RunState::EnrichingOwners);
                    let known: HashSet<OwnerId> = previous
                        .values()
                        .filter(|a| a.is_enriched())
                        .map(|a| a.owner_id.clone())
                        .collect();
                    let mut rng = StdRng::seed_from_u64(
                        options.enrichment.seed.unwrap_or_else(rand::random),
                    );
                    // Only owners seen by this run's discovery are candidates
                    let selected = select_for_enrichment(
                        all.iter()
                            .filter(|r| discovered.contains(r.id()))
                            .map(|r| &r.listing),
                        options.enrichment.budget,
                        &known,
                        options.enrichment.force,
                        &mut rng,
                    );
                    info!(selected = selected.len(), budget = options.enrichment.budget, "Owners selected for enrichment");

                    let mut scheduler = EnrichmentScheduler::new(
                        Arc::clone(directory),
                        options.retry.enrichment.clone(),
                        Arc::new(Pacer::new("enrichment", options.delays.enrichment)),
                        options.enrichment.count_listings,
                        options.current_year,
                    );
                    enrichment = scheduler.enrich_selected(&selected).await;
                    run.counters.enriched_owners = enrichment.len();
                    run.counters.enrichment_failures = scheduler.failures();
                }
                None => warn!("Enrichment enabled but no owner directory configured, skipping"),
            }
        }

        run.transition(RunState::Aggregating);
        self.aggregate(&all, &previous, &enrichment).await?;

        run.transition(RunState::Persisted);
        self.publish(run, true, options.publish_timeout).await;

        run.transition(if was_cancelled {
            RunState::Cancelled
        } else {
            RunState::Done
        });
        Ok(())
    }

    /// 有界并发地抓取详情
    ///
    /// 消费循环是唯一的写入方：先持久化记录再标记检查点。
    /// 返回是否因停止信号提前结束。
    async fn fetch_details(
        &self,
        run: &mut CrawlRun,
        stage: &DetailFetchStage<S>,
        work: WorkList,
        options: &CrawlOptions,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let fetches = stream::iter(work.remaining)
            .map(|id| async move {
                let outcome = stage.fetch_and_normalize(&id).await;
                (id, outcome)
            })
            .buffer_unordered(options.detail_concurrency);
        tokio::pin!(fetches);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(shutdown) => {
                    warn!(
                        processed = run.counters.processed_this_run,
                        "Stop requested, abandoning in-flight fetches"
                    );
                    return true;
                }
                next = fetches.next() => next,
            };
            let Some((id, outcome)) = next else {
                return false;
            };

            match outcome {
                Ok(DetailOutcome::Listing(listing)) => {
                    let record = ListingRecord::new(*listing, Utc::now());
                    match self.persist_then_mark(&record).await {
                        Ok(()) => {
                            run.counters.processed_this_run += 1;
                            metrics::counter!("gridcrawl_listings_persisted_total").increment(1);
                            debug!(id = %id, "Listing persisted");

                            let persisted = run.counters.processed_this_run;
                            if options.publish_every > 0 && persisted % options.publish_every == 0 {
                                self.publish(run, false, options.publish_timeout).await;
                            }
                        }
                        Err(e) => {
                            warn!(id = %id, error = %e, "Failed to persist listing, leaving it unmarked");
                            run.counters.failed += 1;
                            metrics::counter!("gridcrawl_listings_failed_total").increment(1);
                        }
                    }
                }
                Ok(DetailOutcome::OutOfScope { .. }) => {
                    run.counters.skipped_out_of_scope += 1;
                    metrics::counter!("gridcrawl_listings_out_of_scope_total").increment(1);
                    if let Err(e) = self.checkpoint.mark_done(&id).await {
                        warn!(id = %id, error = %e, "Failed to checkpoint out-of-scope listing");
                    }
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Detail fetch exhausted retries");
                    run.counters.failed += 1;
                    metrics::counter!("gridcrawl_listings_failed_total").increment(1);
                }
            }
        }
    }

    async fn persist_then_mark(&self, record: &ListingRecord) -> Result<(), StoreError> {
        self.sink.upsert(record).await?;
        self.checkpoint.mark_done(record.id()).await
    }

    /// 重新计算主人汇总，写入汇总文件，并更新主人列发生变化的行
    async fn aggregate(
        &self,
        all: &[ListingRecord],
        previous: &BTreeMap<OwnerId, OwnerAggregate>,
        enrichment: &BTreeMap<OwnerId, OwnerProfile>,
    ) -> Result<(), StoreError> {
        let counts = recompute(all.iter().map(|r| &r.listing));
        let aggregates = merge_aggregates(&counts, previous, enrichment, Utc::now());
        self.sink.write_aggregates(&aggregates).await?;

        let changed: Vec<ListingRecord> = all
            .iter()
            .filter_map(|record| {
                let columns = match &record.listing.owner_id {
                    Some(owner) => aggregates
                        .get(owner)
                        .map(|a| OwnerColumns::new(Some(a.listing_count), a.enrichment.as_ref()))
                        .unwrap_or_default(),
                    None => OwnerColumns::default(),
                };
                (columns != record.owner).then(|| ListingRecord {
                    owner: columns,
                    ..record.clone()
                })
            })
            .collect();

        info!(owners = aggregates.len(), updated_rows = changed.len(), "Owner aggregates written");
        self.sink.upsert_many(&changed).await
    }

    /// 发布检查点；失败或超时只记录警告
    async fn publish(&self, run: &CrawlRun, final_flush: bool, limit: Duration) {
        let checkpoint = PublishCheckpoint {
            run_id: run.id,
            persisted: run.counters.processed_this_run,
            final_flush,
        };
        match tokio::time::timeout(limit, self.publisher.publish(&checkpoint)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(publisher = self.publisher.name(), error = %e, "Publish failed"),
            Err(_) => warn!(
                publisher = self.publisher.name(),
                timeout_secs = limit.as_secs(),
                "Publish timed out, continuing"
            ),
        }
    }
}

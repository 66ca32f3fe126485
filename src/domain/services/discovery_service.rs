// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::area::Cell;
use crate::domain::models::crawl_run::TimeWindow;
use crate::domain::models::listing::EntityId;
use crate::domain::models::search::{SearchParams, SearchQuery};
use crate::domain::services::field_extractor::DEFAULT_ID_PATHS;
use crate::sources::traits::ListingSource;
use crate::utils::pacer::Pacer;
use crate::utils::retry_policy::RetryPolicy;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ID提取器
///
/// 按优先级依次尝试每条策略路径，第一个得到非空值的策略胜出
#[derive(Debug, Clone)]
pub struct IdExtractor {
    strategies: Vec<String>,
}

impl Default for IdExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PATHS.iter().map(|p| (*p).to_string()).collect())
    }
}

impl IdExtractor {
    pub fn new(strategies: Vec<String>) -> Self {
        Self { strategies }
    }

    /// 从原始搜索结果中提取ID
    pub fn extract(&self, hit: &Value) -> Option<EntityId> {
        self.strategies
            .iter()
            .filter_map(|path| hit.pointer(path))
            .find_map(EntityId::from_json)
    }
}

/// 发现阶段的结果
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// 去重后的ID集合
    pub ids: BTreeSet<EntityId>,
    /// 收到的原始结果总数
    pub hits_seen: usize,
    /// 无法提取ID而被丢弃的结果数
    pub dropped_hits: usize,
    /// 重试耗尽、按零结果处理的单元
    pub failed_cells: Vec<String>,
    /// 成功获取的页数
    pub pages_fetched: usize,
}

/// 发现前沿
///
/// 依次搜索每个网格单元，提取ID并跨单元去重。
/// 单个单元失败只会造成覆盖缺口，不会中止整个运行。
pub struct DiscoveryFrontier<S: ListingSource + ?Sized> {
    source: Arc<S>,
    retry: RetryPolicy,
    pacer: Arc<Pacer>,
    extractor: IdExtractor,
    window: TimeWindow,
    params: SearchParams,
}

impl<S: ListingSource + ?Sized> DiscoveryFrontier<S> {
    pub fn new(
        source: Arc<S>,
        retry: RetryPolicy,
        pacer: Arc<Pacer>,
        extractor: IdExtractor,
        window: TimeWindow,
        params: SearchParams,
    ) -> Self {
        Self {
            source,
            retry,
            pacer,
            extractor,
            window,
            params,
        }
    }

    /// 搜索全部单元并返回去重后的ID集合
    ///
    /// 集合内容只由上游响应决定；相同的响应总是得到相同的集合
    pub async fn discover(&self, cells: &[Cell]) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for cell in cells {
            let before = report.ids.len();
            self.discover_cell(cell, &mut report).await;
            debug!(
                cell = %cell.name,
                new_ids = report.ids.len() - before,
                total_ids = report.ids.len(),
                "Cell searched"
            );
        }

        info!(
            cells = cells.len(),
            discovered = report.ids.len(),
            hits = report.hits_seen,
            dropped = report.dropped_hits,
            failed_cells = report.failed_cells.len(),
            "Discovery finished"
        );
        metrics::counter!("gridcrawl_discovery_hits_total").increment(report.hits_seen as u64);
        report
    }

    async fn discover_cell(&self, cell: &Cell, report: &mut DiscoveryReport) {
        let max_pages = self.params.max_pages.max(1);
        let mut query = SearchQuery {
            cell: cell.name.clone(),
            area: cell.bounds,
            window: self.window,
            params: self.params.clone(),
            cursor: None,
        };
        let mut pages = 0;

        loop {
            let result = self
                .retry
                .run(|| async {
                    self.pacer.wait().await;
                    self.source.search(&query).await
                })
                .await;

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    if pages == 0 {
                        warn!(cell = %cell.name, error = %e, "Cell search exhausted retries, treating as zero results");
                        report.failed_cells.push(cell.name.clone());
                    } else {
                        warn!(cell = %cell.name, page = pages + 1, error = %e, "Pagination stopped early");
                    }
                    return;
                }
            };

            pages += 1;
            report.pages_fetched += 1;
            report.hits_seen += page.hits.len();
            for hit in &page.hits {
                match self.extractor.extract(hit) {
                    Some(id) => {
                        report.ids.insert(id);
                    }
                    None => report.dropped_hits += 1,
                }
            }

            match page.next_cursor {
                Some(cursor) if pages < max_pages => query.cursor = Some(cursor),
                _ => return,
            }
        }
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::NaiveDate;
use gridcrawl::application::use_cases::crawl_use_case::{
    CrawlOptions, DelayOptions, RetryOptions,
};
use gridcrawl::domain::models::area::AreaBounds;
use gridcrawl::domain::models::crawl_run::TimeWindow;
use gridcrawl::domain::models::listing::{EntityId, ListingRecord};
use gridcrawl::domain::models::owner::{OwnerAggregate, OwnerId};
use gridcrawl::domain::models::search::{DetailParams, SearchPage, SearchQuery};
use gridcrawl::domain::repositories::checkpoint_repository::CheckpointStore;
use gridcrawl::domain::repositories::publisher::{PublishCheckpoint, PublishError, Publisher};
use gridcrawl::domain::repositories::result_sink::{ResultSink, StoreError};
use gridcrawl::sources::traits::{ListingSource, OwnerDirectory, SourceError};
use gridcrawl::utils::retry_policy::RetryPolicy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

pub fn id(raw: &str) -> EntityId {
    EntityId::parse(raw).unwrap()
}

/// 单位正方形区域，切成 2x2 网格
pub fn test_options() -> CrawlOptions {
    let window = TimeWindow::from_offset(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 30, 2);
    let mut options = CrawlOptions::new(
        AreaBounds {
            south: 0.0,
            west: 0.0,
            north: 1.0,
            east: 1.0,
        },
        window,
    );
    options.rows = 2;
    options.cols = 2;
    options.overlap = 0.1;
    options.current_year = 2025;
    options.delays = DelayOptions {
        search: Duration::ZERO,
        detail: Duration::ZERO,
        enrichment: Duration::ZERO,
    };
    let fast = RetryPolicy::new(3, Duration::from_millis(1));
    options.retry = RetryOptions {
        search: fast.clone(),
        detail: fast.clone(),
        enrichment: fast,
    };
    options
}

/// 按单元名称返回预设结果的数据源
#[derive(Default)]
pub struct FakeSource {
    pub cells: HashMap<String, Vec<Value>>,
    pub details: HashMap<String, Value>,
    pub failing_details: HashSet<String>,
    pub detail_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    /// 每个单元返回一组 `{"id": ..}` 结果
    pub fn with_cells(cells: &[(&str, &[&str])]) -> Self {
        let cells = cells
            .iter()
            .map(|(name, ids)| {
                let hits = ids.iter().map(|i| json!({ "id": i })).collect();
                (name.to_string(), hits)
            })
            .collect();
        Self {
            cells,
            ..Self::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.detail_calls.lock().clone()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        Ok(SearchPage::last(
            self.cells.get(&query.cell).cloned().unwrap_or_default(),
        ))
    }

    async fn fetch_detail(
        &self,
        id: &EntityId,
        _params: &DetailParams,
    ) -> Result<Value, SourceError> {
        self.detail_calls.lock().push(id.to_string());
        if self.failing_details.contains(id.as_str()) {
            return Err(SourceError::Transient("503".into()));
        }
        Ok(self.details.get(id.as_str()).cloned().unwrap_or_else(|| {
            json!({
                "listing": {
                    "name": format!("Listing {id}"),
                    "lat": 0.5,
                    "lng": 0.5,
                    "primary_host": {"id": format!("host-{id}")}
                }
            })
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl OwnerDirectory for FakeDirectory {
    async fn enrich_owner(&self, owner_id: &OwnerId) -> Result<Value, SourceError> {
        self.calls.lock().push(owner_id.to_string());
        Ok(json!({"first_name": format!("Owner {owner_id}"), "member_since": "2019-02-01"}))
    }

    async fn count_owner_listings(&self, _owner_id: &OwnerId) -> Result<u64, SourceError> {
        Ok(5)
    }
}

/// 内存检查点
#[derive(Default)]
pub struct MemoryCheckpoint {
    pub ids: Mutex<HashSet<EntityId>>,
}

impl MemoryCheckpoint {
    pub fn with(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|i| id(i)).collect()),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoint {
    async fn load(&self) -> Result<HashSet<EntityId>, StoreError> {
        Ok(self.ids.lock().clone())
    }

    async fn mark_done(&self, id: &EntityId) -> Result<(), StoreError> {
        self.ids.lock().insert(id.clone());
        Ok(())
    }

    async fn contains(&self, id: &EntityId) -> Result<bool, StoreError> {
        Ok(self.ids.lock().contains(id))
    }
}

/// 内存结果表，可以让指定ID的写入失败
#[derive(Default)]
pub struct MemorySink {
    pub rows: Mutex<Vec<ListingRecord>>,
    pub aggregates: Mutex<BTreeMap<OwnerId, OwnerAggregate>>,
    pub failing: Mutex<HashSet<String>>,
}

impl MemorySink {
    pub fn row(&self, raw: &str) -> Option<ListingRecord> {
        self.rows
            .lock()
            .iter()
            .find(|r| r.id().as_str() == raw)
            .cloned()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn load_all(&self) -> Result<Vec<ListingRecord>, StoreError> {
        Ok(self.rows.lock().clone())
    }

    async fn upsert(&self, record: &ListingRecord) -> Result<(), StoreError> {
        if self.failing.lock().contains(record.id().as_str()) {
            return Err(StoreError::Other("disk full".into()));
        }
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(())
    }

    async fn load_aggregates(&self) -> Result<BTreeMap<OwnerId, OwnerAggregate>, StoreError> {
        Ok(self.aggregates.lock().clone())
    }

    async fn write_aggregates(
        &self,
        aggregates: &BTreeMap<OwnerId, OwnerAggregate>,
    ) -> Result<(), StoreError> {
        *self.aggregates.lock() = aggregates.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<PublishCheckpoint>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, checkpoint: &PublishCheckpoint) -> Result<(), PublishError> {
        self.published.lock().push(checkpoint.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::area::Cell;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// 搜索时间窗口（入住/退房日期）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl TimeWindow {
    /// 以 `today + offset_days` 为入住日，住 `span_days` 晚
    pub fn from_offset(today: NaiveDate, offset_days: u32, span_days: u32) -> Self {
        let check_in = today + Duration::days(i64::from(offset_days));
        let check_out = check_in + Duration::days(i64::from(span_days.max(1)));
        Self {
            check_in,
            check_out,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// 爬取运行状态
///
/// 状态转换遵循以下流程：
/// Init → Discovering → FilteringAgainstCheckpoint → FetchingDetails →
/// [EnrichingOwners] → Aggregating → Persisted → Done
///
/// 配置错误直接进入 Failed；收到停止信号时以 Cancelled 结束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Init,
    Discovering,
    FilteringAgainstCheckpoint,
    FetchingDetails,
    EnrichingOwners,
    Aggregating,
    Persisted,
    Done,
    Failed,
    Cancelled,
}

impl RunState {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed | RunState::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            RunState::Init => "init",
            RunState::Discovering => "discovering",
            RunState::FilteringAgainstCheckpoint => "filtering_against_checkpoint",
            RunState::FetchingDetails => "fetching_details",
            RunState::EnrichingOwners => "enriching_owners",
            RunState::Aggregating => "aggregating",
            RunState::Persisted => "persisted",
            RunState::Done => "done",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 运行计数器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// 去重后发现的房源数
    pub discovered: usize,
    /// 检查点中已处理过的房源数
    pub already_processed: usize,
    /// 本次运行成功持久化的房源数
    pub processed_this_run: usize,
    /// 详情抓取或持久化失败的房源数
    pub failed: usize,
    /// 地理围栏之外被有意跳过的房源数
    pub skipped_out_of_scope: usize,
    /// 因单次运行上限而推迟到下次的房源数
    pub deferred: usize,
    /// 无法提取ID而被丢弃的搜索结果数
    pub dropped_hits: usize,
    /// 重试耗尽的网格单元数
    pub failed_cells: usize,
    /// 成功补全的主人数
    pub enriched_owners: usize,
    /// 补全失败的主人数
    pub enrichment_failures: usize,
}

/// 一次爬取运行
///
/// 短暂存在，只代表一次调用
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub id: Uuid,
    pub cells: Vec<Cell>,
    pub window: TimeWindow,
    pub state: RunState,
    pub counters: RunCounters,
    pub started_at: DateTime<Utc>,
}

impl CrawlRun {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            id: Uuid::new_v4(),
            cells: Vec::new(),
            window,
            state: RunState::Init,
            counters: RunCounters::default(),
            started_at: Utc::now(),
        }
    }

    /// 切换到下一个状态并记录日志
    pub fn transition(&mut self, next: RunState) {
        info!(run_id = %self.id, from = %self.state, to = %next, "Run state transition");
        self.state = next;
    }

    /// 生成运行摘要
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.id,
            state: self.state,
            counters: self.counters.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// 运行摘要
///
/// 无论中途发生多少局部失败，每次运行都以该摘要结束
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub counters: RunCounters,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = &self.counters;
        write!(
            f,
            "run {} {}: discovered={} already_processed={} processed_this_run={} failed={} skipped_out_of_scope={} deferred={} enriched_owners={}",
            self.run_id,
            self.state,
            c.discovered,
            c.already_processed,
            c.processed_this_run,
            c.failed,
            c.skipped_out_of_scope,
            c.deferred,
            c.enriched_owners
        )
    }
}

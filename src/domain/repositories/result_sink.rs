// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingRecord;
use crate::domain::models::owner::{OwnerAggregate, OwnerId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 结果存储特质
///
/// 追加写入的房源表 + 可重写的"最新汇总"视图。
/// 按ID幂等更新：同一ID永远只对应一行。
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 读取全部已持久化的记录（历史 + 本次）
    async fn load_all(&self) -> Result<Vec<ListingRecord>, StoreError>;

    /// 插入或更新单条记录，返回前必须已经落盘
    async fn upsert(&self, record: &ListingRecord) -> Result<(), StoreError>;

    /// 批量插入或更新
    async fn upsert_many(&self, records: &[ListingRecord]) -> Result<(), StoreError> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    /// 读取上次写入的主人汇总
    async fn load_aggregates(&self) -> Result<BTreeMap<OwnerId, OwnerAggregate>, StoreError>;

    /// 整体替换主人汇总
    async fn write_aggregates(
        &self,
        aggregates: &BTreeMap<OwnerId, OwnerAggregate>,
    ) -> Result<(), StoreError>;
}

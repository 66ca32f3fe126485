// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::EntityId;
use crate::domain::models::owner::OwnerId;
use crate::domain::models::search::{DetailParams, SearchPage, SearchQuery};
use crate::utils::retry_policy::Retryable;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 数据源错误类型
#[derive(Error, Debug)]
pub enum SourceError {
    /// 网络、限流或服务端错误
    #[error("Transient error: {0}")]
    Transient(String),
    /// 请求被拒绝
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    /// 响应无法解析
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl Retryable for SourceError {
    /// 判断错误是否可重试
    ///
    /// 只有在启用错误分类时才会被读取；默认所有错误都会重试
    fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transient(_) => true,
            SourceError::Rejected { status, .. } => *status == 408 || *status == 429,
            SourceError::Malformed(_) => false,
        }
    }
}

/// 房源数据源特质
///
/// 远程数据源只被建模为两个不透明的操作，都可能暂时失败
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// 在一个区域内搜索，结果可能被截断
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError>;

    /// 获取单个房源的原始详情
    async fn fetch_detail(&self, id: &EntityId, params: &DetailParams)
        -> Result<Value, SourceError>;

    /// 数据源名称
    fn name(&self) -> &'static str;
}

/// 主人目录特质
///
/// 仅由补全调度器使用的可选协作者
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// 获取主人的原始资料
    async fn enrich_owner(&self, owner_id: &OwnerId) -> Result<Value, SourceError>;

    /// 统计主人在远程源上的房源总数
    async fn count_owner_listings(&self, owner_id: &OwnerId) -> Result<u64, SourceError>;
}

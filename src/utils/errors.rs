// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::result_sink::StoreError;
use thiserror::Error;

/// 配置错误类型
///
/// 在任何工作开始之前检测到，对本次运行是致命的
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("无效区域: {0}")]
    InvalidArea(String),

    #[error("无效网格: {0}")]
    InvalidGrid(String),

    #[error("无效预算: {0}")]
    InvalidBudget(String),

    #[error("无效参数: {0}")]
    InvalidParameter(String),

    #[error("配置加载失败: {0}")]
    Load(#[from] config::ConfigError),

    #[error("配置校验失败: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// 运行级错误类型
///
/// 只有配置错误和持久层错误会传播到运行的终止状态
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("持久化错误: {0}")]
    Persistence(#[from] StoreError),
}

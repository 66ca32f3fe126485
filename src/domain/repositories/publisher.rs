// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// 发布错误类型
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Publish command exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },
}

/// 发布检查点的内容
#[derive(Debug, Clone, Serialize)]
pub struct PublishCheckpoint {
    pub run_id: Uuid,
    /// 本次运行到目前为止持久化的记录数
    pub persisted: usize,
    /// 是否为运行结束时的最终发布
    pub final_flush: bool,
}

/// 发布协作者特质
///
/// 每持久化N条记录后把状态推送到外部存储（例如远程提交）。
/// 失败只记录日志，不阻塞后续处理。
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, checkpoint: &PublishCheckpoint) -> Result<(), PublishError>;

    fn name(&self) -> &'static str;
}

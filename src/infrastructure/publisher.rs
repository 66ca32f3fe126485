// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::publisher::{PublishCheckpoint, PublishError, Publisher};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// 不做任何事的发布者
#[derive(Debug, Default, Clone)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, checkpoint: &PublishCheckpoint) -> Result<(), PublishError> {
        debug!(persisted = checkpoint.persisted, "Publish skipped (noop)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// 运行外部命令的发布者
///
/// 命令在数据目录中执行，例如一个负责提交并推送结果文件的脚本。
/// 运行信息通过环境变量 `GRIDCRAWL_RUN_ID`、`GRIDCRAWL_PERSISTED`
/// 和 `GRIDCRAWL_FINAL` 传给命令。
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandPublisher {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(&self, checkpoint: &PublishCheckpoint) -> Result<(), PublishError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env("GRIDCRAWL_RUN_ID", checkpoint.run_id.to_string())
            .env("GRIDCRAWL_PERSISTED", checkpoint.persisted.to_string())
            .env("GRIDCRAWL_FINAL", checkpoint.final_flush.to_string())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(PublishError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            program = %self.program,
            persisted = checkpoint.persisted,
            final_flush = checkpoint.final_flush,
            "Published checkpoint"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

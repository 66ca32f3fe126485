// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 本地文件存储
///
/// 检查点和结果表都存放在数据目录下：
/// - `processed_ids.txt`：每行一个已处理的ID
/// - `listings.jsonl`：每行一条固定列的房源记录
/// - `owners.json`：最新的主人汇总，整体原子替换
pub mod file_checkpoint;
pub mod file_sink;

pub use file_checkpoint::FileCheckpointStore;
pub use file_sink::FileResultSink;

use crate::domain::repositories::result_sink::StoreError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const CHECKPOINT_FILE: &str = "processed_ids.txt";
pub const LISTINGS_FILE: &str = "listings.jsonl";
pub const OWNERS_FILE: &str = "owners.json";

/// 读取文件内容，文件不存在时返回 `None`
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// 确保父目录存在
pub(crate) async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// 原子替换文件：先写临时文件并落盘，再重命名覆盖
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    ensure_parent(path).await?;
    let tmp = temp_path(path);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

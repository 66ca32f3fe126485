// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{ensure_parent, read_optional};
use crate::domain::models::listing::EntityId;
use crate::domain::repositories::checkpoint_repository::CheckpointStore;
use crate::domain::repositories::result_sink::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct CheckpointState {
    file: File,
    ids: HashSet<EntityId>,
}

/// 基于追加文件的检查点存储
///
/// 每个ID写成一行并在返回前 `sync_data`。
/// 进程在写入中途崩溃留下的半行会在下次打开时截掉。
pub struct FileCheckpointStore {
    path: PathBuf,
    state: Mutex<CheckpointState>,
}

impl FileCheckpointStore {
    /// 打开（必要时创建）检查点文件
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path).await?;

        let mut ids = HashSet::new();
        if let Some(data) = read_optional(&path).await? {
            let complete = match data.iter().rposition(|b| *b == b'\n') {
                Some(pos) => pos + 1,
                None => 0,
            };
            if complete < data.len() {
                warn!(
                    path = %path.display(),
                    torn_bytes = data.len() - complete,
                    "Discarding incomplete checkpoint line"
                );
                let file = OpenOptions::new().write(true).open(&path).await?;
                file.set_len(complete as u64).await?;
                file.sync_all().await?;
            }

            for line in String::from_utf8_lossy(&data[..complete]).lines() {
                match EntityId::parse(line) {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(line, "Skipping invalid checkpoint entry"),
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), processed = ids.len(), "Checkpoint opened");

        Ok(Self {
            path,
            state: Mutex::new(CheckpointState { file, ids }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<HashSet<EntityId>, StoreError> {
        Ok(self.state.lock().await.ids.clone())
    }

    async fn mark_done(&self, id: &EntityId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.ids.contains(id) {
            return Ok(());
        }

        let line = format!("{id}\n");
        state.file.write_all(line.as_bytes()).await?;
        state.file.flush().await?;
        state.file.sync_data().await?;
        state.ids.insert(id.clone());
        Ok(())
    }

    async fn contains(&self, id: &EntityId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.ids.contains(id))
    }
}

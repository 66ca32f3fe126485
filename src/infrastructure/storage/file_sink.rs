// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{ensure_parent, read_optional, write_atomic, LISTINGS_FILE, OWNERS_FILE};
use crate::domain::models::listing::{EntityId, ListingRecord};
use crate::domain::models::owner::{OwnerAggregate, OwnerId};
use crate::domain::repositories::result_sink::{ResultSink, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 内存中的行和 ID → 行号索引
#[derive(Debug, Clone, Default)]
struct RowTable {
    rows: Vec<ListingRecord>,
    index: HashMap<EntityId, usize>,
}

impl RowTable {
    /// 插入或替换，返回是否替换了已有行
    fn apply(&mut self, record: &ListingRecord) -> bool {
        match self.index.get(record.id()) {
            Some(&pos) => {
                self.rows[pos] = record.clone();
                true
            }
            None => {
                self.index.insert(record.id().clone(), self.rows.len());
                self.rows.push(record.clone());
                false
            }
        }
    }
}

struct SinkState {
    file: File,
    table: RowTable,
}

/// JSON Lines 结果表
///
/// 新ID直接追加一行；已有ID的更新会整体重写文件（临时文件 + 重命名），
/// 因此文件中同一ID始终只有一行。
/// 内存状态只在写入落盘之后更新，写入失败时文件回退到写入前的长度
pub struct FileResultSink {
    listings_path: PathBuf,
    owners_path: PathBuf,
    state: Mutex<SinkState>,
}

impl FileResultSink {
    /// 在数据目录下打开结果表
    ///
    /// 读取已有记录时按"后出现者为准"合并重复行，跳过无法解析的行；
    /// 如果存在重复或损坏的行，则立即压缩重写
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        let listings_path = data_dir.join(LISTINGS_FILE);
        let owners_path = data_dir.join(OWNERS_FILE);
        ensure_parent(&listings_path).await?;

        let mut table = RowTable::default();
        let mut needs_compaction = false;

        if let Some(data) = read_optional(&listings_path).await? {
            if !data.is_empty() && data.last() != Some(&b'\n') {
                needs_compaction = true;
            }
            for (line_no, line) in String::from_utf8_lossy(&data).lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ListingRecord>(line) {
                    Ok(record) => {
                        if table.apply(&record) {
                            needs_compaction = true;
                        }
                    }
                    Err(e) => {
                        warn!(line = line_no + 1, error = %e, "Skipping unreadable listing row");
                        needs_compaction = true;
                    }
                }
            }
        }

        if needs_compaction {
            info!(path = %listings_path.display(), rows = table.rows.len(), "Compacting listings file");
            write_atomic(&listings_path, &encode_rows(&table.rows)?).await?;
        }

        let file = open_append(&listings_path).await?;
        debug!(path = %listings_path.display(), rows = table.rows.len(), "Result sink opened");

        Ok(Self {
            listings_path,
            owners_path,
            state: Mutex::new(SinkState { file, table }),
        })
    }

    pub fn listings_path(&self) -> &Path {
        &self.listings_path
    }

    pub fn owners_path(&self) -> &Path {
        &self.owners_path
    }

    /// 整体重写文件，成功后才替换内存状态
    async fn rewrite(&self, state: &mut SinkState, staged: RowTable) -> Result<(), StoreError> {
        write_atomic(&self.listings_path, &encode_rows(&staged.rows)?).await?;
        state.table = staged;
        // The old handle points at the replaced inode
        state.file = open_append(&self.listings_path).await?;
        Ok(())
    }

    /// 追加失败后截掉可能写入的半行，并重新打开追加句柄
    async fn rollback_append(&self, state: &mut SinkState, len: u64) {
        let result = async {
            let file = OpenOptions::new().write(true).open(&self.listings_path).await?;
            file.set_len(len).await?;
            file.sync_data().await?;
            state.file = open_append(&self.listings_path).await?;
            Ok::<(), StoreError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(path = %self.listings_path.display(), error = %e, "Failed to roll back partial append");
        }
    }
}

async fn append_durably(file: &mut File, buf: &[u8]) -> Result<(), StoreError> {
    file.write_all(buf).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

async fn open_append(path: &Path) -> Result<File, StoreError> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

fn encode_rows<'a, I>(rows: I) -> Result<Vec<u8>, StoreError>
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut buf = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut buf, row)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn load_all(&self) -> Result<Vec<ListingRecord>, StoreError> {
        Ok(self.state.lock().await.table.rows.clone())
    }

    async fn upsert(&self, record: &ListingRecord) -> Result<(), StoreError> {
        self.upsert_many(std::slice::from_ref(record)).await
    }

    async fn upsert_many(&self, records: &[ListingRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;

        let mut batch_ids = HashSet::new();
        let replaces = records
            .iter()
            .any(|r| state.table.index.contains_key(r.id()) || !batch_ids.insert(r.id()));

        if replaces {
            let mut staged = state.table.clone();
            for record in records {
                staged.apply(record);
            }
            return self.rewrite(&mut state, staged).await;
        }

        let buf = encode_rows(records)?;
        let len = tokio::fs::metadata(&self.listings_path).await?.len();
        if let Err(e) = append_durably(&mut state.file, &buf).await {
            self.rollback_append(&mut state, len).await;
            return Err(e);
        }
        for record in records {
            state.table.apply(record);
        }
        Ok(())
    }

    async fn load_aggregates(&self) -> Result<BTreeMap<OwnerId, OwnerAggregate>, StoreError> {
        let Some(data) = read_optional(&self.owners_path).await? else {
            return Ok(BTreeMap::new());
        };
        let aggregates: Vec<OwnerAggregate> = serde_json::from_slice(&data)?;
        Ok(aggregates
            .into_iter()
            .map(|a| (a.owner_id.clone(), a))
            .collect())
    }

    async fn write_aggregates(
        &self,
        aggregates: &BTreeMap<OwnerId, OwnerAggregate>,
    ) -> Result<(), StoreError> {
        let rows: Vec<&OwnerAggregate> = aggregates.values().collect();
        let data = serde_json::to_vec_pretty(&rows)?;
        write_atomic(&self.owners_path, &data).await
    }
}

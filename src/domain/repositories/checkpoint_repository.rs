// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::EntityId;
use crate::domain::repositories::result_sink::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};

/// 检查点存储特质
///
/// 记录已经完整处理过的房源ID，保证进程重启后可以继续而不重复处理。
/// `mark_done` 返回后，即使进程立刻终止也不能丢失该标记。
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取全部已处理的ID
    async fn load(&self) -> Result<HashSet<EntityId>, StoreError>;

    /// 标记ID已处理，只能在其记录持久化之后调用
    async fn mark_done(&self, id: &EntityId) -> Result<(), StoreError>;

    /// 检查ID是否已处理
    async fn contains(&self, id: &EntityId) -> Result<bool, StoreError>;
}

/// 本次运行的工作列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    /// 待处理的ID，顺序与发现集合一致
    pub remaining: Vec<EntityId>,
    /// 已在检查点中的ID数量
    pub already_processed: usize,
    /// 超出单次上限、留给后续运行的ID数量
    pub deferred: usize,
}

/// 计算 `discovered − checkpoint`，并按单次运行上限截断
pub fn filter_remaining(
    discovered: &BTreeSet<EntityId>,
    done: &HashSet<EntityId>,
    cap: Option<usize>,
) -> WorkList {
    let mut remaining: Vec<EntityId> = Vec::new();
    let mut already_processed = 0;

    for id in discovered {
        if done.contains(id) {
            already_processed += 1;
        } else {
            remaining.push(id.clone());
        }
    }

    let mut deferred = 0;
    if let Some(cap) = cap {
        if remaining.len() > cap {
            deferred = remaining.len() - cap;
            remaining.truncate(cap);
        }
    }

    WorkList {
        remaining,
        already_processed,
        deferred,
    }
}

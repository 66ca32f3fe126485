// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::{EntityId, Listing};
use crate::domain::models::owner::{OwnerAggregate, OwnerId, OwnerProfile};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// 统计每个主人的不同房源数量
///
/// 同一房源ID出现多次时，以后出现的记录为准（主人变更会转移计数）。
/// 对相同输入重复计算得到相同结果。
pub fn recompute<'a, I>(listings: I) -> BTreeMap<OwnerId, u64>
where
    I: IntoIterator<Item = &'a Listing>,
{
    let mut latest: HashMap<&EntityId, Option<&OwnerId>> = HashMap::new();
    for listing in listings {
        latest.insert(&listing.id, listing.owner_id.as_ref());
    }

    let mut counts = BTreeMap::new();
    for owner in latest.into_values().flatten() {
        *counts.entry(owner.clone()).or_insert(0) += 1;
    }
    counts
}

/// 合并本次计数与历史汇总
///
/// 保留之前持久化的补全信息，再用本次运行的补全结果覆盖。
/// 本次计数中不存在的主人不会出现在结果中。
pub fn merge_aggregates(
    counts: &BTreeMap<OwnerId, u64>,
    previous: &BTreeMap<OwnerId, OwnerAggregate>,
    enrichment: &BTreeMap<OwnerId, OwnerProfile>,
    now: DateTime<Utc>,
) -> BTreeMap<OwnerId, OwnerAggregate> {
    counts
        .iter()
        .map(|(owner_id, count)| {
            let mut aggregate = OwnerAggregate::new(owner_id.clone(), *count);
            if let Some(prev) = previous.get(owner_id) {
                aggregate.enrichment = prev.enrichment.clone();
                aggregate.enriched_at = prev.enriched_at;
            }
            if let Some(profile) = enrichment.get(owner_id) {
                aggregate.enrichment = Some(profile.clone());
                aggregate.enriched_at = Some(now);
            }
            (owner_id.clone(), aggregate)
        })
        .collect()
}

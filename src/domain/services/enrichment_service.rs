// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::Listing;
use crate::domain::models::owner::{OwnerId, OwnerProfile};
use crate::domain::services::field_extractor::{FieldTable, ProfileField};
use crate::sources::traits::OwnerDirectory;
use crate::utils::pacer::Pacer;
use crate::utils::retry_policy::RetryPolicy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 选出需要补全的主人
///
/// 排序规则依次为：
/// 1. 在当前集合中拥有至少两个房源的主人
/// 2. 拥有带标记房源的主人
/// 3. 其余主人随机抽样
///
/// 同一层内按首次出现顺序排列。已有补全信息的主人在未强制刷新时被排除。
/// 结果最多 `budget` 个。
pub fn select_for_enrichment<'a, I, R>(
    listings: I,
    budget: usize,
    already_enriched: &HashSet<OwnerId>,
    force: bool,
    rng: &mut R,
) -> Vec<OwnerId>
where
    I: IntoIterator<Item = &'a Listing>,
    R: Rng + ?Sized,
{
    if budget == 0 {
        return Vec::new();
    }

    let mut order: Vec<OwnerId> = Vec::new();
    let mut stats: HashMap<OwnerId, (usize, bool)> = HashMap::new();
    for listing in listings {
        let Some(owner) = &listing.owner_id else {
            continue;
        };
        let entry = stats.entry(owner.clone()).or_insert_with(|| {
            order.push(owner.clone());
            (0, false)
        });
        entry.0 += 1;
        entry.1 |= listing.is_flagged();
    }

    let mut multi = Vec::new();
    let mut flagged = Vec::new();
    let mut rest = Vec::new();
    for owner in order {
        if !force && already_enriched.contains(&owner) {
            continue;
        }
        match stats.get(&owner) {
            Some((count, _)) if *count >= 2 => multi.push(owner),
            Some((_, true)) => flagged.push(owner),
            _ => rest.push(owner),
        }
    }
    rest.shuffle(rng);

    multi
        .into_iter()
        .chain(flagged)
        .chain(rest)
        .take(budget)
        .collect()
}

/// 主人补全调度器
///
/// 每次运行创建一个实例，内部缓存只在本次运行内有效；
/// 跨运行的缓存是持久化的主人汇总文件
pub struct EnrichmentScheduler {
    directory: Arc<dyn OwnerDirectory>,
    retry: RetryPolicy,
    pacer: Arc<Pacer>,
    table: FieldTable<ProfileField>,
    count_listings: bool,
    current_year: i32,
    cache: HashMap<OwnerId, Option<OwnerProfile>>,
    failures: usize,
}

impl EnrichmentScheduler {
    /// 创建调度器
    ///
    /// # 参数
    ///
    /// * `directory` - 主人目录
    /// * `retry` - 补全调用的重试策略
    /// * `pacer` - 补全调用的节拍器
    /// * `count_listings` - 是否额外调用房源计数接口
    /// * `current_year` - 用于计算活跃年数的当前年份
    pub fn new(
        directory: Arc<dyn OwnerDirectory>,
        retry: RetryPolicy,
        pacer: Arc<Pacer>,
        count_listings: bool,
        current_year: i32,
    ) -> Self {
        Self {
            directory,
            retry,
            pacer,
            table: FieldTable::default(),
            count_listings,
            current_year,
            cache: HashMap::new(),
            failures: 0,
        }
    }

    /// 失败的补全调用次数
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// 补全单个主人
    ///
    /// 先查运行内缓存，失败只记录日志并返回 `None`
    pub async fn enrich(&mut self, owner_id: &OwnerId) -> Option<OwnerProfile> {
        if let Some(cached) = self.cache.get(owner_id) {
            debug!(owner_id = %owner_id, "Owner served from cache");
            return cached.clone();
        }

        let profile = self.fetch_profile(owner_id).await;
        self.cache.insert(owner_id.clone(), profile.clone());
        profile
    }

    /// 依次补全选中的主人，返回成功的结果
    pub async fn enrich_selected(&mut self, owners: &[OwnerId]) -> BTreeMap<OwnerId, OwnerProfile> {
        let mut enriched = BTreeMap::new();
        for owner_id in owners {
            if let Some(profile) = self.enrich(owner_id).await {
                enriched.insert(owner_id.clone(), profile);
            }
        }

        info!(
            selected = owners.len(),
            enriched = enriched.len(),
            failures = self.failures,
            "Owner enrichment finished"
        );
        metrics::counter!("gridcrawl_enriched_owners_total").increment(enriched.len() as u64);
        enriched
    }

    async fn fetch_profile(&mut self, owner_id: &OwnerId) -> Option<OwnerProfile> {
        let directory = &self.directory;
        let pacer = &self.pacer;

        let raw = match self
            .retry
            .run(|| async move {
                pacer.wait().await;
                directory.enrich_owner(owner_id).await
            })
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Owner enrichment failed");
                self.failures += 1;
                return None;
            }
        };

        let mut profile = self.map_profile(&raw);

        if self.count_listings {
            let counted = self
                .retry
                .run(|| async move {
                    pacer.wait().await;
                    directory.count_owner_listings(owner_id).await
                })
                .await;
            match counted {
                Ok(total) => profile.total_listings = Some(total),
                Err(e) => {
                    warn!(owner_id = %owner_id, error = %e, "Owner listing count failed");
                    self.failures += 1;
                }
            }
        }

        Some(profile)
    }

    fn map_profile(&self, raw: &Value) -> OwnerProfile {
        let t = &self.table;
        let joined = t.text(raw, ProfileField::Joined);
        OwnerProfile {
            name: t.text(raw, ProfileField::Name),
            rating: t.number(raw, ProfileField::Rating),
            review_count: t.count(raw, ProfileField::ReviewCount),
            total_listings: t.count(raw, ProfileField::TotalListings),
            ..OwnerProfile::default()
        }
        .with_joined(joined.as_deref(), self.current_year)
    }
}

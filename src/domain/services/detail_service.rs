// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::area::Area;
use crate::domain::models::listing::{EntityId, Listing};
use crate::domain::models::owner::OwnerId;
use crate::domain::models::search::DetailParams;
use crate::domain::services::field_extractor::{FieldTable, ListingField};
use crate::sources::traits::{ListingSource, SourceError};
use crate::utils::pacer::Pacer;
use crate::utils::retry_policy::{RetryError, RetryPolicy};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// 默认的登记编号匹配模式
///
/// 只有关键词不区分大小写；编号由大写字母、数字、`-`、`/` 组成且至少含一位数字，
/// 因此 "license holder" 这类普通单词不会被当成编号
pub const DEFAULT_REGISTRATION_PATTERN: &str =
    r"\b(?i:licen[cs]e|permit|registration)(?:\s+(?i:number|no\.?|code))?\s*[:#]?\s*([A-Z0-9\-/]*\d[A-Z0-9\-/]*)";

/// 详情阶段的错误：重试耗尽后的数据源错误
pub type DetailError = RetryError<SourceError>;

/// 默认的地理围栏余量（度）
pub const DEFAULT_GEOFENCE_MARGIN: f64 = 0.01;

/// 详情阶段的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    /// 标准化后的房源
    Listing(Box<Listing>),
    /// 坐标在目标区域之外，有意跳过
    OutOfScope { latitude: f64, longitude: f64 },
}

/// 派生URL的前缀
#[derive(Debug, Clone, Default)]
pub struct UrlTemplates {
    pub listing_base: Option<String>,
    pub owner_base: Option<String>,
}

/// 房源标准化器
///
/// 纯函数部分：字段表映射、登记编号提取和地理围栏
#[derive(Debug, Clone)]
pub struct ListingNormalizer {
    table: FieldTable<ListingField>,
    registration: Option<Regex>,
    geofence: Area,
    urls: UrlTemplates,
}

impl ListingNormalizer {
    /// 创建标准化器
    ///
    /// # 参数
    ///
    /// * `target` - 原始目标区域
    /// * `margin` - 地理围栏余量
    /// * `registration` - 登记编号正则，`None` 表示不从文本中提取
    /// * `urls` - 派生URL前缀
    pub fn new(target: &Area, margin: f64, registration: Option<Regex>, urls: UrlTemplates) -> Self {
        Self {
            table: FieldTable::default(),
            registration,
            geofence: target.expand(margin),
            urls,
        }
    }

    /// 替换字段表
    pub fn with_table(mut self, table: FieldTable<ListingField>) -> Self {
        self.table = table;
        self
    }

    /// 把原始详情映射为房源
    pub fn normalize(&self, id: &EntityId, raw: &Value) -> DetailOutcome {
        let t = &self.table;
        let latitude = t.number(raw, ListingField::Latitude);
        let longitude = t.number(raw, ListingField::Longitude);

        if let (Some(lat), Some(lng)) = (latitude, longitude) {
            if !self.geofence.contains(lat, lng) {
                return DetailOutcome::OutOfScope {
                    latitude: lat,
                    longitude: lng,
                };
            }
        }

        let title = t.text(raw, ListingField::Title);
        let description = t.text(raw, ListingField::Description);
        let owner_id = t.typed(raw, ListingField::OwnerId, OwnerId::from_json);
        let registration_code = t
            .text(raw, ListingField::Registration)
            .or_else(|| self.match_registration(description.as_deref()))
            .or_else(|| self.match_registration(title.as_deref()));

        let mut listing = Listing::empty(id.clone());
        listing.listing_url = self.urls.listing_base.as_ref().map(|base| join_url(base, id.as_str()));
        listing.owner_url = match (&self.urls.owner_base, &owner_id) {
            (Some(base), Some(owner)) => Some(join_url(base, owner.as_str())),
            _ => None,
        };
        listing.title = title;
        listing.description = description;
        listing.owner_id = owner_id;
        listing.owner_name = t.text(raw, ListingField::OwnerName);
        listing.is_flagged_owner = t.flag(raw, ListingField::FlaggedOwner);
        listing.registration_code = registration_code;
        listing.rating = t.number(raw, ListingField::Rating);
        listing.review_count = t.count(raw, ListingField::ReviewCount);
        listing.latitude = latitude;
        listing.longitude = longitude;
        listing.property_type = t.text(raw, ListingField::PropertyType);
        listing.room_type = t.text(raw, ListingField::RoomType);
        listing.bedrooms = t.number(raw, ListingField::Bedrooms);
        listing.bathrooms = t.number(raw, ListingField::Bathrooms);
        listing.price_per_night = t.number(raw, ListingField::PricePerNight);
        listing.city = t.text(raw, ListingField::City);
        listing.neighborhood = t.text(raw, ListingField::Neighborhood);

        DetailOutcome::Listing(Box::new(listing))
    }

    fn match_registration(&self, text: Option<&str>) -> Option<String> {
        let pattern = self.registration.as_ref()?;
        let caps = pattern.captures(text?)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim().to_string())
            .filter(|code| !code.is_empty())
    }
}

fn join_url(base: &str, segment: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), segment)
}

/// 详情抓取阶段
///
/// 在重试执行器下调用 FetchDetail，并在每次调用之间保持固定间隔
pub struct DetailFetchStage<S: ListingSource + ?Sized> {
    source: Arc<S>,
    retry: RetryPolicy,
    pacer: Arc<Pacer>,
    params: DetailParams,
    normalizer: ListingNormalizer,
}

impl<S: ListingSource + ?Sized> DetailFetchStage<S> {
    pub fn new(
        source: Arc<S>,
        retry: RetryPolicy,
        pacer: Arc<Pacer>,
        params: DetailParams,
        normalizer: ListingNormalizer,
    ) -> Self {
        Self {
            source,
            retry,
            pacer,
            params,
            normalizer,
        }
    }

    /// 抓取并标准化单个房源
    ///
    /// # 返回值
    ///
    /// * `Ok(DetailOutcome)` - 房源或"超出范围"标记
    /// * `Err(DetailError)` - 重试耗尽
    pub async fn fetch_and_normalize(
        &self,
        id: &EntityId,
    ) -> Result<DetailOutcome, DetailError> {
        let raw = self
            .retry
            .run(|| async {
                self.pacer.wait().await;
                self.source.fetch_detail(id, &self.params).await
            })
            .await?;

        let outcome = self.normalizer.normalize(id, &raw);
        if let DetailOutcome::OutOfScope {
            latitude,
            longitude,
        } = &outcome
        {
            debug!(id = %id, latitude, longitude, "Listing outside target area");
        }
        Ok(outcome)
    }
}

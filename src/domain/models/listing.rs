// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::owner::{OwnerId, OwnerProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 房源唯一标识
///
/// 不变式：去除首尾空白后非空，且不含控制字符。
/// 同一实体在多次发现中得到相同的标识；JSON数字按十进制字符串表示。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// 从字符串解析标识，空值或包含控制字符时返回 `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// 从JSON值提取标识，支持字符串和整数
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else {
                    // Fractional ids are not stable identifiers
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EntityId::parse(&value).ok_or_else(|| format!("invalid entity id: {value:?}"))
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 标准化的房源记录
///
/// 远程数据结构在不同查询间并不一致，因此除ID外的字段都可能缺失
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: EntityId,
    pub title: Option<String>,
    /// 仅用于提取登记编号，不写入结果表
    #[serde(skip)]
    pub description: Option<String>,
    pub owner_id: Option<OwnerId>,
    pub owner_name: Option<String>,
    pub is_flagged_owner: Option<bool>,
    pub registration_code: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub property_type: Option<String>,
    pub room_type: Option<String>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub price_per_night: Option<f64>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub listing_url: Option<String>,
    pub owner_url: Option<String>,
}

impl Listing {
    /// 创建只有ID的空记录
    pub fn empty(id: EntityId) -> Self {
        Self {
            id,
            title: None,
            description: None,
            owner_id: None,
            owner_name: None,
            is_flagged_owner: None,
            registration_code: None,
            rating: None,
            review_count: None,
            latitude: None,
            longitude: None,
            property_type: None,
            room_type: None,
            bedrooms: None,
            bathrooms: None,
            price_per_night: None,
            city: None,
            neighborhood: None,
            listing_url: None,
            owner_url: None,
        }
    }

    /// 房源是否带有"标记"属性（如超赞房东）
    pub fn is_flagged(&self) -> bool {
        self.is_flagged_owner.unwrap_or(false)
    }
}

/// 主人相关列
///
/// 结果表中可选的主人汇总和补全字段，未补全时为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerColumns {
    /// 全量数据集中该主人的房源数
    pub owner_listing_count: Option<u64>,
    pub host_name: Option<String>,
    pub host_rating: Option<f64>,
    pub host_review_count: Option<u64>,
    pub host_joined_year: Option<i32>,
    pub host_years_active: Option<u32>,
    pub host_total_listings: Option<u64>,
}

impl OwnerColumns {
    /// 由汇总数量和补全结果构建
    pub fn new(listing_count: Option<u64>, profile: Option<&OwnerProfile>) -> Self {
        Self {
            owner_listing_count: listing_count,
            host_name: profile.and_then(|p| p.name.clone()),
            host_rating: profile.and_then(|p| p.rating),
            host_review_count: profile.and_then(|p| p.review_count),
            host_joined_year: profile.and_then(|p| p.joined_year),
            host_years_active: profile.and_then(|p| p.years_active),
            host_total_listings: profile.and_then(|p| p.total_listings),
        }
    }
}

/// 结果表中的一行
///
/// 固定列集合：房源字段 + 主人列 + 抓取时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    pub owner: OwnerColumns,
    pub fetched_at: DateTime<Utc>,
}

impl ListingRecord {
    pub fn new(listing: Listing, fetched_at: DateTime<Utc>) -> Self {
        Self {
            listing,
            owner: OwnerColumns::default(),
            fetched_at,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.listing.id
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;
use std::collections::HashMap;

/// 逻辑字段
///
/// 每个字段对应一组按优先级排列的JSON指针候选路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingField {
    Title,
    Description,
    OwnerId,
    OwnerName,
    FlaggedOwner,
    Rating,
    ReviewCount,
    Latitude,
    Longitude,
    Registration,
    PropertyType,
    RoomType,
    Bedrooms,
    Bathrooms,
    PricePerNight,
    City,
    Neighborhood,
}

/// 主人资料字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Name,
    Rating,
    ReviewCount,
    Joined,
    TotalListings,
}

const LISTING_PATHS: &[(ListingField, &[&str])] = &[
    (
        ListingField::Title,
        &["/listing/name", "/name", "/title", "/pdp_listing_detail/name"],
    ),
    (
        ListingField::Description,
        &[
            "/listing/description",
            "/description",
            "/pdp_listing_detail/sectioned_description/description",
            "/summary",
        ],
    ),
    (
        ListingField::OwnerId,
        &[
            "/listing/primary_host/id",
            "/primary_host/id",
            "/host/id",
            "/listing/user/id",
            "/host_id",
        ],
    ),
    (
        ListingField::OwnerName,
        &[
            "/listing/primary_host/first_name",
            "/primary_host/first_name",
            "/host/name",
            "/host_name",
        ],
    ),
    (
        ListingField::FlaggedOwner,
        &[
            "/listing/primary_host/is_superhost",
            "/primary_host/is_superhost",
            "/host/is_superhost",
            "/is_superhost",
        ],
    ),
    (
        ListingField::Rating,
        &["/listing/star_rating", "/star_rating", "/listing/avg_rating", "/avg_rating", "/rating"],
    ),
    (
        ListingField::ReviewCount,
        &["/listing/reviews_count", "/reviews_count", "/review_count", "/visible_review_count"],
    ),
    (
        ListingField::Latitude,
        &["/listing/lat", "/lat", "/latitude", "/coordinate/latitude"],
    ),
    (
        ListingField::Longitude,
        &["/listing/lng", "/lng", "/longitude", "/coordinate/longitude"],
    ),
    (
        ListingField::Registration,
        &["/listing/license", "/license", "/registration_number"],
    ),
    (
        ListingField::PropertyType,
        &["/listing/property_type", "/property_type"],
    ),
    (
        ListingField::RoomType,
        &["/listing/room_type_category", "/room_type_category", "/room_type"],
    ),
    (ListingField::Bedrooms, &["/listing/bedrooms", "/bedrooms"]),
    (ListingField::Bathrooms, &["/listing/bathrooms", "/bathrooms"]),
    (
        ListingField::PricePerNight,
        &["/pricing_quote/rate/amount", "/listing/price", "/price/amount", "/price"],
    ),
    (ListingField::City, &["/listing/city", "/city"]),
    (
        ListingField::Neighborhood,
        &["/listing/localized_neighborhood", "/localized_neighborhood", "/neighborhood"],
    ),
];

const PROFILE_PATHS: &[(ProfileField, &[&str])] = &[
    (
        ProfileField::Name,
        &["/user/first_name", "/first_name", "/name", "/host_name"],
    ),
    (
        ProfileField::Rating,
        &["/user/rating", "/rating", "/overall_rating"],
    ),
    (
        ProfileField::ReviewCount,
        &["/user/review_count", "/review_count", "/reviews_count"],
    ),
    (
        ProfileField::Joined,
        &["/user/created_at", "/member_since", "/joined", "/created_at"],
    ),
    (
        ProfileField::TotalListings,
        &["/user/listings_count", "/listings_count", "/total_listings"],
    ),
];

/// 默认的ID提取策略
pub const DEFAULT_ID_PATHS: &[&str] = &[
    "/listing/id",
    "/id",
    "/listing/listing_id",
    "/demandStayListing/id",
];

/// 字段提取表
///
/// 把"依次尝试几条路径"的写法收敛成一张声明式的表，
/// 上游结构变化时只需要修改这里
#[derive(Debug, Clone)]
pub struct FieldTable<F> {
    paths: HashMap<F, Vec<String>>,
}

impl<F: Copy + Eq + std::hash::Hash> FieldTable<F> {
    fn from_static(entries: &[(F, &[&str])]) -> Self {
        let paths = entries
            .iter()
            .map(|(field, candidates)| {
                (*field, candidates.iter().map(|p| (*p).to_string()).collect())
            })
            .collect();
        Self { paths }
    }

    /// 替换某个字段的候选路径
    pub fn with_paths(mut self, field: F, candidates: Vec<String>) -> Self {
        self.paths.insert(field, candidates);
        self
    }

    /// 字段的候选路径
    pub fn paths(&self, field: F) -> &[String] {
        self.paths.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 取第一个能用 `convert` 转换的候选值
    pub fn typed<T>(&self, raw: &Value, field: F, convert: fn(&Value) -> Option<T>) -> Option<T> {
        first_typed(raw, self.paths(field), convert)
    }

    pub fn text(&self, raw: &Value, field: F) -> Option<String> {
        self.typed(raw, field, as_text)
    }

    pub fn number(&self, raw: &Value, field: F) -> Option<f64> {
        self.typed(raw, field, as_f64)
    }

    pub fn count(&self, raw: &Value, field: F) -> Option<u64> {
        self.typed(raw, field, as_u64)
    }

    pub fn flag(&self, raw: &Value, field: F) -> Option<bool> {
        self.typed(raw, field, as_bool)
    }
}

impl Default for FieldTable<ListingField> {
    fn default() -> Self {
        Self::from_static(LISTING_PATHS)
    }
}

impl Default for FieldTable<ProfileField> {
    fn default() -> Self {
        Self::from_static(PROFILE_PATHS)
    }
}

/// 依次尝试候选路径，返回第一个能转换成目标类型的值
///
/// `null`、空字符串、空数组和空对象都视为缺失；类型不符的候选（例如评分位置上的 `"N/A"`）
/// 同样被跳过，继续尝试后面的路径
pub fn first_typed<S, T>(raw: &Value, candidates: &[S], convert: fn(&Value) -> Option<T>) -> Option<T>
where
    S: AsRef<str>,
{
    candidates
        .iter()
        .filter_map(|path| raw.pointer(path.as_ref()))
        .filter(|value| !is_empty(value))
        .find_map(convert)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// 字符串或数字转为文本
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 数字或数字字符串转为浮点数
pub fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// 非负整数或整数字符串
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 布尔值，也接受 "true"/"false" 和 0/1
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

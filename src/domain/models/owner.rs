// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(1[89]\d{2}|2\d{3})\b").expect("valid year pattern")
});

/// 房东/主人标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n
                .as_u64()
                .map(|u| u.to_string())
                .or_else(|| n.as_i64().map(|i| i.to_string()))
                .map(Self),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OwnerId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OwnerId::parse(&value).ok_or_else(|| format!("invalid owner id: {value:?}"))
    }
}

impl From<OwnerId> for String {
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 主人补全信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub name: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub joined_year: Option<i32>,
    pub years_active: Option<u32>,
    /// 远程源报告的房源总数（可选的第二次调用）
    pub total_listings: Option<u64>,
}

impl OwnerProfile {
    /// 根据加入日期文本填充加入年份和活跃年数
    ///
    /// 日期缺失、无法解析或晚于当前年份时两个字段都保持为空
    pub fn with_joined(mut self, joined: Option<&str>, current_year: i32) -> Self {
        let joined_year = joined.and_then(parse_joined_year);
        match joined_year.and_then(|year| years_active(year, current_year)) {
            Some(active) => {
                self.joined_year = joined_year;
                self.years_active = Some(active);
            }
            None => {
                self.joined_year = None;
                self.years_active = None;
            }
        }
        self
    }
}

/// 主人汇总
///
/// 首次观察到主人时惰性创建；补全字段最多填充一次，除非强制刷新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerAggregate {
    pub owner_id: OwnerId,
    pub listing_count: u64,
    pub enrichment: Option<OwnerProfile>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl OwnerAggregate {
    pub fn new(owner_id: OwnerId, listing_count: u64) -> Self {
        Self {
            owner_id,
            listing_count,
            enrichment: None,
            enriched_at: None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }
}

/// 从加入日期文本中提取四位年份
///
/// 支持 `2016-04-01`、`Joined in March 2016` 等形式
pub fn parse_joined_year(joined: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(joined)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 活跃年数 = 当前年份 − 加入年份，加入年份在未来时返回 `None`
pub fn years_active(joined_year: i32, current_year: i32) -> Option<u32> {
    u32::try_from(current_year - joined_year).ok()
}

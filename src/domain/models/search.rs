// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::area::Area;
use crate::domain::models::crawl_run::TimeWindow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 搜索过滤参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// 货币代码
    pub currency: Option<String>,
    /// 最低每晚价格
    pub min_price: Option<u32>,
    /// 最高每晚价格
    pub max_price: Option<u32>,
    /// 最少卧室数
    pub min_bedrooms: Option<u32>,
    /// 最少卫生间数
    pub min_bathrooms: Option<u32>,
    /// 每页结果数
    pub items_per_page: u32,
    /// 每个网格单元最多翻页数
    pub max_pages: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            currency: None,
            min_price: None,
            max_price: None,
            min_bedrooms: None,
            min_bathrooms: None,
            items_per_page: 50,
            max_pages: 1,
        }
    }
}

/// 详情请求参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailParams {
    pub currency: Option<String>,
    pub locale: Option<String>,
    pub window: Option<TimeWindow>,
}

/// 单次搜索请求
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// 网格单元名称
    pub cell: String,
    /// 搜索区域
    pub area: Area,
    pub window: TimeWindow,
    pub params: SearchParams,
    /// 翻页游标，第一页为 `None`
    pub cursor: Option<String>,
}

/// 一页搜索结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// 原始结果，核心逻辑只从中提取ID
    pub hits: Vec<Value>,
    /// 下一页游标，没有更多结果时为 `None`
    pub next_cursor: Option<String>,
}

impl SearchPage {
    pub fn last(hits: Vec<Value>) -> Self {
        Self {
            hits,
            next_cursor: None,
        }
    }
}

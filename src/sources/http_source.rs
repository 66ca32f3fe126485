// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::EntityId;
use crate::domain::models::owner::OwnerId;
use crate::domain::models::search::{DetailParams, SearchPage, SearchQuery};
use crate::domain::services::field_extractor::{as_bool, as_text, as_u64, first_typed};
use crate::sources::traits::{ListingSource, OwnerDirectory, SourceError};
use crate::utils::errors::ConfigError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

const HIT_PATHS: &[&str] = &["/results", "/data/results", "/items"];
const CURSOR_PATHS: &[&str] = &["/next_cursor", "/pagination/next_cursor"];
const HAS_NEXT_PATHS: &[&str] = &["/has_next_page", "/pagination/has_next_page"];
const COUNT_PATHS: &[&str] = &["/total", "/count", "/listings_count", "/pagination/total"];
const COUNT_ARRAY_PATHS: &[&str] = &["/results", "/listings", "/items"];

/// 错误响应体在日志中保留的最大长度
const MAX_ERROR_BODY: usize = 512;

/// HTTP数据源配置
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
}

/// 基于HTTP JSON接口的数据源
///
/// 同时实现房源搜索/详情和主人目录两个接口
pub struct HttpListingSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpListingSource {
    /// 创建数据源
    ///
    /// # 返回值
    ///
    /// * `Ok(HttpListingSource)` - 数据源实例
    /// * `Err(ConfigError)` - 地址或请求头无效
    pub fn new(config: HttpSourceConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidParameter(format!("source.base_url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidParameter(format!(
                "source.base_url cannot be used as a base: {base}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &config.api_key {
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                .map_err(|e| ConfigError::InvalidParameter(format!("source.api_key_header: {e}")))?;
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| ConfigError::InvalidParameter(format!("source.api_key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::InvalidParameter(format!("http client: {e}")))?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, SourceError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(SourceError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(SourceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() {
        SourceError::Malformed(e.to_string())
    } else {
        SourceError::Transient(e.to_string())
    }
}

fn window_params(query: &mut Vec<(&'static str, String)>, params: &DetailParams) {
    if let Some(window) = params.window {
        query.push(("checkin", window.check_in.to_string()));
        query.push(("checkout", window.check_out.to_string()));
    }
    if let Some(currency) = &params.currency {
        query.push(("currency", currency.clone()));
    }
    if let Some(locale) = &params.locale {
        query.push(("locale", locale.clone()));
    }
}

fn search_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let area = &query.area;
    let p = &query.params;
    let mut out = vec![
        ("south", area.south().to_string()),
        ("west", area.west().to_string()),
        ("north", area.north().to_string()),
        ("east", area.east().to_string()),
        ("checkin", query.window.check_in.to_string()),
        ("checkout", query.window.check_out.to_string()),
        ("items_per_page", p.items_per_page.to_string()),
    ];
    let optional = [
        ("min_price", p.min_price),
        ("max_price", p.max_price),
        ("min_bedrooms", p.min_bedrooms),
        ("min_bathrooms", p.min_bathrooms),
    ];
    out.extend(
        optional
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
    );
    if let Some(currency) = &p.currency {
        out.push(("currency", currency.clone()));
    }
    if let Some(cursor) = &query.cursor {
        out.push(("cursor", cursor.clone()));
    }
    out
}

/// 解析搜索响应
///
/// 游标缺失但 `has_next_page` 为真时，用页码作为游标继续翻页
pub fn parse_search_page(body: Value, cursor: Option<&str>) -> Result<SearchPage, SourceError> {
    let hits = match HIT_PATHS
        .iter()
        .find_map(|path| body.pointer(path).and_then(Value::as_array))
    {
        Some(hits) => hits.clone(),
        None => match body.as_array() {
            Some(hits) => hits.clone(),
            None => {
                return Err(SourceError::Malformed(
                    "search response has no result array".to_string(),
                ))
            }
        },
    };

    let has_next = first_typed(&body, HAS_NEXT_PATHS, as_bool);
    let explicit = first_typed(&body, CURSOR_PATHS, as_text);

    let next_cursor = match (has_next, explicit) {
        (Some(false), _) => None,
        _ if hits.is_empty() => None,
        (_, Some(next)) => Some(next),
        (Some(true), None) => {
            let page = cursor.and_then(|c| c.parse::<u32>().ok()).unwrap_or(1);
            Some((page + 1).to_string())
        }
        (None, None) => None,
    };

    Ok(SearchPage { hits, next_cursor })
}

/// 从房源列表响应中统计数量
pub fn parse_listing_count(body: &Value) -> Result<u64, SourceError> {
    if let Some(total) = first_typed(body, COUNT_PATHS, as_u64) {
        return Ok(total);
    }
    COUNT_ARRAY_PATHS
        .iter()
        .find_map(|path| body.pointer(path).and_then(Value::as_array))
        .or_else(|| body.as_array())
        .map(|items| items.len() as u64)
        .ok_or_else(|| SourceError::Malformed("listing count response has no count".to_string()))
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        let body = self
            .get_json(self.endpoint(&["search"]), &search_params(query))
            .await?;
        parse_search_page(body, query.cursor.as_deref())
    }

    async fn fetch_detail(
        &self,
        id: &EntityId,
        params: &DetailParams,
    ) -> Result<Value, SourceError> {
        let mut query = Vec::new();
        window_params(&mut query, params);
        self.get_json(self.endpoint(&["listings", id.as_str()]), &query)
            .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[async_trait]
impl OwnerDirectory for HttpListingSource {
    async fn enrich_owner(&self, owner_id: &OwnerId) -> Result<Value, SourceError> {
        self.get_json(self.endpoint(&["owners", owner_id.as_str()]), &[])
            .await
    }

    async fn count_owner_listings(&self, owner_id: &OwnerId) -> Result<u64, SourceError> {
        let body = self
            .get_json(
                self.endpoint(&["owners", owner_id.as_str(), "listings"]),
                &[],
            )
            .await?;
        parse_listing_count(&body)
    }
}

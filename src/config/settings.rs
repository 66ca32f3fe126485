// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::crawl_use_case::{
    CrawlOptions, DelayOptions, EnrichmentOptions, RetryOptions,
};
use crate::domain::models::area::{Area, AreaBounds};
use crate::domain::models::crawl_run::TimeWindow;
use crate::domain::models::search::{DetailParams, SearchParams};
use crate::domain::services::detail_service::{
    UrlTemplates, DEFAULT_GEOFENCE_MARGIN, DEFAULT_REGISTRATION_PATTERN,
};
use crate::domain::services::field_extractor::DEFAULT_ID_PATHS;
use crate::utils::errors::ConfigError;
use crate::utils::retry_policy::RetryPolicy;
use chrono::{Datelike, NaiveDate};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// 应用程序配置设置
///
/// 加载顺序：内置默认值 → `config/default.toml` → `config/{APP_ENVIRONMENT}.toml`
/// → 以 `GRIDCRAWL__` 为前缀的环境变量
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// 目标区域
    #[validate(nested)]
    pub area: AreaSettings,
    /// 网格切分
    #[validate(nested)]
    pub grid: GridSettings,
    /// 入住/退房时间窗口
    #[validate(nested)]
    pub window: WindowSettings,
    /// 单次运行限制
    #[validate(nested)]
    pub run: RunSettings,
    /// 搜索过滤参数
    #[validate(nested)]
    pub search: SearchSettings,
    /// 主人补全
    pub enrichment: EnrichmentSettings,
    /// 重试策略
    #[validate(nested)]
    pub retry: RetrySettings,
    /// 调用间隔
    pub delays: DelaySettings,
    /// 数据目录
    #[validate(nested)]
    pub storage: StorageSettings,
    /// 远程数据源
    #[validate(nested)]
    pub source: SourceSettings,
    /// 发布
    #[validate(nested)]
    pub publish: PublishSettings,
    /// 字段提取
    #[validate(nested)]
    pub extraction: ExtractionSettings,
}

/// 目标区域配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AreaSettings {
    #[validate(range(min = -90.0, max = 90.0))]
    pub south: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub west: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub north: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub east: f64,
}

impl AreaSettings {
    pub fn bounds(&self) -> AreaBounds {
        AreaBounds {
            south: self.south,
            west: self.west,
            north: self.north,
            east: self.east,
        }
    }
}

/// 网格配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GridSettings {
    #[validate(range(min = 1, max = 1000))]
    pub rows: u32,
    #[validate(range(min = 1, max = 1000))]
    pub cols: u32,
    /// 单元重叠比例
    #[validate(range(min = 0.0))]
    pub overlap: f64,
}

/// 时间窗口配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WindowSettings {
    /// 入住日距今天的天数
    pub offset_days: u32,
    /// 入住晚数
    #[validate(range(min = 1))]
    pub span_days: u32,
}

/// 运行限制配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RunSettings {
    /// 每次运行最多处理的新房源数，0 表示不限
    pub max_listings: usize,
    /// 详情抓取并发数
    #[validate(range(min = 1, max = 64))]
    pub detail_concurrency: usize,
}

/// 搜索参数配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchSettings {
    pub currency: Option<String>,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
    pub min_bedrooms: Option<u32>,
    pub min_bathrooms: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub items_per_page: u32,
    #[validate(range(min = 1))]
    pub max_pages: u32,
}

/// 主人补全配置
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSettings {
    pub enabled: bool,
    pub budget: usize,
    pub force: bool,
    pub count_listings: bool,
    pub seed: Option<u64>,
}

/// 单类调用的重试配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RetryCallSettings {
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryCallSettings {
    fn policy(&self, classify_errors: bool) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_classification(classify_errors)
    }
}

/// 重试配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RetrySettings {
    #[validate(nested)]
    pub search: RetryCallSettings,
    #[validate(nested)]
    pub detail: RetryCallSettings,
    #[validate(nested)]
    pub enrichment: RetryCallSettings,
    /// 是否跳过不可重试的错误
    pub classify_errors: bool,
}

/// 调用间隔配置（毫秒）
#[derive(Debug, Clone, Deserialize)]
pub struct DelaySettings {
    pub search_ms: u64,
    pub detail_ms: u64,
    pub enrichment_ms: u64,
}

/// 存储配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StorageSettings {
    #[validate(length(min = 1))]
    pub data_dir: String,
}

impl StorageSettings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

/// 远程数据源配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SourceSettings {
    #[validate(url)]
    pub base_url: String,
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    #[validate(length(min = 1))]
    pub user_agent: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub locale: Option<String>,
}

/// 发布配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublishSettings {
    pub enabled: bool,
    /// 每持久化多少条记录发布一次
    pub every: usize,
    /// 单次发布的超时时间
    #[validate(range(min = 1, max = 3600))]
    pub timeout_secs: u64,
    pub command: Option<String>,
    pub args: Vec<String>,
}

/// 字段提取配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExtractionSettings {
    /// 登记编号正则，空字符串表示不提取
    pub registration_pattern: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub geofence_margin: f64,
    #[validate(length(min = 1))]
    pub id_paths: Vec<String>,
    pub listing_url_base: Option<String>,
    pub owner_url_base: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 加载并校验通过的配置
    /// * `Err(ConfigError)` - 加载或校验失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("GRIDCRAWL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("extraction.id_paths")
                    .with_list_parse_key("publish.args"),
            );

        Self::from_builder(builder)
    }

    /// 只包含内置默认值的构建器
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            // Dubai bounding box
            .set_default("area.south", 24.79)?
            .set_default("area.west", 54.89)?
            .set_default("area.north", 25.36)?
            .set_default("area.east", 55.56)?
            .set_default("grid.rows", 3)?
            .set_default("grid.cols", 3)?
            .set_default("grid.overlap", 0.1)?
            .set_default("window.offset_days", 30)?
            .set_default("window.span_days", 2)?
            .set_default("run.max_listings", 200)?
            .set_default("run.detail_concurrency", 1)?
            .set_default("search.currency", "AED")?
            .set_default("search.min_price", 300)?
            .set_default("search.max_price", 3000)?
            .set_default("search.min_bedrooms", 1)?
            .set_default("search.min_bathrooms", 1)?
            .set_default("search.items_per_page", 50)?
            .set_default("search.max_pages", 3)?
            .set_default("enrichment.enabled", false)?
            .set_default("enrichment.budget", 50)?
            .set_default("enrichment.force", false)?
            .set_default("enrichment.count_listings", false)?
            .set_default("retry.search.max_attempts", 3)?
            .set_default("retry.search.base_delay_ms", 2000)?
            .set_default("retry.detail.max_attempts", 3)?
            .set_default("retry.detail.base_delay_ms", 1000)?
            .set_default("retry.enrichment.max_attempts", 2)?
            .set_default("retry.enrichment.base_delay_ms", 1000)?
            .set_default("retry.classify_errors", false)?
            .set_default("delays.search_ms", 2000)?
            .set_default("delays.detail_ms", 1000)?
            .set_default("delays.enrichment_ms", 500)?
            .set_default("storage.data_dir", "./data")?
            .set_default("source.base_url", "http://127.0.0.1:8080")?
            .set_default("source.timeout_secs", 30)?
            .set_default(
                "source.user_agent",
                concat!("gridcrawl/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("source.api_key_header", "X-Api-Key")?
            .set_default("source.locale", "en")?
            .set_default("publish.enabled", false)?
            .set_default("publish.every", 100)?
            .set_default("publish.timeout_secs", 120)?
            .set_default("publish.args", Vec::<String>::new())?
            .set_default("extraction.registration_pattern", DEFAULT_REGISTRATION_PATTERN)?
            .set_default("extraction.geofence_margin", DEFAULT_GEOFENCE_MARGIN)?
            .set_default(
                "extraction.id_paths",
                DEFAULT_ID_PATHS
                    .iter()
                    .map(|p| (*p).to_string())
                    .collect::<Vec<String>>(),
            )
    }

    /// 从构建器加载，并做字段校验和区域不变式检查
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Area::try_from(settings.area.bounds())?;
        Ok(settings)
    }

    /// 转换为一次运行的参数
    ///
    /// # 参数
    ///
    /// * `today` - 计算时间窗口和活跃年数的基准日期
    pub fn crawl_options(&self, today: NaiveDate) -> CrawlOptions {
        let window = TimeWindow::from_offset(today, self.window.offset_days, self.window.span_days);
        let classify = self.retry.classify_errors;
        let pattern = self.extraction.registration_pattern.trim();

        CrawlOptions {
            area: self.area.bounds(),
            rows: self.grid.rows,
            cols: self.grid.cols,
            overlap: self.grid.overlap,
            window,
            max_listings: (self.run.max_listings > 0).then_some(self.run.max_listings),
            detail_concurrency: self.run.detail_concurrency,
            search: SearchParams {
                currency: self.search.currency.clone(),
                min_price: self.search.min_price,
                max_price: self.search.max_price,
                min_bedrooms: self.search.min_bedrooms,
                min_bathrooms: self.search.min_bathrooms,
                items_per_page: self.search.items_per_page,
                max_pages: self.search.max_pages,
            },
            detail: DetailParams {
                currency: self.search.currency.clone(),
                locale: self.source.locale.clone(),
                window: Some(window),
            },
            enrichment: EnrichmentOptions {
                enabled: self.enrichment.enabled,
                budget: self.enrichment.budget,
                force: self.enrichment.force,
                count_listings: self.enrichment.count_listings,
                seed: self.enrichment.seed,
            },
            retry: RetryOptions {
                search: self.retry.search.policy(classify),
                detail: self.retry.detail.policy(classify),
                enrichment: self.retry.enrichment.policy(classify),
            },
            delays: DelayOptions {
                search: Duration::from_millis(self.delays.search_ms),
                detail: Duration::from_millis(self.delays.detail_ms),
                enrichment: Duration::from_millis(self.delays.enrichment_ms),
            },
            geofence_margin: self.extraction.geofence_margin,
            registration_pattern: (!pattern.is_empty()).then(|| pattern.to_string()),
            id_paths: self.extraction.id_paths.clone(),
            urls: UrlTemplates {
                listing_base: self.extraction.listing_url_base.clone(),
                owner_base: self.extraction.owner_url_base.clone(),
            },
            publish_every: if self.publish.enabled { self.publish.every } else { 0 },
            publish_timeout: Duration::from_secs(self.publish.timeout_secs),
            current_year: today.year(),
        }
    }
}

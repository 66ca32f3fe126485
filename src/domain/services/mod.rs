// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含抓取流水线的核心逻辑：
/// - 网格切分（area_grid）：把目标区域切分为搜索单元
/// - 发现（discovery_service）：逐单元搜索并去重ID
/// - 详情（detail_service）：抓取详情并映射为标准化房源
/// - 补全（enrichment_service）：按预算和优先级补全主人信息
/// - 汇总（aggregation_service）：统计每个主人的房源数量
/// - 字段提取（field_extractor）：声明式的JSON路径表
///
/// 这些服务只依赖领域模型和数据源接口，不关心具体的存储实现。
pub mod aggregation_service;
pub mod area_grid;
pub mod detail_service;
pub mod discovery_service;
pub mod enrichment_service;
pub mod field_extractor;

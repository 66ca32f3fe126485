// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 区域（area）：目标地理范围和网格单元
/// - 房源（listing）：标准化的房源记录和结果表行
/// - 主人（owner）：主人标识、补全信息和汇总
/// - 搜索（search）：搜索/详情请求参数
/// - 爬取运行（crawl_run）：一次运行的状态机和计数器
pub mod area;
pub mod crawl_run;
pub mod listing;
pub mod owner;
pub mod search;

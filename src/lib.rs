// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含一次爬取运行的编排用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供检查点、结果存储和发布的具体实现
pub mod infrastructure;

/// 数据源模块
///
/// 定义远程搜索/详情接口及其HTTP实现
pub mod sources;

/// 工具模块
///
/// 提供重试、限速、遥测等通用功能
pub mod utils;

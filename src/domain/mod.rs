// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：区域、房源、主人和运行状态
/// - 仓库接口（repositories）：检查点、结果存储和发布的抽象接口
/// - 服务（services）：网格切分、发现、详情、补全和汇总
///
/// 领域层不依赖于任何具体的存储或网络实现。
pub mod models;
pub mod repositories;
pub mod services;

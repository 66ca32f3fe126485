// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理分层加载的运行配置：区域、网格、重试、存储和数据源等
pub mod settings;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据源模块
///
/// 定义远程数据源接口和基于HTTP的JSON实现
pub mod http_source;
pub mod traits;

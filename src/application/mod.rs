// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用层
///
/// 编排领域服务和外部协作者，完成一次完整的爬取运行
pub mod use_cases;

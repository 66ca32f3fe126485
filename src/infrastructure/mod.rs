// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供领域仓库接口的具体实现：
/// - 存储（storage）：基于本地文件的检查点和结果表
/// - 发布（publisher）：运行过程中把结果推送到外部的发布者
///
/// 基础设施层依赖于领域层的抽象接口，领域层不感知这些实现。
pub mod publisher;
pub mod storage;

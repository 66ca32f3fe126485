// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 原始边界坐标
///
/// 从配置中读取，尚未经过校验；通过 [`Area::try_from`] 转换为 [`Area`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// 地理矩形区域
///
/// 不变式：`south < north` 且 `west < east`。构造后不可修改。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Area {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl Area {
    /// 创建区域，违反不变式（包括NaN）时返回配置错误
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, ConfigError> {
        if !(south < north) || !(west < east) {
            return Err(ConfigError::InvalidArea(format!(
                "south={south}, west={west}, north={north}, east={east}"
            )));
        }
        if !(south.is_finite() && west.is_finite() && north.is_finite() && east.is_finite()) {
            return Err(ConfigError::InvalidArea("coordinates must be finite".to_string()));
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    /// 纬度跨度
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// 经度跨度
    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// 判断坐标点是否在区域内（含边界）
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }

    /// 判断另一区域是否完全位于本区域内
    pub fn contains_area(&self, other: &Area) -> bool {
        other.south >= self.south
            && other.north <= self.north
            && other.west >= self.west
            && other.east <= self.east
    }

    /// 向四周扩展固定的角度余量
    pub fn expand(&self, margin: f64) -> Area {
        let margin = if margin.is_finite() { margin.max(0.0) } else { 0.0 };
        Area {
            south: self.south - margin,
            west: self.west - margin,
            north: self.north + margin,
            east: self.east + margin,
        }
    }
}

impl TryFrom<AreaBounds> for Area {
    type Error = ConfigError;

    fn try_from(bounds: AreaBounds) -> Result<Self, Self::Error> {
        Area::new(bounds.south, bounds.west, bounds.north, bounds.east)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{:.5},{:.5} -> {:.5},{:.5}]",
            self.south, self.west, self.north, self.east
        )
    }
}

/// 网格单元
///
/// 由 AreaGrid 切分得到的子区域，名称由行列号稳定推导（如 `r0c1`）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// 稳定名称，用于日志
    pub name: String,
    /// 行号，0 为最南一行
    pub row: u32,
    /// 列号，0 为最西一列
    pub col: u32,
    /// 单元边界（已包含重叠扩展）
    pub bounds: Area,
}

impl Cell {
    pub fn new(row: u32, col: u32, bounds: Area) -> Self {
        Self {
            name: format!("r{row}c{col}"),
            row,
            col,
            bounds,
        }
    }
}

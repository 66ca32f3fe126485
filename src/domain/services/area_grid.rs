// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::area::{Area, Cell};
use crate::utils::errors::ConfigError;

/// 单次切分允许的最大单元数
pub const MAX_CELLS: usize = 1_000_000;

/// 区域网格
///
/// 把目标区域切分为 rows × cols 个等角度大小的单元，
/// 使每次搜索都保持在远程源的单次结果上限之内
pub struct AreaGrid;

impl AreaGrid {
    /// 切分区域
    ///
    /// 每个单元按自身跨度的 `overlap` 比例向外扩展，再截断到原区域内。
    /// 输出按行优先排列，行0为最南一行。
    ///
    /// # 参数
    ///
    /// * `area` - 目标区域
    /// * `rows` - 行数，必须大于0
    /// * `cols` - 列数，必须大于0，且 rows*cols 不超过 [`MAX_CELLS`]
    /// * `overlap` - 重叠比例，必须非负
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<Cell>)` - 恰好 rows*cols 个单元
    /// * `Err(ConfigError)` - 参数无效
    pub fn partition(
        area: &Area,
        rows: u32,
        cols: u32,
        overlap: f64,
    ) -> Result<Vec<Cell>, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::InvalidGrid(format!(
                "rows and cols must be positive (rows={rows}, cols={cols})"
            )));
        }
        let total = (rows as usize)
            .checked_mul(cols as usize)
            .filter(|total| *total <= MAX_CELLS)
            .ok_or_else(|| {
                ConfigError::InvalidGrid(format!(
                    "rows*cols must not exceed {MAX_CELLS} (rows={rows}, cols={cols})"
                ))
            })?;
        if !(overlap >= 0.0) || !overlap.is_finite() {
            return Err(ConfigError::InvalidGrid(format!(
                "overlap must be a non-negative fraction, got {overlap}"
            )));
        }

        let lat_step = area.lat_span() / f64::from(rows);
        let lng_step = area.lng_span() / f64::from(cols);
        let lat_pad = lat_step * overlap;
        let lng_pad = lng_step * overlap;

        let mut cells = Vec::with_capacity(total);
        for row in 0..rows {
            let (south, north) = edges(area.south(), area.north(), lat_step, row, rows);
            for col in 0..cols {
                let (west, east) = edges(area.west(), area.east(), lng_step, col, cols);
                let bounds = Area::new(
                    (south - lat_pad).max(area.south()),
                    (west - lng_pad).max(area.west()),
                    (north + lat_pad).min(area.north()),
                    (east + lng_pad).min(area.east()),
                )?;
                cells.push(Cell::new(row, col, bounds));
            }
        }

        Ok(cells)
    }
}

/// 第 `index` 段的起止坐标，最后一段精确结束在 `max`，避免浮点误差留下缝隙
fn edges(min: f64, max: f64, step: f64, index: u32, count: u32) -> (f64, f64) {
    let start = if index == 0 {
        min
    } else {
        min + step * f64::from(index)
    };
    let end = if index + 1 == count {
        max
    } else {
        min + step * f64::from(index + 1)
    };
    (start, end)
}

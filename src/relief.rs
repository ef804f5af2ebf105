//! 多重窓の相対起伏（relative relief）
//!
//! 各画素について、半径 `buffer`、`buffer + 3`、`buffer + 6` の正方窓内の
//! 有効標高の最小値・最大値から `(z - zmin) / (zmax - zmin)` を求める。
//! 窓は素朴に走査する（画素ごとに O(窓面積)）。平坦部での同値の扱いを
//! 変えないよう、増分的な最小値・最大値の更新は行わない。

use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{is_nodata, is_valid_elevation, DemGrid, NODATA};

/// 基本窓に対する半径の増分
pub const WINDOW_STEPS: [usize; 3] = [0, 3, 6];

/// 3つの窓の平均の取り方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReliefAverage {
    /// 欠損値もそのまま平均に含める
    #[default]
    Literal,
    /// 欠損値の窓を除いて平均する（全て欠損なら欠損）
    ValidOnly,
}

impl FromStr for ReliefAverage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(ReliefAverage::Literal),
            "valid" | "validonly" | "valid_only" => Ok(ReliefAverage::ValidOnly),
            other => Err(Error::Config(format!(
                "unknown relief average policy '{}'",
                other
            ))),
        }
    }
}

pub fn half_widths(buffer: usize) -> [usize; 3] {
    WINDOW_STEPS.map(|step| buffer + step)
}

/// 窓サイズ（一辺の画素数）
pub fn window_sizes(buffer: usize) -> [usize; 3] {
    half_widths(buffer).map(|w| 2 * w + 1)
}

/// 1画素・1窓の相対起伏。窓はグリッド範囲で切り取る。
pub fn relative_relief(
    z: &[f32],
    nlines: usize,
    ncols: usize,
    row: usize,
    col: usize,
    half_width: usize,
) -> f32 {
    let center = z[row * ncols + col];
    let mut z_min = center;
    let mut z_max = center;

    let row_end = (row + half_width).min(nlines - 1);
    let col_end = (col + half_width).min(ncols - 1);

    for r in row.saturating_sub(half_width)..=row_end {
        let line = &z[r * ncols..(r + 1) * ncols];
        for &v in &line[col.saturating_sub(half_width)..=col_end] {
            if !is_valid_elevation(v) {
                continue;
            }
            if v > z_max {
                z_max = v;
            }
            if v < z_min {
                z_min = v;
            }
        }
    }

    if z_max > z_min {
        (center - z_min) / (z_max - z_min)
    } else {
        NODATA
    }
}

pub fn average(values: [f32; 3], policy: ReliefAverage) -> f32 {
    match policy {
        ReliefAverage::Literal => {
            let sum: f64 = values.iter().map(|&v| v as f64).sum();
            (sum / values.len() as f64) as f32
        }
        ReliefAverage::ValidOnly => {
            let valid: Vec<f64> = values
                .iter()
                .filter(|&&v| !is_nodata(v))
                .map(|&v| v as f64)
                .collect();
            if valid.is_empty() {
                NODATA
            } else {
                (valid.iter().sum::<f64>() / valid.len() as f64) as f32
            }
        }
    }
}

/// グリッド全体の相対起伏レイヤを計算する。
///
/// 端から `buffer` 画素以内、または標高が欠損の画素は全レイヤを欠損値にする。
/// 地形の指標レイヤはここで全てクリアされる。
pub fn compute_relief(grid: &mut DemGrid, buffer: usize, policy: ReliefAverage) {
    let (nlines, ncols) = grid.shape();
    let widths = half_widths(buffer);

    info!(
        "Computing relative relief: {} x {} pixels, windows {:?}",
        ncols,
        nlines,
        window_sizes(buffer)
    );

    grid.clear_indicators();

    for row in 0..nlines {
        for col in 0..ncols {
            let idx = grid.index(row, col);

            if !grid.is_interior(row, col, buffer) || !grid.complete[idx] {
                grid.res[idx] = NODATA;
                grid.res_plus1[idx] = NODATA;
                grid.res_plus2[idx] = NODATA;
                grid.avg[idx] = NODATA;
                continue;
            }

            let values = widths.map(|w| relative_relief(&grid.z, nlines, ncols, row, col, w));
            grid.res[idx] = values[0];
            grid.res_plus1[idx] = values[1];
            grid.res_plus2[idx] = values[2];
            grid.avg[idx] = average(values, policy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Header;

    fn create_grid(nlines: usize, ncols: usize, z: Vec<f32>) -> DemGrid {
        DemGrid::new(Header::new(ncols, nlines, 1.0, 1.0, 0.0, 0.0), z).unwrap()
    }

    /// 列方向に傾いた面（行ごとに少しずつ異なる）
    fn sloped_grid(nlines: usize, ncols: usize) -> DemGrid {
        let z = (0..nlines * ncols)
            .map(|i| {
                let (r, c) = (i / ncols, i % ncols);
                (c as f32) * 0.5 + (r as f32) * 0.1 + ((r * 7 + c * 3) % 5) as f32 * 0.05
            })
            .collect();
        create_grid(nlines, ncols, z)
    }

    #[test]
    fn test_half_widths() {
        assert_eq!(half_widths(2), [2, 5, 8]);
        assert_eq!(window_sizes(2), [5, 11, 17]);
    }

    #[test]
    fn test_relative_relief_basic() {
        // 3x3 で中心が中間の値
        let z = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(relative_relief(&z, 3, 3, 1, 1, 1), 0.5);
        // 端では窓が切り取られる
        assert_eq!(relative_relief(&z, 3, 3, 0, 0, 1), 0.0);
        assert_eq!(relative_relief(&z, 3, 3, 2, 2, 1), 1.0);
    }

    #[test]
    fn test_flat_window_is_nodata() {
        let z = vec![3.0; 9];
        assert_eq!(relative_relief(&z, 3, 3, 1, 1, 1), NODATA);
    }

    #[test]
    fn test_nodata_neighbours_are_ignored() {
        let z = vec![-9999.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, -9999.0];
        // 有効値は 1..=7、中心は4
        assert_eq!(relative_relief(&z, 3, 3, 1, 1, 1), 0.5);
    }

    #[test]
    fn test_average_policies() {
        assert_eq!(average([0.0, 0.5, 1.0], ReliefAverage::Literal), 0.5);
        assert_eq!(average([0.0, 0.5, 1.0], ReliefAverage::ValidOnly), 0.5);

        let literal = average([NODATA, 0.5, 1.0], ReliefAverage::Literal);
        assert!((literal - (-9997.5 / 3.0)).abs() < 1e-3);
        assert_eq!(average([NODATA, 0.5, 1.0], ReliefAverage::ValidOnly), 0.75);
        assert_eq!(
            average([NODATA, NODATA, NODATA], ReliefAverage::ValidOnly),
            NODATA
        );
    }

    #[test]
    fn test_edges_are_nodata() {
        let mut grid = sloped_grid(12, 15);
        let buffer = 2;
        compute_relief(&mut grid, buffer, ReliefAverage::Literal);

        let (nlines, ncols) = grid.shape();
        for row in 0..nlines {
            for col in 0..ncols {
                let idx = grid.index(row, col);
                let edge = row < buffer
                    || row >= nlines - buffer
                    || col < buffer
                    || col >= ncols - buffer;
                if edge {
                    assert_eq!(grid.res[idx], NODATA);
                    assert_eq!(grid.res_plus1[idx], NODATA);
                    assert_eq!(grid.res_plus2[idx], NODATA);
                    assert_eq!(grid.avg[idx], NODATA);
                } else {
                    assert_ne!(grid.res[idx], NODATA);
                }
            }
        }
    }

    #[test]
    fn test_relief_range_and_average() {
        let mut grid = sloped_grid(12, 15);
        compute_relief(&mut grid, 1, ReliefAverage::Literal);

        for idx in 0..grid.z.len() {
            let values = [grid.res[idx], grid.res_plus1[idx], grid.res_plus2[idx]];
            for v in values {
                assert!(v == NODATA || (0.0..=1.0).contains(&v), "relief {} out of range", v);
            }
            if values.iter().all(|&v| v != NODATA) {
                let mean = values.iter().map(|&v| v as f64).sum::<f64>() / 3.0;
                assert!((grid.avg[idx] as f64 - mean).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_nodata_center_is_skipped() {
        let mut grid = sloped_grid(9, 9);
        let idx = grid.index(4, 4);
        grid.z[idx] = -9999.0;
        grid.complete[idx] = false;
        compute_relief(&mut grid, 1, ReliefAverage::Literal);

        assert_eq!(grid.res[idx], NODATA);
        assert_eq!(grid.avg[idx], NODATA);
        // 隣の画素は計算される
        assert_ne!(grid.res[grid.index(4, 5)], NODATA);
    }

    #[test]
    fn test_clears_indicators() {
        let mut grid = sloped_grid(9, 9);
        grid.mark(crate::model::Landform::DuneToe, 10);
        compute_relief(&mut grid, 1, ReliefAverage::Literal);
        assert!(grid
            .indicator(crate::model::Landform::DuneToe)
            .iter()
            .all(|&v| v == 0));
    }

    #[test]
    fn test_idempotent() {
        let mut first = sloped_grid(10, 10);
        let mut second = first.clone();
        compute_relief(&mut first, 1, ReliefAverage::Literal);
        compute_relief(&mut second, 1, ReliefAverage::Literal);
        compute_relief(&mut second, 1, ReliefAverage::Literal);

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first.avg), bits(&second.avg));
        assert_eq!(bits(&first.res_plus2), bits(&second.res_plus2));
    }
}

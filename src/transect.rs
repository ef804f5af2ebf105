//! トランセクト（走査線）の幾何
//!
//! トランセクトはグリッドの1行または1列を1次元の断面として扱う。
//! 断面上の位置 `p` は大きいほど海側で、走査は海側から `p = 0` に向かって進む。

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::extract::Feature;
use crate::model::DemGrid;

/// 陸側に向かう走査方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransectDirection {
    /// 行を最終列から列0へ（海が東側）
    #[default]
    West,
    /// 行を列0から最終列へ（海が西側）
    East,
    /// 列を最終行から行0へ（海が南側）
    North,
    /// 列を行0から最終行へ（海が北側）
    South,
}

impl TransectDirection {
    pub const ALL: [TransectDirection; 4] = [
        TransectDirection::West,
        TransectDirection::East,
        TransectDirection::North,
        TransectDirection::South,
    ];

    /// 行に沿ったトランセクトか
    pub fn is_row(self) -> bool {
        matches!(self, TransectDirection::West | TransectDirection::East)
    }

    pub fn code(self) -> &'static str {
        match self {
            TransectDirection::West => "W",
            TransectDirection::East => "E",
            TransectDirection::North => "N",
            TransectDirection::South => "S",
        }
    }

    /// グリッド上のトランセクト本数
    pub fn transect_count(self, nlines: usize, ncols: usize) -> usize {
        if self.is_row() {
            nlines
        } else {
            ncols
        }
    }

    /// 1本のトランセクトの長さ
    pub fn transect_len(self, nlines: usize, ncols: usize) -> usize {
        if self.is_row() {
            ncols
        } else {
            nlines
        }
    }

    /// トランセクト `index` 上の位置 `position` に対応する (行, 列)
    pub fn cell(self, index: usize, position: usize, nlines: usize, ncols: usize) -> (usize, usize) {
        match self {
            TransectDirection::West => (index, position),
            TransectDirection::East => (index, ncols - 1 - position),
            TransectDirection::North => (position, index),
            TransectDirection::South => (nlines - 1 - position, index),
        }
    }
}

impl fmt::Display for TransectDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TransectDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "west" => Ok(TransectDirection::West),
            "e" | "east" => Ok(TransectDirection::East),
            "n" | "north" => Ok(TransectDirection::North),
            "s" | "south" => Ok(TransectDirection::South),
            other => Err(Error::Config(format!(
                "unknown transect direction '{}'",
                other
            ))),
        }
    }
}

/// グリッド上の1本のトランセクト
#[derive(Debug, Clone, Copy)]
pub struct Transect<'a> {
    grid: &'a DemGrid,
    direction: TransectDirection,
    index: usize,
    buffer: usize,
}

impl<'a> Transect<'a> {
    /// 走査可能なトランセクトを作成する。
    ///
    /// トランセクト自体が画像端から `buffer` 以内にある場合や、
    /// 走査できる位置が1つもない場合は `None`。
    pub fn new(
        grid: &'a DemGrid,
        direction: TransectDirection,
        index: usize,
        buffer: usize,
    ) -> Option<Self> {
        let (nlines, ncols) = grid.shape();
        let count = direction.transect_count(nlines, ncols);
        if index < buffer || index + buffer >= count {
            return None;
        }
        let transect = Self {
            grid,
            direction,
            index,
            buffer,
        };
        if transect.positions().is_empty() {
            return None;
        }
        Some(transect)
    }

    pub fn direction(&self) -> TransectDirection {
        self.direction
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        let (nlines, ncols) = self.grid.shape();
        self.direction.transect_len(nlines, ncols)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 隣接位置間の距離（地図単位）
    pub fn spacing(&self) -> f64 {
        if self.direction.is_row() {
            self.grid.header.xres
        } else {
            self.grid.header.yres
        }
    }

    /// 1画素の面積
    pub fn spacing_area(&self) -> f64 {
        self.grid.header.pixel_area()
    }

    /// トランセクトに直交する座標（行ならy、列ならx）
    pub fn coordinate(&self) -> f64 {
        if self.direction.is_row() {
            self.grid.header.cell_y(self.index)
        } else {
            self.grid.header.cell_x(self.index)
        }
    }

    /// 交差判定で両隣を参照しても相対起伏の計算範囲に収まる位置
    pub fn positions(&self) -> RangeInclusive<usize> {
        let len = self.len();
        if len < 2 * self.buffer + 3 {
            // 空の範囲
            return 1..=0;
        }
        (self.buffer + 1)..=(len - self.buffer - 2)
    }

    pub fn row_col(&self, position: usize) -> (usize, usize) {
        let (nlines, ncols) = self.grid.shape();
        self.direction.cell(self.index, position, nlines, ncols)
    }

    /// 位置に対応するグリッドのインデックス
    pub fn cell(&self, position: usize) -> usize {
        let (row, col) = self.row_col(position);
        self.grid.index(row, col)
    }

    pub fn z(&self, position: usize) -> f32 {
        self.grid.z[self.cell(position)]
    }

    pub fn avg(&self, position: usize) -> f32 {
        self.grid.avg[self.cell(position)]
    }

    pub fn feature(&self, position: usize) -> Feature {
        let (row, col) = self.row_col(position);
        let idx = self.grid.index(row, col);
        Feature {
            position,
            row,
            col,
            x: self.grid.x(idx),
            y: self.grid.y(idx),
            z: self.grid.z[idx],
        }
    }
}

/// グリッド上の全ての走査可能なトランセクト
pub fn transects(
    grid: &DemGrid,
    direction: TransectDirection,
    buffer: usize,
) -> impl Iterator<Item = Transect<'_>> {
    let (nlines, ncols) = grid.shape();
    (0..direction.transect_count(nlines, ncols))
        .filter_map(move |index| Transect::new(grid, direction, index, buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Header;

    fn create_grid(nlines: usize, ncols: usize) -> DemGrid {
        let z = (0..nlines * ncols).map(|i| i as f32).collect();
        DemGrid::new(Header::new(ncols, nlines, 2.0, 3.0, 100.0, 200.0), z).unwrap()
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("W".parse::<TransectDirection>().unwrap(), TransectDirection::West);
        assert_eq!("east".parse::<TransectDirection>().unwrap(), TransectDirection::East);
        assert_eq!(" n ".parse::<TransectDirection>().unwrap(), TransectDirection::North);
        assert_eq!("South".parse::<TransectDirection>().unwrap(), TransectDirection::South);
        assert!("up".parse::<TransectDirection>().is_err());
        assert_eq!(TransectDirection::default().to_string(), "W");
    }

    #[test]
    fn test_cells_for_all_directions() {
        let (nlines, ncols) = (4, 6);
        assert_eq!(TransectDirection::West.cell(2, 5, nlines, ncols), (2, 5));
        assert_eq!(TransectDirection::East.cell(2, 5, nlines, ncols), (2, 0));
        assert_eq!(TransectDirection::North.cell(1, 3, nlines, ncols), (3, 1));
        assert_eq!(TransectDirection::South.cell(1, 3, nlines, ncols), (0, 1));
    }

    #[test]
    fn test_seaward_end_is_highest_position() {
        let grid = create_grid(9, 11);
        for direction in TransectDirection::ALL {
            let t = Transect::new(&grid, direction, 4, 1).unwrap();
            let last = t.len() - 1;
            let (row, col) = t.row_col(last);
            match direction {
                TransectDirection::West => assert_eq!(col, 10),
                TransectDirection::East => assert_eq!(col, 0),
                TransectDirection::North => assert_eq!(row, 8),
                TransectDirection::South => assert_eq!(row, 0),
            }
        }
    }

    #[test]
    fn test_spacing_and_coordinate() {
        let grid = create_grid(9, 11);
        let row = Transect::new(&grid, TransectDirection::West, 3, 1).unwrap();
        assert_eq!(row.spacing(), 2.0);
        assert_eq!(row.coordinate(), 191.0);

        let col = Transect::new(&grid, TransectDirection::South, 3, 1).unwrap();
        assert_eq!(col.spacing(), 3.0);
        assert_eq!(col.coordinate(), 106.0);
    }

    #[test]
    fn test_positions_stay_inside_interior() {
        let grid = create_grid(9, 11);
        let t = Transect::new(&grid, TransectDirection::West, 4, 2).unwrap();
        assert_eq!(t.positions(), 3..=7);

        // 端のトランセクトは走査しない
        assert!(Transect::new(&grid, TransectDirection::West, 1, 2).is_none());
        assert!(Transect::new(&grid, TransectDirection::West, 7, 2).is_none());
        assert_eq!(transects(&grid, TransectDirection::West, 2).count(), 5);
        assert_eq!(transects(&grid, TransectDirection::North, 2).count(), 7);
    }

    #[test]
    fn test_short_transect_has_no_positions() {
        let grid = create_grid(9, 6);
        assert!(Transect::new(&grid, TransectDirection::West, 4, 2).is_none());
    }

    #[test]
    fn test_feature_coordinates() {
        let grid = create_grid(9, 11);
        let t = Transect::new(&grid, TransectDirection::East, 4, 1).unwrap();
        let f = t.feature(3);
        assert_eq!((f.row, f.col), (4, 7));
        assert_eq!(f.x, 114.0);
        assert_eq!(f.y, 188.0);
        assert_eq!(f.z, (4 * 11 + 7) as f32);
        assert_eq!(t.z(3), f.z);
    }
}

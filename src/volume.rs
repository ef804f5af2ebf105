//! 体積と派生指標
//!
//! 汀線の標高を基準面とし、基準面以上の画素について
//! `(z - tShoreline) * xres * yres` を区間ごとに積算する。

use crate::extract::TransectFeatures;
use crate::model::{is_valid_elevation, UNFOUND};
use crate::transect::Transect;

/// 砂丘高さとして受け入れる上限（地図単位）
pub const MAX_DUNE_HEIGHT: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransectMetrics {
    pub beach_volume: f64,
    pub dune_volume: f64,
    pub island_volume: f64,
    pub dune_height: f64,
    pub beach_width: f64,
    pub island_width: f64,
}

impl Default for TransectMetrics {
    fn default() -> Self {
        Self {
            beach_volume: UNFOUND,
            dune_volume: UNFOUND,
            island_volume: UNFOUND,
            dune_height: UNFOUND,
            beach_width: UNFOUND,
            island_width: UNFOUND,
        }
    }
}

/// 正でない値は未検出として扱う
fn positive_or_unfound(value: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        UNFOUND
    }
}

/// 位置 `landward..=seaward` の基準面より上の体積
pub fn integrate_volume(t: &Transect, landward: usize, seaward: usize, datum: f64) -> f64 {
    let cell_area = t.spacing_area();
    (landward..=seaward.min(t.len() - 1))
        .map(|p| t.z(p))
        .filter(|&z| is_valid_elevation(z) && z as f64 >= datum)
        .map(|z| (z as f64 - datum) * cell_area)
        .sum()
}

/// 抽出済みの地形から体積・砂丘高さ・幅を求める
pub fn compute_metrics(t: &Transect, features: &TransectFeatures, datum: f64) -> TransectMetrics {
    let spacing = t.spacing();
    let mut metrics = TransectMetrics::default();

    let shoreline = features.shoreline.as_ref();
    let toe = features.dune_toe.as_ref();

    if let (Some(s), Some(toe)) = (shoreline, toe) {
        metrics.beach_volume =
            positive_or_unfound(integrate_volume(t, toe.position, s.position, datum));
        // 前縁は常に汀線より陸側にあるので幅は0以上
        metrics.beach_width = if toe.position <= s.position {
            (s.position - toe.position) as f64 * spacing
        } else {
            UNFOUND
        };
    }

    if let (Some(toe), Some(heel)) = (toe, features.dune_heel.as_ref()) {
        metrics.dune_volume =
            positive_or_unfound(integrate_volume(t, heel.position, toe.position, datum));
    }

    if let (Some(s), Some(bb)) = (shoreline, features.back_barrier.as_ref()) {
        metrics.island_volume =
            positive_or_unfound(integrate_volume(t, bb.position, s.position, datum));
        metrics.island_width =
            positive_or_unfound(s.position.saturating_sub(bb.position) as f64 * spacing);
    }

    if let (Some(toe), Some(crest)) = (toe, features.dune_crest.as_ref()) {
        let height = crest.z as f64 - toe.z as f64;
        if height > 0.0 && height < MAX_DUNE_HEIGHT {
            metrics.dune_height = height;
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DemGrid, Header};
    use crate::transect::TransectDirection;

    /// 1行目から3行目が同じ断面を持つ 3 x 12 グリッド（画素 2 x 0.5）
    fn create_grid(profile: [f32; 12]) -> DemGrid {
        let header = Header::new(12, 3, 2.0, 0.5, 0.0, 0.0);
        let z = (0..3).flat_map(|_| profile).collect();
        DemGrid::new(header, z).unwrap()
    }

    fn profile() -> [f32; 12] {
        [0.0, 0.0, 2.0, 3.0, 5.0, 6.0, 4.0, 3.0, 2.0, 1.0, -1.0, -1.0]
    }

    #[test]
    fn test_integrate_volume() {
        let grid = create_grid(profile());
        let t = Transect::new(&grid, TransectDirection::West, 1, 1).unwrap();
        // 基準面1.0: 列2..=9 の (z - 1) の和 = 1+2+4+5+3+2+1+0 = 18、画素面積 1.0
        assert_eq!(integrate_volume(&t, 2, 9, 1.0), 18.0);
        // 基準面未満の画素は寄与しない
        assert_eq!(integrate_volume(&t, 0, 1, 1.0), 0.0);
    }

    #[test]
    fn test_nodata_cells_do_not_contribute() {
        let mut p = profile();
        p[5] = -9999.0;
        let grid = create_grid(p);
        let t = Transect::new(&grid, TransectDirection::West, 1, 1).unwrap();
        assert_eq!(integrate_volume(&t, 2, 9, 1.0), 13.0);
    }

    #[test]
    fn test_metrics_require_features() {
        let grid = create_grid(profile());
        let t = Transect::new(&grid, TransectDirection::West, 1, 1).unwrap();

        let mut features = TransectFeatures {
            shoreline: Some(t.feature(9)),
            ..Default::default()
        };
        // 前縁がなければ海浜の体積と幅は未検出
        let metrics = compute_metrics(&t, &features, 1.0);
        assert_eq!(metrics, TransectMetrics::default());

        features.dune_toe = Some(t.feature(7));
        features.dune_crest = Some(t.feature(5));
        features.dune_heel = Some(t.feature(3));
        features.back_barrier = Some(t.feature(2));
        let metrics = compute_metrics(&t, &features, 1.0);

        // 列7..=9: 2 + 1 + 0
        assert_eq!(metrics.beach_volume, 3.0);
        assert_eq!(metrics.beach_width, 4.0);
        // 列3..=7: 2 + 4 + 5 + 3 + 2
        assert_eq!(metrics.dune_volume, 16.0);
        assert_eq!(metrics.island_volume, 18.0);
        assert_eq!(metrics.island_width, 14.0);
        assert_eq!(metrics.dune_height, 3.0);
    }

    #[test]
    fn test_non_positive_values_are_unfound() {
        let grid = create_grid(profile());
        let t = Transect::new(&grid, TransectDirection::West, 1, 1).unwrap();

        let features = TransectFeatures {
            shoreline: Some(t.feature(9)),
            dune_toe: Some(t.feature(9)),
            dune_crest: Some(t.feature(8)),
            back_barrier: Some(t.feature(9)),
            ..Default::default()
        };
        let metrics = compute_metrics(&t, &features, 1.0);

        // 列9は基準面と同じ高さで体積0
        assert_eq!(metrics.beach_volume, UNFOUND);
        assert_eq!(metrics.beach_width, 0.0);
        assert_eq!(metrics.island_volume, UNFOUND);
        assert_eq!(metrics.island_width, UNFOUND);
        // 頂部が前縁より高い: 2.0 - 1.0
        assert_eq!(metrics.dune_height, 1.0);
    }

    #[test]
    fn test_dune_height_limits() {
        let mut p = profile();
        p[5] = 400.0;
        let grid = create_grid(p);
        let t = Transect::new(&grid, TransectDirection::West, 1, 1).unwrap();

        let features = TransectFeatures {
            shoreline: Some(t.feature(9)),
            dune_toe: Some(t.feature(7)),
            dune_crest: Some(t.feature(5)),
            ..Default::default()
        };
        assert_eq!(compute_metrics(&t, &features, 1.0).dune_height, UNFOUND);
    }

    #[test]
    fn test_column_transect_uses_y_spacing() {
        let grid = create_grid(profile());
        let t = Transect::new(&grid, TransectDirection::North, 5, 0).unwrap();
        assert_eq!(t.spacing(), 0.5);
        assert_eq!(t.spacing_area(), 1.0);
    }
}

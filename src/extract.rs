//! トランセクトごとの地形抽出
//!
//! 汀線、砂丘前縁（toe）、砂丘頂部（crest）、砂丘後縁（heel）、
//! バックバリアの順に、海側から陸側へ閾値の交差を探す。
//! 各段は前段の結果だけを受け取る純粋関数で、前段が見つからなければ実行しない。

use crate::model::{is_nodata, is_valid_elevation, DemGrid, Landform};
use crate::params::{DistanceRange, Params};
use crate::transect::Transect;

/// 抽出された地形点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    /// トランセクト上の位置（行トランセクトでは列番号）
    pub position: usize,
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
    pub z: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransectFeatures {
    pub shoreline: Option<Feature>,
    pub dune_toe: Option<Feature>,
    pub dune_crest: Option<Feature>,
    pub dune_heel: Option<Feature>,
    pub back_barrier: Option<Feature>,
}

impl TransectFeatures {
    pub fn get(&self, landform: Landform) -> Option<&Feature> {
        match landform {
            Landform::Shoreline => self.shoreline.as_ref(),
            Landform::DuneToe => self.dune_toe.as_ref(),
            Landform::DuneCrest => self.dune_crest.as_ref(),
            Landform::DuneHeel => self.dune_heel.as_ref(),
            Landform::BackBarrier => self.back_barrier.as_ref(),
        }
    }

    /// 見つかった地形の数
    pub fn found(&self) -> usize {
        Landform::ALL
            .iter()
            .filter(|&&l| self.get(l).is_some())
            .count()
    }
}

#[inline]
fn crosses_up(inner: f32, outer: f32, threshold: f64) -> bool {
    (outer as f64) < threshold && (inner as f64) >= threshold
}

/// 汀線: 海側の標高が閾値未満、その陸側が閾値以上となる最初の位置
pub fn find_shoreline(t: &Transect, threshold: f64) -> Option<Feature> {
    t.positions()
        .rev()
        .find(|&p| {
            let (inner, outer) = (t.z(p), t.z(p + 1));
            is_valid_elevation(inner)
                && is_valid_elevation(outer)
                && crosses_up(inner, outer, threshold)
        })
        .map(|p| t.feature(p))
}

/// 砂丘前縁: 汀線から所定の距離内で、平均相対起伏が海側から閾値を超える位置
pub fn find_dune_toe(
    t: &Transect,
    shoreline: &Feature,
    threshold: f64,
    distance: DistanceRange,
) -> Option<Feature> {
    let spacing = t.spacing();
    t.positions()
        .rev()
        .filter(|&p| p < shoreline.position)
        .filter(|&p| distance.contains((shoreline.position - p) as f64 * spacing))
        .find(|&p| {
            let (inner, outer) = (t.avg(p), t.avg(p + 1));
            !is_nodata(inner) && !is_nodata(outer) && crosses_up(inner, outer, threshold)
        })
        .map(|p| t.feature(p))
}

/// 砂丘頂部: 前縁より陸側、前縁より高い位置で閾値を超える点
pub fn find_dune_crest(
    t: &Transect,
    toe: &Feature,
    threshold: f64,
    distance: DistanceRange,
) -> Option<Feature> {
    let spacing = t.spacing();
    t.positions()
        .rev()
        .filter(|&p| p < toe.position)
        .filter(|&p| distance.contains((toe.position - p) as f64 * spacing))
        .find(|&p| {
            let (here, landward) = (t.avg(p), t.avg(p - 1));
            let z = t.z(p);
            !is_nodata(here)
                && !is_nodata(landward)
                && is_valid_elevation(z)
                && z > toe.z
                && crosses_up(here, landward, threshold)
        })
        .map(|p| t.feature(p))
}

/// 砂丘後縁: 頂部より陸側で閾値を超える点
pub fn find_dune_heel(
    t: &Transect,
    crest: &Feature,
    threshold: f64,
    distance: DistanceRange,
) -> Option<Feature> {
    let spacing = t.spacing();
    t.positions()
        .rev()
        .filter(|&p| p < crest.position)
        .filter(|&p| distance.contains((crest.position - p) as f64 * spacing))
        .find(|&p| {
            let (here, landward) = (t.avg(p), t.avg(p - 1));
            !is_nodata(here)
                && !is_nodata(landward)
                && is_valid_elevation(t.z(p))
                && crosses_up(here, landward, threshold)
        })
        .map(|p| t.feature(p))
}

/// バックバリア: `start` から陸側へ、陸側の隣の標高が閾値未満になる位置
pub fn find_back_barrier(t: &Transect, start: usize, threshold: f64) -> Option<Feature> {
    t.positions()
        .rev()
        .filter(|&p| p <= start)
        .find(|&p| {
            let z = t.z(p);
            is_valid_elevation(z) && crosses_up(z, t.z(p - 1), threshold)
        })
        .map(|p| t.feature(p))
}

/// バックバリア探索の開始位置（後縁、頂部、前縁、汀線の順で最も陸側の地形）
pub fn back_barrier_start(features: &TransectFeatures) -> Option<usize> {
    features
        .dune_heel
        .or(features.dune_crest)
        .or(features.dune_toe)
        .or(features.shoreline)
        .map(|f| f.position)
}

/// 1本のトランセクトから全ての地形を抽出する
pub fn extract_features(t: &Transect, params: &Params) -> TransectFeatures {
    let thresholds = &params.thresholds;

    let shoreline = find_shoreline(t, thresholds.shoreline);
    let dune_toe = shoreline
        .as_ref()
        .and_then(|s| find_dune_toe(t, s, thresholds.dune_toe, params.dune_distance));
    let dune_crest = dune_toe
        .as_ref()
        .and_then(|toe| find_dune_crest(t, toe, thresholds.dune_crest, params.crest_distance));
    let dune_heel = dune_crest
        .as_ref()
        .and_then(|crest| find_dune_heel(t, crest, thresholds.dune_heel, params.heel_distance));

    let mut features = TransectFeatures {
        shoreline,
        dune_toe,
        dune_crest,
        dune_heel,
        back_barrier: None,
    };
    features.back_barrier = back_barrier_start(&features)
        .and_then(|start| find_back_barrier(t, start, thresholds.back_barrier));
    features
}

/// 見つかった地形の指標レイヤに1を立てる
pub fn mark_indicators(grid: &mut DemGrid, features: &TransectFeatures) {
    for landform in Landform::ALL {
        if let Some(f) = features.get(landform) {
            let idx = grid.index(f.row, f.col);
            grid.mark(landform, idx);
        }
    }
}

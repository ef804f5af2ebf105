use crate::error::{Error, Result};
use crate::extract::TransectFeatures;
use crate::transect::TransectDirection;
use crate::volume::TransectMetrics;

/// 計算値の欠損値（相対起伏・出力ラスタのNoData）
pub const NODATA: f32 = -9999.0;

/// 地形が見つからなかった場合の出力値
pub const UNFOUND: f64 = -99999.0;

/// この値以下の標高は欠損として扱う
pub const ELEVATION_FLOOR: f32 = -100.0;

#[inline]
pub fn is_valid_elevation(z: f32) -> bool {
    // NaNもここで弾かれる
    z > ELEVATION_FLOOR
}

#[inline]
pub fn is_nodata(value: f32) -> bool {
    value == NODATA
}

/// ENVIヘッダの `map info` に含まれる投影情報
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapInfo {
    pub projection: String,
    pub zone: Option<String>,
    pub hemisphere: Option<String>,
    pub datum: Option<String>,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub description: String,
    pub ncols: usize,
    pub nlines: usize,
    pub bands: usize,
    pub xres: f64,
    pub yres: f64,
    /// 左上隅の座標
    pub ulx: f64,
    pub uly: f64,
    pub map_info: Option<MapInfo>,
    /// WKT形式の座標系
    pub projection: Option<String>,
    /// 入力データで宣言されていた欠損値
    pub nodata: Option<f64>,
}

impl Header {
    pub fn new(ncols: usize, nlines: usize, xres: f64, yres: f64, ulx: f64, uly: f64) -> Self {
        Self {
            description: String::new(),
            ncols,
            nlines,
            bands: 1,
            xres,
            yres,
            ulx,
            uly,
            map_info: None,
            projection: None,
            nodata: None,
        }
    }

    /// GDAL形式のジオトランスフォームから作成（回転成分は無視）
    pub fn from_geo_transform(ncols: usize, nlines: usize, gt: [f64; 6]) -> Self {
        Self::new(ncols, nlines, gt[1], gt[5].abs(), gt[0], gt[3])
    }

    pub fn npix(&self) -> usize {
        self.ncols * self.nlines
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nlines, self.ncols)
    }

    pub fn geo_transform(&self) -> [f64; 6] {
        [self.ulx, self.xres, 0.0, self.uly, 0.0, -self.yres]
    }

    pub fn cell_x(&self, col: usize) -> f64 {
        self.ulx + col as f64 * self.xres
    }

    pub fn cell_y(&self, row: usize) -> f64 {
        self.uly - row as f64 * self.yres
    }

    pub fn pixel_area(&self) -> f64 {
        self.xres * self.yres
    }

    /// 右端の列のx座標
    pub fn xmax(&self) -> f64 {
        self.cell_x(self.ncols.saturating_sub(1))
    }

    /// 下端の行のy座標
    pub fn ymin(&self) -> f64 {
        self.cell_y(self.nlines.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landform {
    Shoreline,
    DuneToe,
    DuneCrest,
    DuneHeel,
    BackBarrier,
}

impl Landform {
    pub const ALL: [Landform; 5] = [
        Landform::Shoreline,
        Landform::DuneToe,
        Landform::DuneCrest,
        Landform::DuneHeel,
        Landform::BackBarrier,
    ];

    /// CSVの列名に使う名前
    pub fn label(self) -> &'static str {
        match self {
            Landform::Shoreline => "shoreline",
            Landform::DuneToe => "dunetoe",
            Landform::DuneCrest => "dunecrest",
            Landform::DuneHeel => "duneheel",
            Landform::BackBarrier => "backbarrier",
        }
    }

    /// 出力ラスタのファイル名サフィックス
    pub fn suffix(self) -> &'static str {
        match self {
            Landform::Shoreline => "shoreline",
            Landform::DuneToe => "dune_toe",
            Landform::DuneCrest => "dune_crest",
            Landform::DuneHeel => "dune_heel",
            Landform::BackBarrier => "backbarrier_shoreline",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReliefLayer {
    Res,
    ResPlus1,
    ResPlus2,
    Avg,
}

impl ReliefLayer {
    pub const ALL: [ReliefLayer; 4] = [
        ReliefLayer::Res,
        ReliefLayer::ResPlus1,
        ReliefLayer::ResPlus2,
        ReliefLayer::Avg,
    ];
}

/// 標高グリッドと画素ごとの派生レイヤ（行優先）
#[derive(Debug, Clone)]
pub struct DemGrid {
    pub header: Header,
    pub z: Vec<f32>,
    /// 有効な標高を持つ画素
    pub complete: Vec<bool>,
    pub res: Vec<f32>,
    pub res_plus1: Vec<f32>,
    pub res_plus2: Vec<f32>,
    pub avg: Vec<f32>,
    indicators: [Vec<u8>; 5],
}

impl DemGrid {
    pub fn new(header: Header, z: Vec<f32>) -> Result<Self> {
        let npix = header.npix();
        if npix == 0 {
            return Err(Error::Input(format!(
                "raster has no pixels ({} x {})",
                header.ncols, header.nlines
            )));
        }
        if z.len() != npix {
            return Err(Error::SizeMismatch {
                expected: npix,
                actual: z.len(),
            });
        }

        let complete = z.iter().map(|&v| is_valid_elevation(v)).collect();

        Ok(Self {
            header,
            z,
            complete,
            res: vec![NODATA; npix],
            res_plus1: vec![NODATA; npix],
            res_plus2: vec![NODATA; npix],
            avg: vec![NODATA; npix],
            indicators: std::array::from_fn(|_| vec![0; npix]),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.header.shape()
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.header.ncols + col
    }

    pub fn x(&self, idx: usize) -> f64 {
        self.header.cell_x(idx % self.header.ncols)
    }

    pub fn y(&self, idx: usize) -> f64 {
        self.header.cell_y(idx / self.header.ncols)
    }

    /// 画像端から `buffer` 画素以上内側にあるか
    pub fn is_interior(&self, row: usize, col: usize, buffer: usize) -> bool {
        let (nlines, ncols) = self.shape();
        row >= buffer && row + buffer < nlines && col >= buffer && col + buffer < ncols
    }

    pub fn relief(&self, layer: ReliefLayer) -> &[f32] {
        match layer {
            ReliefLayer::Res => &self.res,
            ReliefLayer::ResPlus1 => &self.res_plus1,
            ReliefLayer::ResPlus2 => &self.res_plus2,
            ReliefLayer::Avg => &self.avg,
        }
    }

    pub fn indicator(&self, landform: Landform) -> &[u8] {
        &self.indicators[landform.index()]
    }

    pub fn mark(&mut self, landform: Landform, idx: usize) {
        self.indicators[landform.index()][idx] = 1;
    }

    pub fn clear_indicators(&mut self) {
        for layer in self.indicators.iter_mut() {
            layer.fill(0);
        }
    }

    /// 指標レイヤを出力用の浮動小数点値に変換
    pub fn indicator_as_f32(&self, landform: Landform) -> Vec<f32> {
        self.indicator(landform).iter().map(|&v| v as f32).collect()
    }

    /// 有効な標高の最小値と最大値
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        self.z
            .iter()
            .copied()
            .filter(|&v| is_valid_elevation(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// 1本のトランセクトの抽出結果
#[derive(Debug, Clone, PartialEq)]
pub struct TransectRecord {
    pub direction: TransectDirection,
    /// 行トランセクトなら行番号、列トランセクトなら列番号
    pub index: usize,
    /// トランセクトに直交する座標（行ならy、列ならx）
    pub coordinate: f64,
    pub features: TransectFeatures,
    pub metrics: TransectMetrics,
}

impl TransectRecord {
    pub fn has_shoreline(&self) -> bool {
        self.features.shoreline.is_some()
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Landform, ReliefLayer};
use crate::relief::ReliefAverage;
use crate::transect::TransectDirection;

pub const DEFAULT_PARAMS_FILE: &str = "params_rr.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Dem,
    Rr,
    Rr1,
    Rr2,
    AvgRr,
    Rrs,
    Shoreline,
    DuneToe,
    DuneCrest,
    DuneHeel,
    BackBarrier,
    Landforms,
    All,
}

impl FromStr for Product {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let product = match s.trim().to_ascii_lowercase().as_str() {
            "dem" => Product::Dem,
            "rr" => Product::Rr,
            "rr1" => Product::Rr1,
            "rr2" => Product::Rr2,
            "avgrr" => Product::AvgRr,
            "rrs" => Product::Rrs,
            "shoreline" => Product::Shoreline,
            "dunetoe" => Product::DuneToe,
            "dunecrest" => Product::DuneCrest,
            "duneheel" => Product::DuneHeel,
            "backbarrier" => Product::BackBarrier,
            "landforms" => Product::Landforms,
            "all" => Product::All,
            other => return Err(Error::Config(format!("unknown output product '{}'", other))),
        };
        Ok(product)
    }
}

impl Product {
    fn landform(self) -> Option<Landform> {
        match self {
            Product::Shoreline => Some(Landform::Shoreline),
            Product::DuneToe => Some(Landform::DuneToe),
            Product::DuneCrest => Some(Landform::DuneCrest),
            Product::DuneHeel => Some(Landform::DuneHeel),
            Product::BackBarrier => Some(Landform::BackBarrier),
            _ => None,
        }
    }
}

/// 出力プロダクトの組み合わせ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Products(Vec<Product>);

impl Products {
    pub fn new(products: Vec<Product>) -> Result<Self> {
        if products.is_empty() {
            return Err(Error::Config("no output product selected".to_string()));
        }
        let mut unique = Vec::with_capacity(products.len());
        for p in products {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        Ok(Self(unique))
    }

    pub fn contains(&self, product: Product) -> bool {
        self.0.contains(&product)
    }

    pub fn iter(&self) -> impl Iterator<Item = Product> + '_ {
        self.0.iter().copied()
    }

    pub fn wants_all(&self) -> bool {
        self.contains(Product::All)
    }

    pub fn wants_dem(&self) -> bool {
        self.wants_all() || self.contains(Product::Dem)
    }

    pub fn wants_relief(&self, layer: ReliefLayer) -> bool {
        if self.wants_all() || self.contains(Product::Rrs) {
            return true;
        }
        let product = match layer {
            ReliefLayer::Res => Product::Rr,
            ReliefLayer::ResPlus1 => Product::Rr1,
            ReliefLayer::ResPlus2 => Product::Rr2,
            ReliefLayer::Avg => Product::AvgRr,
        };
        self.contains(product)
    }

    /// 全地形と体積を含むCSVを出力するか
    pub fn wants_metrics(&self) -> bool {
        self.wants_all() || self.contains(Product::Landforms)
    }

    pub fn wants_landform(&self, landform: Landform) -> bool {
        self.wants_metrics() || self.0.iter().any(|p| p.landform() == Some(landform))
    }

    /// 個別に指定された地形（指定順）
    pub fn selected_landforms(&self) -> Vec<Landform> {
        self.0.iter().filter_map(|p| p.landform()).collect()
    }

    pub fn needs_extraction(&self) -> bool {
        Landform::ALL.iter().any(|&l| self.wants_landform(l))
    }

    pub fn needs_relief(&self) -> bool {
        self.needs_extraction() || ReliefLayer::ALL.iter().any(|&l| self.wants_relief(l))
    }
}

impl FromStr for Products {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let products = s
            .split(|c: char| c == ',' || c == '+')
            .filter(|p| !p.trim().is_empty())
            .map(Product::from_str)
            .collect::<Result<Vec<_>>>()?;
        Products::new(products)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Ascii,
    Envi,
    #[default]
    Both,
    GeoTiff,
}

impl OutputFormat {
    pub fn writes_ascii(self) -> bool {
        matches!(self, OutputFormat::Ascii | OutputFormat::Both)
    }

    pub fn writes_raster(self) -> bool {
        !matches!(self, OutputFormat::Ascii)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" => Ok(OutputFormat::Ascii),
            "envi" => Ok(OutputFormat::Envi),
            "both" => Ok(OutputFormat::Both),
            "geotiff" | "tiff" | "gtiff" => Ok(OutputFormat::GeoTiff),
            other => Err(Error::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// 距離の範囲（両端を含まない）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceRange {
    pub min: f64,
    pub max: f64,
}

impl DistanceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, distance: f64) -> bool {
        self.min < distance && distance < self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// 汀線の標高
    pub shoreline: f64,
    /// 砂丘前縁の相対起伏
    pub dune_toe: f64,
    /// 砂丘頂部の相対起伏
    pub dune_crest: f64,
    /// 砂丘後縁の相対起伏
    pub dune_heel: f64,
    /// バックバリアの標高
    pub back_barrier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub input: PathBuf,
    pub window_size: usize,
    pub products: Products,
    pub format: OutputFormat,
    pub thresholds: Thresholds,
    /// 汀線から砂丘前縁まで
    pub dune_distance: DistanceRange,
    /// 砂丘前縁から頂部まで
    pub crest_distance: DistanceRange,
    /// 頂部から後縁まで
    pub heel_distance: DistanceRange,
    pub direction: TransectDirection,
    pub relief_average: ReliefAverage,
}

/// 窓サイズを検証する。偶数は次の奇数に繰り上げる。
pub fn normalize_window_size(size: i64) -> Result<usize> {
    let corrected = if size.rem_euclid(2) == 0 {
        warn!(
            "Window size {} is even; using {} instead",
            size,
            size + 1
        );
        size + 1
    } else {
        size
    };

    if corrected < 3 {
        return Err(Error::InvalidWindowSize(size));
    }
    Ok(corrected as usize)
}

impl Params {
    pub fn buffer(&self) -> usize {
        (self.window_size - 1) / 2
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read parameter file {}: {}", path.display(), e))
        })?;
        info!("Reading parameters from {}", path.display());
        text.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Input,
    WindowSize,
    Product,
    Format,
    Shoreline,
    DuneToe,
    DuneCrest,
    DuneHeel,
    BackBarrier,
    DuneDistMin,
    DuneDistMax,
    CrestDistMin,
    CrestDistMax,
    HeelDistMin,
    HeelDistMax,
    Direction,
    ReliefAverage,
}

impl Key {
    /// パラメータファイルでの並び順
    const ORDER: [Key; 17] = [
        Key::Input,
        Key::WindowSize,
        Key::Product,
        Key::Format,
        Key::Shoreline,
        Key::DuneToe,
        Key::DuneCrest,
        Key::DuneHeel,
        Key::BackBarrier,
        Key::DuneDistMin,
        Key::DuneDistMax,
        Key::CrestDistMin,
        Key::CrestDistMax,
        Key::HeelDistMin,
        Key::HeelDistMax,
        Key::Direction,
        Key::ReliefAverage,
    ];

    fn from_label(label: &str) -> Option<Key> {
        let normalized: String = label
            .trim_end_matches([':', '='])
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        let key = match normalized.as_str() {
            "ifile" | "input" | "inputfile" | "filename" => Key::Input,
            "iwindowsize" | "windowsize" | "window" => Key::WindowSize,
            "oproduct" | "product" | "products" => Key::Product,
            "oformat" | "format" => Key::Format,
            "tshoreline" => Key::Shoreline,
            "tdt" | "tdunetoe" => Key::DuneToe,
            "tdc" | "tdunecrest" => Key::DuneCrest,
            "tdh" | "tduneheel" => Key::DuneHeel,
            "tbb" | "tbackbarrier" => Key::BackBarrier,
            "tdunedistmin" => Key::DuneDistMin,
            "tdunedistmax" => Key::DuneDistMax,
            "tcrestdistmin" => Key::CrestDistMin,
            "tcrestdistmax" => Key::CrestDistMax,
            "theeldistmin" => Key::HeelDistMin,
            "theeldistmax" => Key::HeelDistMax,
            "transectdirection" | "direction" => Key::Direction,
            "reliefaverage" | "average" => Key::ReliefAverage,
            _ => return None,
        };
        Some(key)
    }

    fn name(self) -> &'static str {
        match self {
            Key::Input => "input file",
            Key::WindowSize => "window size",
            Key::Product => "output product",
            Key::Format => "output format",
            Key::Shoreline => "tShoreline",
            Key::DuneToe => "tDT",
            Key::DuneCrest => "tDC",
            Key::DuneHeel => "tDH",
            Key::BackBarrier => "tBB",
            Key::DuneDistMin => "tDuneDistMin",
            Key::DuneDistMax => "tDuneDistMax",
            Key::CrestDistMin => "tCrestDistMin",
            Key::CrestDistMax => "tCrestDistMax",
            Key::HeelDistMin => "tHeelDistMin",
            Key::HeelDistMax => "tHeelDistMax",
            Key::Direction => "transect direction",
            Key::ReliefAverage => "relief average",
        }
    }
}

/// `ラベル 値` の組を読み込んだ途中状態
#[derive(Default)]
struct RawParams {
    values: Vec<(Key, String)>,
}

impl RawParams {
    fn get(&self, key: Key) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: Key) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("missing parameter: {}", key.name())))
    }

    fn number(&self, key: Key) -> Result<f64> {
        let value = self.require(key)?;
        value.parse::<f64>().map_err(|_| {
            Error::Config(format!("{} must be a number, got '{}'", key.name(), value))
        })
    }
}

impl FromStr for Params {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let tokens: Vec<&str> = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .flat_map(str::split_whitespace)
            .collect();

        if tokens.len() % 2 != 0 {
            return Err(Error::Config(format!(
                "parameter file must contain label/value pairs, found {} tokens",
                tokens.len()
            )));
        }

        let mut raw = RawParams::default();
        for (position, pair) in tokens.chunks(2).enumerate() {
            let (label, value) = (pair[0], pair[1]);
            let key = match Key::from_label(label) {
                Some(key) => key,
                None => {
                    // 未知のラベルは並び順で解釈する
                    let key = Key::ORDER.get(position).copied().ok_or_else(|| {
                        Error::Config(format!("unexpected parameter '{}' = '{}'", label, value))
                    })?;
                    warn!(
                        "Unknown parameter label '{}'; reading it as {}",
                        label,
                        key.name()
                    );
                    key
                }
            };
            raw.values.push((key, value.to_string()));
        }

        let window = raw.require(Key::WindowSize)?;
        let window = window.parse::<i64>().map_err(|_| {
            Error::Config(format!("window size must be an integer, got '{}'", window))
        })?;

        Ok(Params {
            input: PathBuf::from(raw.require(Key::Input)?),
            window_size: normalize_window_size(window)?,
            products: raw.require(Key::Product)?.parse()?,
            format: raw.require(Key::Format)?.parse()?,
            thresholds: Thresholds {
                shoreline: raw.number(Key::Shoreline)?,
                dune_toe: raw.number(Key::DuneToe)?,
                dune_crest: raw.number(Key::DuneCrest)?,
                dune_heel: raw.number(Key::DuneHeel)?,
                back_barrier: raw.number(Key::BackBarrier)?,
            },
            dune_distance: DistanceRange::new(
                raw.number(Key::DuneDistMin)?,
                raw.number(Key::DuneDistMax)?,
            ),
            crest_distance: DistanceRange::new(
                raw.number(Key::CrestDistMin)?,
                raw.number(Key::CrestDistMax)?,
            ),
            heel_distance: DistanceRange::new(
                raw.number(Key::HeelDistMin)?,
                raw.number(Key::HeelDistMax)?,
            ),
            direction: match raw.get(Key::Direction) {
                Some(d) => d.parse()?,
                None => TransectDirection::default(),
            },
            relief_average: match raw.get(Key::ReliefAverage) {
                Some(a) => a.parse()?,
                None => ReliefAverage::default(),
            },
        })
    }
}

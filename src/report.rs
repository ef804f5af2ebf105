//! トランセクトごとの地形と指標のCSV出力

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::extract::Feature;
use crate::model::{Landform, TransectRecord, UNFOUND};
use crate::params::Products;
use crate::transect::TransectDirection;

/// 出力ファイル名の末尾
pub const REPORT_SUFFIX: &str = "_ISLAND_METRICS.csv";

pub fn report_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}{}", stem, REPORT_SUFFIX))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLayout {
    /// 全地形と体積・幅（汀線のあるトランセクトのみ）
    Full,
    /// 指定された地形の座標と標高（いずれかが見つかったトランセクトのみ）
    Features(Vec<Landform>),
}

impl ReportLayout {
    /// 出力プロダクトからレイアウトを決める。CSVが不要なら `None`。
    pub fn from_products(products: &Products) -> Option<Self> {
        if products.wants_metrics() {
            return Some(ReportLayout::Full);
        }
        let landforms = products.selected_landforms();
        if landforms.is_empty() {
            None
        } else {
            Some(ReportLayout::Features(landforms))
        }
    }

    fn landforms(&self) -> &[Landform] {
        match self {
            ReportLayout::Full => &Landform::ALL[..],
            ReportLayout::Features(landforms) => landforms.as_slice(),
        }
    }
}

pub struct AsciiReport<W: Write> {
    writer: W,
    layout: ReportLayout,
    direction: TransectDirection,
    rows: usize,
}

impl<W: Write> AsciiReport<W> {
    /// ヘッダ行を書き込んで作成
    pub fn new(mut writer: W, layout: ReportLayout, direction: TransectDirection) -> Result<Self> {
        let (cross, along) = if direction.is_row() {
            ("ycoordinate", "X")
        } else {
            ("xcoordinate", "Y")
        };

        let mut columns = vec![cross.to_string()];
        for landform in layout.landforms() {
            columns.push(format!("{}{}", landform.label(), along));
            columns.push(format!("{}Z", landform.label()));
        }
        if layout == ReportLayout::Full {
            columns.extend(
                [
                    "beach_width",
                    "beach_vol",
                    "dune_height",
                    "dune_vol",
                    "island_width",
                    "island_volume",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        writeln!(writer, "{}", columns.join(", "))?;

        Ok(Self {
            writer,
            layout,
            direction,
            rows: 0,
        })
    }

    /// 出力対象なら1行書き込み、書き込んだかを返す
    pub fn write_record(&mut self, record: &TransectRecord) -> Result<bool> {
        let features = &record.features;
        let include = match &self.layout {
            ReportLayout::Full => record.has_shoreline(),
            ReportLayout::Features(landforms) => {
                landforms.iter().any(|&l| features.get(l).is_some())
            }
        };
        if !include {
            return Ok(false);
        }

        let mut values = vec![record.coordinate];
        for &landform in self.layout.landforms() {
            let (along, z) = along_and_z(features.get(landform), self.direction);
            values.push(along);
            values.push(z);
        }
        if self.layout == ReportLayout::Full {
            let m = &record.metrics;
            values.extend([
                m.beach_width,
                m.beach_volume,
                m.dune_height,
                m.dune_volume,
                m.island_width,
                m.island_volume,
            ]);
        }

        let line: Vec<String> = values.iter().map(|v| format!("{:.6}", v)).collect();
        writeln!(self.writer, "{}", line.join(", "))?;
        self.rows += 1;
        Ok(true)
    }

    /// 書き込んだデータ行の数
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// 見つからなかった地形は座標0、標高 -99999
fn along_and_z(feature: Option<&Feature>, direction: TransectDirection) -> (f64, f64) {
    match feature {
        Some(f) if direction.is_row() => (f.x, f.z as f64),
        Some(f) => (f.y, f.z as f64),
        None => (0.0, UNFOUND),
    }
}

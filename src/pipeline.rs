//! 1つのDEMに対する処理の流れ
//!
//! 読み込み → 相対起伏 → トランセクトごとの地形抽出と体積 → CSV・ラスタ出力。
//! CSVとラスタは互いに独立して書き出し、片方の失敗がもう片方を妨げない。

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::extract::{extract_features, mark_indicators};
use crate::model::{DemGrid, Landform, ReliefLayer, TransectRecord};
use crate::params::Params;
use crate::reader::read_dem;
use crate::relief::{compute_relief, window_sizes};
use crate::report::{report_path, AsciiReport, ReportLayout};
use crate::transect::transects;
use crate::volume::compute_metrics;
use crate::writer::raster_writer;

/// 1回の実行結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub input: PathBuf,
    /// 走査したトランセクト数
    pub transects: usize,
    pub shorelines_found: usize,
    pub ascii: Option<PathBuf>,
    pub rasters: Vec<PathBuf>,
}

/// 相対起伏を計算し、全トランセクトから地形と指標を抽出する
///
/// 指標レイヤは計算し直されるため、同じグリッドに何度実行しても結果は変わらない。
pub fn analyze(grid: &mut DemGrid, params: &Params) -> Vec<TransectRecord> {
    let buffer = params.buffer();
    compute_relief(grid, buffer, params.relief_average);

    let datum = params.thresholds.shoreline;
    let records: Vec<TransectRecord> = transects(grid, params.direction, buffer)
        .map(|t| {
            let features = extract_features(&t, params);
            let metrics = compute_metrics(&t, &features, datum);
            TransectRecord {
                direction: t.direction(),
                index: t.index(),
                coordinate: t.coordinate(),
                features,
                metrics,
            }
        })
        .collect();

    for record in &records {
        mark_indicators(grid, &record.features);
    }

    info!(
        "Extracted landforms from {} transects ({} with a shoreline)",
        records.len(),
        records.iter().filter(|r| r.has_shoreline()).count()
    );
    records
}

/// 出力ファイル名の基になる入力ファイル名
pub fn output_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dem".to_string())
}

fn relief_suffix(layer: ReliefLayer, buffer: usize) -> String {
    let sizes = window_sizes(buffer);
    match layer {
        ReliefLayer::Res => format!("rr{}", sizes[0]),
        ReliefLayer::ResPlus1 => format!("rr{}", sizes[1]),
        ReliefLayer::ResPlus2 => format!("rr{}", sizes[2]),
        ReliefLayer::Avg => "rr_avg".to_string(),
    }
}

/// 要求された出力レイヤ（サフィックスとデータ）
fn requested_layers(grid: &DemGrid, params: &Params) -> Vec<(String, Vec<f32>)> {
    let products = &params.products;
    let mut layers = Vec::new();

    if products.wants_dem() {
        layers.push(("dem".to_string(), grid.z.clone()));
    }
    for layer in ReliefLayer::ALL {
        if products.wants_relief(layer) {
            layers.push((relief_suffix(layer, params.buffer()), grid.relief(layer).to_vec()));
        }
    }
    for landform in Landform::ALL {
        if products.wants_landform(landform) {
            layers.push((landform.suffix().to_string(), grid.indicator_as_f32(landform)));
        }
    }
    layers
}

fn write_report(
    records: &[TransectRecord],
    layout: ReportLayout,
    params: &Params,
    path: &Path,
) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut report = AsciiReport::new(file, layout, params.direction)?;
    for record in records {
        report.write_record(record)?;
    }
    info!("Wrote {} ({} rows)", path.display(), report.rows());
    report.finish()?;
    Ok(())
}

fn write_rasters(
    grid: &DemGrid,
    params: &Params,
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let writer = raster_writer(params.format)?;
    requested_layers(grid, params)
        .into_iter()
        .map(|(suffix, data)| {
            let name = format!("{}_{}", stem, suffix);
            writer.write_layer(&grid.header, &name, &data, &output_dir.join(&name))
        })
        .collect()
}

/// パラメータに従って1つのDEMを処理し、出力を書き出す
///
/// `output_dir` が `None` の場合は入力ファイルと同じディレクトリに出力する。
pub fn run(params: &Params, output_dir: Option<&Path>) -> Result<RunSummary> {
    info!("Processing {}", params.input.display());
    let mut grid = read_dem(&params.input)?;

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => params
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    fs::create_dir_all(&output_dir)?;
    let stem = output_stem(&params.input);

    let records = if params.products.needs_relief() {
        analyze(&mut grid, params)
    } else {
        Vec::new()
    };

    let mut summary = RunSummary {
        input: params.input.clone(),
        transects: records.len(),
        shorelines_found: records.iter().filter(|r| r.has_shoreline()).count(),
        ..Default::default()
    };
    let mut failure = None;

    if params.format.writes_ascii() {
        if let Some(layout) = ReportLayout::from_products(&params.products) {
            let path = report_path(&output_dir, &stem);
            match write_report(&records, layout, params, &path) {
                Ok(()) => summary.ascii = Some(path),
                Err(e) => {
                    error!("Failed to write {}: {}", path.display(), e);
                    failure = Some(Error::output("ascii", e));
                }
            }
        }
    }

    if params.format.writes_raster() {
        match write_rasters(&grid, params, &output_dir, &stem) {
            Ok(paths) => summary.rasters = paths,
            Err(e) => {
                error!("Failed to write raster layers for {}: {}", stem, e);
                failure.get_or_insert(Error::output("raster", e));
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// 複数のDEMを並列に処理する（各DEMの処理自体は逐次）
pub fn run_batch(
    inputs: &[PathBuf],
    params: &Params,
    output_dir: Option<&Path>,
) -> Vec<(PathBuf, Result<RunSummary>)> {
    inputs
        .par_iter()
        .map(|input| {
            let params = Params {
                input: input.clone(),
                ..params.clone()
            };
            (input.clone(), run(&params, output_dir))
        })
        .collect()
}

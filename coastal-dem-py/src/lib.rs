use ::coastal_dem::model::{Header, Landform, ReliefLayer};
use ::coastal_dem::params::{normalize_window_size, Params};
use ::coastal_dem::relief::{compute_relief, ReliefAverage};
use ::coastal_dem::{analyze, read_dem, DemGrid, Feature, RunSummary, TransectRecord};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::path::{Path, PathBuf};

#[pymodule]
fn coastal_dem(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFeature>()?;
    m.add_class::<PyTransectRecord>()?;
    m.add_class::<PyRunSummary>()?;
    m.add_function(wrap_pyfunction!(relative_relief, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_dem, m)?)?;
    m.add_function(wrap_pyfunction!(run, m)?)?;
    Ok(())
}

#[pyclass(name = "Feature")]
#[derive(Clone)]
pub struct PyFeature {
    #[pyo3(get)]
    pub position: usize,
    #[pyo3(get)]
    pub row: usize,
    #[pyo3(get)]
    pub col: usize,
    #[pyo3(get)]
    pub x: f64,
    #[pyo3(get)]
    pub y: f64,
    #[pyo3(get)]
    pub z: f32,
}

impl From<Feature> for PyFeature {
    fn from(f: Feature) -> Self {
        PyFeature {
            position: f.position,
            row: f.row,
            col: f.col,
            x: f.x,
            y: f.y,
            z: f.z,
        }
    }
}

#[pymethods]
impl PyFeature {
    fn __repr__(&self) -> String {
        format!(
            "Feature(row={}, col={}, x={}, y={}, z={})",
            self.row, self.col, self.x, self.y, self.z
        )
    }
}

#[pyclass(name = "TransectRecord")]
#[derive(Clone)]
pub struct PyTransectRecord {
    #[pyo3(get)]
    pub direction: String,
    #[pyo3(get)]
    pub index: usize,
    #[pyo3(get)]
    pub coordinate: f64,
    #[pyo3(get)]
    pub shoreline: Option<PyFeature>,
    #[pyo3(get)]
    pub dune_toe: Option<PyFeature>,
    #[pyo3(get)]
    pub dune_crest: Option<PyFeature>,
    #[pyo3(get)]
    pub dune_heel: Option<PyFeature>,
    #[pyo3(get)]
    pub back_barrier: Option<PyFeature>,
    #[pyo3(get)]
    pub beach_volume: f64,
    #[pyo3(get)]
    pub dune_volume: f64,
    #[pyo3(get)]
    pub island_volume: f64,
    #[pyo3(get)]
    pub dune_height: f64,
    #[pyo3(get)]
    pub beach_width: f64,
    #[pyo3(get)]
    pub island_width: f64,
}

impl From<&TransectRecord> for PyTransectRecord {
    fn from(record: &TransectRecord) -> Self {
        let feature = |landform| record.features.get(landform).cloned().map(PyFeature::from);
        PyTransectRecord {
            direction: record.direction.to_string(),
            index: record.index,
            coordinate: record.coordinate,
            shoreline: feature(Landform::Shoreline),
            dune_toe: feature(Landform::DuneToe),
            dune_crest: feature(Landform::DuneCrest),
            dune_heel: feature(Landform::DuneHeel),
            back_barrier: feature(Landform::BackBarrier),
            beach_volume: record.metrics.beach_volume,
            dune_volume: record.metrics.dune_volume,
            island_volume: record.metrics.island_volume,
            dune_height: record.metrics.dune_height,
            beach_width: record.metrics.beach_width,
            island_width: record.metrics.island_width,
        }
    }
}

#[pymethods]
impl PyTransectRecord {
    fn __repr__(&self) -> String {
        format!(
            "TransectRecord(direction='{}', index={}, coordinate={}, shoreline={})",
            self.direction,
            self.index,
            self.coordinate,
            self.shoreline.is_some()
        )
    }
}

#[pyclass(name = "RunSummary")]
#[derive(Clone)]
pub struct PyRunSummary {
    #[pyo3(get)]
    pub input: PathBuf,
    #[pyo3(get)]
    pub transects: usize,
    #[pyo3(get)]
    pub shorelines_found: usize,
    #[pyo3(get)]
    pub ascii: Option<PathBuf>,
    #[pyo3(get)]
    pub rasters: Vec<PathBuf>,
}

impl From<RunSummary> for PyRunSummary {
    fn from(summary: RunSummary) -> Self {
        PyRunSummary {
            input: summary.input,
            transects: summary.transects,
            shorelines_found: summary.shorelines_found,
            ascii: summary.ascii,
            rasters: summary.rasters,
        }
    }
}

#[pymethods]
impl PyRunSummary {
    fn __repr__(&self) -> String {
        format!(
            "RunSummary(input={:?}, transects={}, shorelines_found={}, rasters={})",
            self.input,
            self.transects,
            self.shorelines_found,
            self.rasters.len()
        )
    }
}

fn load_params(params_path: &str, input: Option<&str>) -> PyResult<Params> {
    let mut params = Params::from_file(Path::new(params_path))
        .map_err(|e| PyValueError::new_err(format!("Failed to load parameters: {}", e)))?;
    if let Some(input) = input {
        params.input = PathBuf::from(input);
    }
    Ok(params)
}

/// 行優先の標高配列から相対起伏3層と平均を計算する
#[pyfunction]
#[pyo3(signature = (values, rows, cols, window_size, average="literal"))]
pub fn relative_relief(
    values: Vec<f32>,
    rows: usize,
    cols: usize,
    window_size: i64,
    average: &str,
) -> PyResult<(Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>)> {
    let window_size =
        normalize_window_size(window_size).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let policy: ReliefAverage = average
        .parse()
        .map_err(|e: ::coastal_dem::Error| PyValueError::new_err(e.to_string()))?;

    let header = Header::new(cols, rows, 1.0, 1.0, 0.0, 0.0);
    let mut grid =
        DemGrid::new(header, values).map_err(|e| PyValueError::new_err(e.to_string()))?;
    compute_relief(&mut grid, (window_size - 1) / 2, policy);

    Ok((
        grid.relief(ReliefLayer::Res).to_vec(),
        grid.relief(ReliefLayer::ResPlus1).to_vec(),
        grid.relief(ReliefLayer::ResPlus2).to_vec(),
        grid.relief(ReliefLayer::Avg).to_vec(),
    ))
}

/// DEMを読み込み、トランセクトごとの地形とメトリクスを返す（ファイル出力なし）
#[pyfunction]
#[pyo3(signature = (params_path, input=None))]
pub fn analyze_dem(params_path: &str, input: Option<&str>) -> PyResult<Vec<PyTransectRecord>> {
    let params = load_params(params_path, input)?;
    let mut grid = read_dem(&params.input)
        .map_err(|e| PyIOError::new_err(format!("Failed to read DEM: {}", e)))?;
    let records = analyze(&mut grid, &params);
    Ok(records.iter().map(PyTransectRecord::from).collect())
}

/// パラメータファイルに従って処理し、出力を書き出す
#[pyfunction]
#[pyo3(signature = (params_path, output=None))]
pub fn run(params_path: &str, output: Option<&str>) -> PyResult<PyRunSummary> {
    let params = load_params(params_path, None)?;
    let summary = ::coastal_dem::run(&params, output.map(Path::new))
        .map_err(|e| PyIOError::new_err(format!("Failed to process DEM: {}", e)))?;
    Ok(summary.into())
}

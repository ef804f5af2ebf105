//! GDALで読める単バンドラスタ（GeoTIFFなど）の読み込み

use std::path::Path;

use gdal::Dataset;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Header, NODATA};

pub fn read_gdal(path: &Path) -> Result<(Header, Vec<f32>)> {
    let dataset = Dataset::open(path)?;
    if dataset.raster_count() == 0 {
        return Err(Error::Input(format!("{} has no raster bands", path.display())));
    }

    let (cols, rows) = dataset.raster_size();
    let band = dataset.rasterband(1)?;
    let buffer = band.read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)?;

    let gt = dataset.geo_transform()?;
    let mut header = Header::from_geo_transform(cols, rows, gt);
    header.bands = dataset.raster_count() as usize;
    let wkt = dataset.projection();
    if !wkt.is_empty() {
        header.projection = Some(wkt);
    }
    header.nodata = band.no_data_value();

    debug!(
        "GDAL raster {}: {} x {}, origin ({}, {}), resolution ({}, {})",
        path.display(),
        cols,
        rows,
        header.ulx,
        header.uly,
        header.xres,
        header.yres
    );

    // 宣言された欠損値は共通の欠損値に置き換える
    let nodata = header.nodata;
    let values = buffer
        .data()
        .iter()
        .map(|&v| {
            if v.is_nan() || nodata == Some(v as f64) {
                NODATA
            } else {
                v
            }
        })
        .collect();

    Ok((header, values))
}

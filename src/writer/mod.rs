pub mod envi;
#[cfg(feature = "gdal")]
pub mod geotiff;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::Header;
use crate::params::OutputFormat;

pub use envi::EnviWriter;
#[cfg(feature = "gdal")]
pub use geotiff::GeoTiffWriter;

/// 出力ラスタの欠損値
pub const NODATA_VALUE: f64 = -9999.0;

/// 1レイヤ1ファイルでラスタを書き出す
pub trait RasterWriter {
    /// 出力ファイルの拡張子（データ本体）
    fn extension(&self) -> &'static str;

    /// 拡張子なしのパス `base` に拡張子を付けて書き出し、データファイルのパスを返す
    fn write_layer(
        &self,
        header: &Header,
        name: &str,
        data: &[f32],
        base: &Path,
    ) -> Result<PathBuf>;
}

/// `base` に拡張子を追加する（`with_extension` と違い既存の `.` を置き換えない）
pub fn with_added_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// 出力形式に対応するラスタライタ
pub fn raster_writer(format: OutputFormat) -> Result<Box<dyn RasterWriter>> {
    match format {
        OutputFormat::Envi | OutputFormat::Both => Ok(Box::new(EnviWriter::new())),
        OutputFormat::GeoTiff => geotiff_writer(),
        OutputFormat::Ascii => Err(Error::Config(
            "ascii format has no raster output".to_string(),
        )),
    }
}

#[cfg(feature = "gdal")]
fn geotiff_writer() -> Result<Box<dyn RasterWriter>> {
    Ok(Box::new(GeoTiffWriter::new()))
}

#[cfg(not(feature = "gdal"))]
fn geotiff_writer() -> Result<Box<dyn RasterWriter>> {
    Err(Error::Config(
        "geotiff output requires the gdal feature".to_string(),
    ))
}

fn check_size(header: &Header, data: &[f32]) -> Result<()> {
    if data.len() != header.npix() {
        return Err(Error::SizeMismatch {
            expected: header.npix(),
            actual: data.len(),
        });
    }
    Ok(())
}

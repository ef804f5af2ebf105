use gdal::raster::Buffer;
use gdal::{DriverManager, Metadata};
use std::path::{Path, PathBuf};

use super::{check_size, with_added_extension, RasterWriter, NODATA_VALUE};
use crate::error::Result;
use crate::model::Header;

#[derive(Default)]
pub struct GeoTiffWriter {}

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl RasterWriter for GeoTiffWriter {
    fn extension(&self) -> &'static str {
        "tif"
    }

    fn write_layer(
        &self,
        header: &Header,
        name: &str,
        data: &[f32],
        base: &Path,
    ) -> Result<PathBuf> {
        check_size(header, data)?;
        let output_path = with_added_extension(base, self.extension());

        // GTiffドライバーを取得
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        // データセットを作成
        let (rows, cols) = header.shape();
        let mut dataset = driver.create_with_band_type::<f32, _>(&output_path, cols, rows, 1)?;

        // ジオトランスフォームを設定
        dataset.set_geo_transform(&header.geo_transform())?;

        // 座標系を設定
        match &header.projection {
            Some(wkt) => dataset.set_projection(wkt)?,
            None => tracing::warn!("No coordinate system for {}; writing without CRS", name),
        }

        let mut band = dataset.rasterband(1)?;

        // NoData値を設定
        band.set_no_data_value(Some(NODATA_VALUE))?;

        // データを書き込み（GDALは行優先順を期待）
        let mut buffer = Buffer::new((cols, rows), data.to_vec());
        band.write((0, 0), (cols, rows), &mut buffer)?;

        // レイヤ名をメタデータに残す
        dataset.set_metadata_item("LAYER", name, "")?;

        tracing::info!("Wrote {} ({})", output_path.display(), name);
        Ok(output_path)
    }
}

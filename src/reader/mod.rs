pub mod envi;
#[cfg(feature = "gdal")]
pub mod gdal;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::model::DemGrid;

/// 入力パスに対応するENVIヘッダ（あれば）
fn envi_header_path(path: &Path) -> Option<PathBuf> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match ext.as_deref() {
        Some("hdr") => Some(path.to_path_buf()),
        Some("tif") | Some("tiff") => None,
        _ => {
            // `island.dat` や拡張子なしの `island` は隣の `.hdr` を使う
            let hdr = path.with_extension("hdr");
            if hdr.is_file() {
                return Some(hdr);
            }
            let appended = PathBuf::from(format!("{}.hdr", path.display()));
            appended.is_file().then_some(appended)
        }
    }
}

/// 入力ラスタとして扱う拡張子か
pub fn is_dem_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("hdr") | Some("tif") | Some("tiff")
    )
}

/// DEMを読み込みグリッドを作成する
pub fn read_dem(path: &Path) -> Result<DemGrid> {
    let (header, z) = match envi_header_path(path) {
        Some(hdr) => envi::read_envi(&hdr)?,
        None => read_other(path)?,
    };

    let grid = DemGrid::new(header, z)?;
    let header = &grid.header;
    info!(
        "Read {}: {} x {} pixels, upper left ({}, {}), lower right ({}, {}), resolution ({}, {})",
        path.display(),
        header.ncols,
        header.nlines,
        header.ulx,
        header.uly,
        header.xmax(),
        header.ymin(),
        header.xres,
        header.yres
    );
    if let Some((zmin, zmax)) = grid.elevation_range() {
        info!("Elevation range: {} - {}", zmin, zmax);
    }
    Ok(grid)
}

#[cfg(feature = "gdal")]
fn read_other(path: &Path) -> Result<(crate::model::Header, Vec<f32>)> {
    self::gdal::read_gdal(path)
}

#[cfg(not(feature = "gdal"))]
fn read_other(path: &Path) -> Result<(crate::model::Header, Vec<f32>)> {
    Err(Error::Input(format!(
        "{} is not an ENVI raster and GDAL support is disabled",
        path.display()
    )))
}

/// ディレクトリ内のDEMファイルを再帰的に集める
pub fn collect_dem_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Input(format!("{} is not a directory", dir.display())));
    }
    let mut files = Vec::new();
    collect_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if is_dem_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

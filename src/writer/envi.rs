use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::{check_size, with_added_extension, RasterWriter, NODATA_VALUE};
use crate::error::Result;
use crate::model::Header;

/// ENVI標準形式（`.hdr` + リトルエンディアン float32 の `.dat`）
#[derive(Default)]
pub struct EnviWriter {}

impl EnviWriter {
    pub fn new() -> Self {
        Self {}
    }

    /// ヘッダのテキストを作成
    pub fn header_text(&self, header: &Header, name: &str) -> String {
        let mut lines = vec![
            "ENVI".to_string(),
            format!("description = {{{}}}", name),
            format!("samples = {}", header.ncols),
            format!("lines = {}", header.nlines),
            "bands = 1".to_string(),
            "header offset = 0".to_string(),
            "file type = ENVI Standard".to_string(),
            "data type = 4".to_string(),
            "interleave = bsq".to_string(),
            "sensor type = Unknown".to_string(),
            "byte order = 0".to_string(),
            format!("map info = {{{}}}", map_info_value(header)),
        ];
        if let Some(wkt) = &header.projection {
            lines.push(format!("coordinate system string = {{{}}}", wkt));
        }
        lines.push(format!("data ignore value = {}", NODATA_VALUE));
        lines.push("wavelength units = Unknown".to_string());

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

fn map_info_value(header: &Header) -> String {
    let mut fields = Vec::new();
    match &header.map_info {
        Some(info) => {
            fields.push(info.projection.clone());
            fields.extend(
                ["1.0", "1.0"].iter().map(|s| s.to_string()).chain(
                    [header.ulx, header.uly, header.xres, header.yres]
                        .iter()
                        .map(|v| v.to_string()),
                ),
            );
            let utm = info.projection.eq_ignore_ascii_case("UTM");
            if utm {
                fields.extend(info.zone.clone());
                fields.extend(info.hemisphere.clone());
            }
            fields.extend(info.datum.clone());
            if let Some(units) = &info.units {
                fields.push(format!("units={}", units));
            }
        }
        None => {
            fields.push("Arbitrary".to_string());
            fields.push("1.0".to_string());
            fields.push("1.0".to_string());
            fields.extend(
                [header.ulx, header.uly, header.xres, header.yres]
                    .iter()
                    .map(|v| v.to_string()),
            );
        }
    }
    fields.join(", ")
}

impl RasterWriter for EnviWriter {
    fn extension(&self) -> &'static str {
        "dat"
    }

    fn write_layer(
        &self,
        header: &Header,
        name: &str,
        data: &[f32],
        base: &Path,
    ) -> Result<PathBuf> {
        check_size(header, data)?;

        let hdr_path = with_added_extension(base, "hdr");
        let dat_path = with_added_extension(base, self.extension());

        std::fs::write(&hdr_path, self.header_text(header, name))?;

        let mut writer = BufWriter::new(File::create(&dat_path)?);
        for v in data {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.flush()?;

        info!("Wrote {} ({})", dat_path.display(), name);
        Ok(dat_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MapInfo, NODATA};
    use crate::reader::envi::{parse_header, read_envi};
    use tempfile::TempDir;

    fn create_test_header() -> Header {
        let mut header = Header::new(3, 2, 2.0, 2.0, 500000.0, 3500000.0);
        header.map_info = Some(MapInfo {
            projection: "UTM".to_string(),
            zone: Some("14".to_string()),
            hemisphere: Some("North".to_string()),
            datum: Some("WGS-84".to_string()),
            units: Some("Meters".to_string()),
        });
        header.projection = Some("PROJCS[\"UTM_Zone_14N\"]".to_string());
        header
    }

    #[test]
    fn test_header_text() {
        let writer = EnviWriter::new();
        let text = writer.header_text(&create_test_header(), "island_rr5");

        assert!(text.starts_with("ENVI\n"));
        assert!(text.contains("description = {island_rr5}\n"));
        assert!(text.contains("samples = 3\n"));
        assert!(text.contains("data type = 4\n"));
        assert!(text.contains(
            "map info = {UTM, 1.0, 1.0, 500000, 3500000, 2, 2, 14, North, WGS-84, units=Meters}\n"
        ));
        assert!(text.contains("data ignore value = -9999\n"));
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("island_rr_avg");
        let header = create_test_header();
        let data = vec![0.25, NODATA, 1.0, 0.0, 0.5, NODATA];

        let writer = EnviWriter::new();
        let path = writer.write_layer(&header, "island_rr_avg", &data, &base).unwrap();
        assert_eq!(path, temp_dir.path().join("island_rr_avg.dat"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);

        let (restored, values) = read_envi(&temp_dir.path().join("island_rr_avg.hdr")).unwrap();
        assert_eq!(values, data);
        assert_eq!(restored.nodata, Some(NODATA_VALUE));
        assert_eq!(restored.ulx, header.ulx);
        assert_eq!(restored.uly, header.uly);
        assert_eq!(restored.map_info, header.map_info);
        assert_eq!(restored.projection, header.projection);
    }

    #[test]
    fn test_header_without_map_info() {
        let header = Header::new(4, 4, 0.5, 0.25, 10.0, 20.0);
        let text = EnviWriter::new().header_text(&header, "plain");
        let envi = parse_header(&text, Path::new("plain.hdr")).unwrap();
        assert_eq!(envi.header.xres, 0.5);
        assert_eq!(envi.header.yres, 0.25);
        assert_eq!(envi.header.ulx, 10.0);
        assert_eq!(envi.header.uly, 20.0);
    }

    #[test]
    fn test_size_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let result = EnviWriter::new().write_layer(
            &create_test_header(),
            "bad",
            &[0.0; 4],
            &temp_dir.path().join("bad"),
        );
        assert!(result.is_err());
    }
}

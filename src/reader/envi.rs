//! ENVI形式（`.hdr` + バイナリ）の読み込み

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Header, MapInfo, NODATA};

/// ENVIの `data type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    U16,
}

impl DataType {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(DataType::U8),
            2 => Some(DataType::I16),
            3 => Some(DataType::I32),
            4 => Some(DataType::F32),
            5 => Some(DataType::F64),
            12 => Some(DataType::U16),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            DataType::U8 => 1,
            DataType::I16 => 2,
            DataType::I32 => 3,
            DataType::F32 => 4,
            DataType::F64 => 5,
            DataType::U16 => 12,
        }
    }

    pub fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    fn decode(self, bytes: &[u8], big_endian: bool) -> f64 {
        macro_rules! read {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&bytes[..$n]);
                if big_endian {
                    <$t>::from_be_bytes(buf) as f64
                } else {
                    <$t>::from_le_bytes(buf) as f64
                }
            }};
        }
        match self {
            DataType::U8 => bytes[0] as f64,
            DataType::I16 => read!(i16, 2),
            DataType::U16 => read!(u16, 2),
            DataType::I32 => read!(i32, 4),
            DataType::F32 => read!(f32, 4),
            DataType::F64 => read!(f64, 8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interleave {
    #[default]
    Bsq,
    Bil,
    Bip,
}

/// ヘッダから読み取ったレイアウト情報
#[derive(Debug, Clone, PartialEq)]
pub struct EnviHeader {
    pub header: Header,
    pub data_type: DataType,
    pub interleave: Interleave,
    pub big_endian: bool,
    pub header_offset: usize,
}

/// `key = value` の組に分割する。`{ }` で囲まれた値は複数行にまたがってよい。
fn entries(text: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut pending: Option<(String, String)> = None;

    for line in text.lines() {
        if let Some((key, mut value)) = pending.take() {
            value.push(' ');
            value.push_str(line.trim());
            if value.contains('}') {
                result.push((key, value));
            } else {
                pending = Some((key, value));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().to_string();
        if value.starts_with('{') && !value.contains('}') {
            pending = Some((key, value));
        } else {
            result.push((key, value));
        }
    }
    if let Some(entry) = pending {
        result.push(entry);
    }
    result
}

fn unbrace(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
}

/// `map info = {UTM, 1, 1, ulx, uly, xres, yres, 14, North, WGS-84, units=Meters}`
fn parse_map_info(value: &str) -> Option<(MapInfo, [f64; 6])> {
    let fields: Vec<&str> = unbrace(value).split(',').map(str::trim).collect();
    if fields.len() < 7 {
        return None;
    }
    let mut numbers = [0.0; 6];
    for (n, field) in numbers.iter_mut().zip(&fields[1..7]) {
        *n = field.parse().ok()?;
    }

    let projection = fields[0].to_string();
    let mut rest: Vec<&str> = fields[7..].to_vec();
    let units_at = rest
        .iter()
        .position(|f| f.to_ascii_lowercase().starts_with("units="));
    let units = units_at.map(|i| rest.remove(i)[6..].trim().to_string());

    let mut info = MapInfo {
        projection,
        units,
        ..Default::default()
    };
    if info.projection.eq_ignore_ascii_case("UTM") {
        info.zone = rest.first().map(|s| s.to_string());
        info.hemisphere = rest.get(1).map(|s| s.to_string());
        info.datum = rest.get(2).map(|s| s.to_string());
    } else {
        info.datum = rest.first().map(|s| s.to_string());
    }
    Some((info, numbers))
}

pub fn parse_header(text: &str, path: &Path) -> Result<EnviHeader> {
    let malformed = |reason: String| Error::Header {
        path: path.to_path_buf(),
        reason,
    };

    if !text.trim_start().starts_with("ENVI") {
        return Err(malformed("missing ENVI signature".to_string()));
    }

    let mut ncols = None;
    let mut nlines = None;
    let mut bands = 1;
    let mut header_offset = 0;
    let mut data_type = DataType::F32;
    let mut interleave = Interleave::Bsq;
    let mut big_endian = false;
    let mut description = String::new();
    let mut map_info = None;
    let mut projection = None;
    let mut nodata = None;

    let integer = |key: &str, value: &str| -> Result<usize> {
        value
            .parse::<usize>()
            .map_err(|_| malformed(format!("{} must be an integer, got '{}'", key, value)))
    };

    for (key, value) in entries(text) {
        match key.as_str() {
            "description" => description = unbrace(&value).to_string(),
            "samples" => ncols = Some(integer(&key, &value)?),
            "lines" => nlines = Some(integer(&key, &value)?),
            "bands" => bands = integer(&key, &value)?,
            "header offset" => header_offset = integer(&key, &value)?,
            "data type" => {
                let code = integer(&key, &value)? as u32;
                data_type = DataType::from_code(code)
                    .ok_or_else(|| malformed(format!("unsupported data type {}", code)))?;
            }
            "interleave" => {
                interleave = match value.to_ascii_lowercase().as_str() {
                    "bsq" => Interleave::Bsq,
                    "bil" => Interleave::Bil,
                    "bip" => Interleave::Bip,
                    other => return Err(malformed(format!("unknown interleave '{}'", other))),
                }
            }
            "byte order" => big_endian = integer(&key, &value)? == 1,
            "map info" => {
                map_info = Some(
                    parse_map_info(&value)
                        .ok_or_else(|| malformed(format!("cannot parse map info '{}'", value)))?,
                );
            }
            "coordinate system string" => projection = Some(unbrace(&value).to_string()),
            "data ignore value" => nodata = value.parse::<f64>().ok(),
            _ => {}
        }
    }

    let ncols = ncols.ok_or_else(|| malformed("missing samples".to_string()))?;
    let nlines = nlines.ok_or_else(|| malformed("missing lines".to_string()))?;
    if bands == 0 {
        return Err(malformed("bands must be at least 1".to_string()));
    }
    if data_length(ncols, nlines, bands, data_type, header_offset).is_none() {
        return Err(malformed("raster dimensions overflow".to_string()));
    }

    let mut header = Header::new(ncols, nlines, 1.0, 1.0, 0.0, 0.0);
    header.description = description;
    header.bands = bands;
    header.projection = projection;
    header.nodata = nodata;

    if let Some((info, [ref_x, ref_y, easting, northing, xres, yres])) = map_info {
        // 参照画素は1始まり
        header.xres = xres;
        header.yres = yres;
        header.ulx = easting - (ref_x - 1.0) * xres;
        header.uly = northing + (ref_y - 1.0) * yres;
        header.map_info = Some(info);
    }

    Ok(EnviHeader {
        header,
        data_type,
        interleave,
        big_endian,
        header_offset,
    })
}

/// ヘッダに対応するデータファイルを探す
pub fn data_path(hdr_path: &Path) -> Result<PathBuf> {
    ["dat", "img", "bin"]
        .iter()
        .map(|ext| hdr_path.with_extension(ext))
        .chain(std::iter::once(hdr_path.with_extension("")))
        .find(|p| p.is_file())
        .ok_or_else(|| {
            Error::Input(format!(
                "no data file found next to {}",
                hdr_path.display()
            ))
        })
}

/// ヘッダオフセットを含むデータファイルの必要バイト数（桁あふれは `None`）
fn data_length(
    ncols: usize,
    nlines: usize,
    bands: usize,
    data_type: DataType,
    header_offset: usize,
) -> Option<usize> {
    ncols
        .checked_mul(nlines)?
        .checked_mul(bands)?
        .checked_mul(data_type.size())?
        .checked_add(header_offset)
}

/// 1バンド目を行優先の標高に変換する
pub fn decode_band(envi: &EnviHeader, bytes: &[u8]) -> Result<Vec<f32>> {
    let header = &envi.header;
    let size = envi.data_type.size();
    let expected = data_length(
        header.ncols,
        header.nlines,
        header.bands,
        envi.data_type,
        envi.header_offset,
    )
    .ok_or_else(|| Error::Input("raster dimensions overflow".to_string()))?;
    let npix = header.npix();
    if bytes.len() < expected {
        return Err(Error::Input(format!(
            "data file is too short: expected {} bytes, found {}",
            expected,
            bytes.len()
        )));
    }

    let data = &bytes[envi.header_offset..];
    let (ncols, bands) = (header.ncols, header.bands);

    let values = (0..npix)
        .map(|idx| {
            let sample = match envi.interleave {
                Interleave::Bsq => idx,
                Interleave::Bil => (idx / ncols) * ncols * bands + idx % ncols,
                Interleave::Bip => idx * bands,
            };
            let offset = sample * size;
            let v = envi.data_type.decode(&data[offset..offset + size], envi.big_endian);
            if v.is_nan() || header.nodata == Some(v) {
                NODATA
            } else {
                v as f32
            }
        })
        .collect();
    Ok(values)
}

/// ENVIヘッダとデータファイルを読み込む
pub fn read_envi(hdr_path: &Path) -> Result<(Header, Vec<f32>)> {
    let text = fs::read_to_string(hdr_path)?;
    let envi = parse_header(&text, hdr_path)?;
    let data_path = data_path(hdr_path)?;

    debug!(
        "ENVI header {}: {} x {} x {} bands, data type {}, {:?}",
        hdr_path.display(),
        envi.header.ncols,
        envi.header.nlines,
        envi.header.bands,
        envi.data_type.code(),
        envi.interleave
    );

    let bytes = fs::read(&data_path)?;
    let values = decode_band(&envi, &bytes)?;
    Ok((envi.header, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "ENVI
description = {
  island test raster}
samples = 3
lines = 2
bands = 1
header offset = 0
file type = ENVI Standard
data type = 4
interleave = bsq
byte order = 0
map info = {UTM, 1.00000, 1.00000, 500000.0, 3500000.0, 2.0, 2.0, 14, North, WGS-84, units=Meters}
coordinate system string = {PROJCS[\"UTM_Zone_14N\",GEOGCS[\"GCS_WGS_1984\"]]}
data ignore value = -32768
";

    #[test]
    fn test_parse_header() {
        let envi = parse_header(HEADER, Path::new("test.hdr")).unwrap();
        let header = &envi.header;

        assert_eq!(header.description, "island test raster");
        assert_eq!(header.shape(), (2, 3));
        assert_eq!(header.ulx, 500000.0);
        assert_eq!(header.uly, 3500000.0);
        assert_eq!(header.xres, 2.0);
        assert_eq!(header.nodata, Some(-32768.0));
        assert_eq!(
            header.projection.as_deref(),
            Some("PROJCS[\"UTM_Zone_14N\",GEOGCS[\"GCS_WGS_1984\"]]")
        );

        let info = header.map_info.as_ref().unwrap();
        assert_eq!(info.projection, "UTM");
        assert_eq!(info.zone.as_deref(), Some("14"));
        assert_eq!(info.hemisphere.as_deref(), Some("North"));
        assert_eq!(info.datum.as_deref(), Some("WGS-84"));
        assert_eq!(info.units.as_deref(), Some("Meters"));

        assert_eq!(envi.data_type, DataType::F32);
        assert_eq!(envi.interleave, Interleave::Bsq);
        assert!(!envi.big_endian);
    }

    #[test]
    fn test_reference_pixel_offset() {
        let text = HEADER.replace("1.00000, 1.00000, 500000.0", "2.0, 3.0, 500000.0");
        let envi = parse_header(&text, Path::new("test.hdr")).unwrap();
        assert_eq!(envi.header.ulx, 499998.0);
        assert_eq!(envi.header.uly, 3500004.0);
    }

    #[test]
    fn test_geographic_map_info() {
        let (info, numbers) =
            parse_map_info("{Geographic Lat/Lon, 1, 1, 135.0, 35.0, 0.001, 0.001, WGS-84, units=Degrees}")
                .unwrap();
        assert_eq!(info.projection, "Geographic Lat/Lon");
        assert_eq!(info.datum.as_deref(), Some("WGS-84"));
        assert_eq!(info.zone, None);
        assert_eq!(numbers[2], 135.0);
    }

    #[test]
    fn test_malformed_header() {
        let path = Path::new("bad.hdr");
        assert!(matches!(
            parse_header("samples = 3", path),
            Err(Error::Header { .. })
        ));
        assert!(matches!(
            parse_header(&HEADER.replace("lines = 2\n", ""), path),
            Err(Error::Header { .. })
        ));
        assert!(matches!(
            parse_header(&HEADER.replace("data type = 4", "data type = 6"), path),
            Err(Error::Header { .. })
        ));
        assert!(matches!(
            parse_header(&HEADER.replace("samples = 3", "samples = three"), path),
            Err(Error::Header { .. })
        ));
    }

    #[test]
    fn test_oversized_dimensions() {
        let text = "ENVI\nsamples = 4294967296\nlines = 4294967296\nbands = 1\ndata type = 4\n";
        match parse_header(text, Path::new("huge.hdr")) {
            Err(Error::Header { reason, .. }) => assert_eq!(reason, "raster dimensions overflow"),
            other => panic!("unexpected result: {:?}", other.map(|e| e.header.shape())),
        }

        // 後から書き換えられたヘッダでもパニックしない
        let mut envi = parse_header(HEADER, Path::new("test.hdr")).unwrap();
        envi.header.ncols = usize::MAX;
        envi.header.nlines = 2;
        assert!(matches!(decode_band(&envi, &[0u8; 16]), Err(Error::Input(_))));
    }

    #[test]
    fn test_decode_types_and_nodata() {
        let mut envi = parse_header(HEADER, Path::new("test.hdr")).unwrap();
        envi.data_type = DataType::I16;
        envi.big_endian = true;

        let values: [i16; 6] = [1, -2, 3, -32768, 5, 6];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let decoded = decode_band(&envi, &bytes).unwrap();
        assert_eq!(decoded, vec![1.0, -2.0, 3.0, NODATA, 5.0, 6.0]);

        assert!(matches!(
            decode_band(&envi, &bytes[..10]),
            Err(Error::Input(_))
        ));
    }

    #[test]
    fn test_decode_interleaved_first_band() {
        let mut envi = parse_header(HEADER, Path::new("test.hdr")).unwrap();
        envi.header.bands = 2;
        // バンド1は 0..6、バンド2は 100..106
        let band1: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let band2: Vec<f32> = (100..106).map(|v| v as f32).collect();

        envi.interleave = Interleave::Bil;
        let bil: Vec<f32> = vec![0., 1., 2., 100., 101., 102., 3., 4., 5., 103., 104., 105.];
        let bytes: Vec<u8> = bil.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(decode_band(&envi, &bytes).unwrap(), band1);

        envi.interleave = Interleave::Bip;
        let bip: Vec<f32> = band1
            .iter()
            .zip(&band2)
            .flat_map(|(a, b)| [*a, *b])
            .collect();
        let bytes: Vec<u8> = bip.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(decode_band(&envi, &bytes).unwrap(), band1);
    }

    #[test]
    fn test_read_envi_files() {
        let temp_dir = TempDir::new().unwrap();
        let hdr = temp_dir.path().join("island.hdr");
        fs::write(&hdr, HEADER.replace("data type = 4", "data type = 5")).unwrap();
        let values: [f64; 6] = [1.5, 2.5, -32768.0, 4.0, 5.0, 6.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        fs::write(temp_dir.path().join("island.dat"), bytes).unwrap();

        let (header, z) = read_envi(&hdr).unwrap();
        assert_eq!(header.ncols, 3);
        assert_eq!(z, vec![1.5, 2.5, NODATA, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_data_file() {
        let temp_dir = TempDir::new().unwrap();
        let hdr = temp_dir.path().join("lonely.hdr");
        fs::write(&hdr, HEADER).unwrap();
        assert!(matches!(read_envi(&hdr), Err(Error::Input(_))));
    }
}

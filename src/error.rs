use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid window size {0}: window size must be an odd number of at least 3")]
    InvalidWindowSize(i64),

    #[error("Malformed header {path}: {reason}")]
    Header { path: PathBuf, reason: String },

    #[error("Invalid input raster: {0}")]
    Input(String),

    #[error("Raster size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Failed to write {stream} output: {source}")]
    Output {
        stream: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn output(stream: &'static str, source: Error) -> Self {
        Error::Output {
            stream,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

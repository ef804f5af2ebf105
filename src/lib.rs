pub mod error;
pub mod extract;
pub mod model;
pub mod params;
pub mod pipeline;
pub mod reader;
pub mod relief;
pub mod report;
pub mod transect;
pub mod volume;
pub mod writer;

pub use error::{Error, Result};
pub use extract::{Feature, TransectFeatures};
pub use model::{DemGrid, Header, Landform, TransectRecord};
pub use params::Params;
pub use pipeline::{analyze, run, run_batch, RunSummary};
pub use reader::read_dem;
pub use relief::{compute_relief, ReliefAverage};
pub use transect::TransectDirection;
pub use volume::TransectMetrics;
pub use writer::{EnviWriter, RasterWriter};
#[cfg(feature = "gdal")]
pub use writer::GeoTiffWriter;

//! Input/output helpers.
//!
//! - series ingest + event filtering (`ingest`)
//! - residual CSV export (`export`)
//! - fit JSON read/write (`fit_json`)
//! - GeoJSON displacement map (`geojson`)

pub mod export;
pub mod fit_json;
pub mod geojson;
pub mod ingest;

pub use export::*;
pub use fit_json::*;
pub use geojson::*;
pub use ingest::*;

pub mod console_logger;
pub mod file_logger;
pub mod geojson_source;
pub mod json_source;
pub mod multi_logger;
pub mod noop_logger;

pub use console_logger::*;
pub use file_logger::*;
pub use geojson_source::*;
pub use json_source::*;
pub use multi_logger::*;
pub use noop_logger::*;

use std::path::Path;

use crate::domains::streets::GraphSource;

/// `.geojson` files go through the GeoJSON importer, anything else is read
/// as graph JSON.
pub fn open_graph_source<P: AsRef<Path>>(path: P) -> Box<dyn GraphSource> {
    let path = path.as_ref();
    let is_geojson = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("geojson"))
        .unwrap_or(false);
    if is_geojson {
        Box::new(GeoJsonFileSource::new(path))
    } else {
        Box::new(JsonFileSource::new(path))
    }
}

use super::types::GraphData;
use crate::common::SimResult;

/// Port the partitioner depends on for raw street data.
/// Adapters provide JSON, GeoJSON or in-memory sources.
pub trait GraphSource: Send + Sync {
    fn load(&self) -> SimResult<GraphData>;
}

impl GraphSource for GraphData {
    fn load(&self) -> SimResult<GraphData> {
        Ok(self.clone())
    }
}

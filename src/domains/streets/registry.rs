use std::collections::HashMap;
use std::sync::Arc;

use super::graph::StreetGraph;
use super::types::GraphId;
use crate::common::{SimError, SimResult};
use crate::domains::vehicles::Vehicle;

/// Graphs known to this node, by id. Vehicles refer to their graph through
/// the id only and are resolved here when they need to move.
#[derive(Debug, Clone, Default)]
pub struct GraphRegistry {
    graphs: HashMap<GraphId, Arc<StreetGraph>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, graph: StreetGraph) -> Arc<StreetGraph> {
        let graph = Arc::new(graph);
        self.graphs.insert(graph.id(), graph.clone());
        graph
    }

    pub fn get(&self, id: GraphId) -> Option<Arc<StreetGraph>> {
        self.graphs.get(&id).cloned()
    }

    pub fn resolve(&self, vehicle: &Vehicle) -> SimResult<Arc<StreetGraph>> {
        vehicle
            .graph_id()
            .and_then(|id| self.get(id))
            .ok_or_else(|| SimError::GraphMismatch {
                vehicle: vehicle.id,
                bound: vehicle.graph_id(),
                actual: None,
            })
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

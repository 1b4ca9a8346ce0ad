use serde::{Deserialize, Serialize};

use super::vehicle::VehicleId;
use crate::domains::streets::VertexId;

/// Wire form of a vehicle, moved whole between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub prev_vertex: VertexId,
    pub next_vertex: Option<VertexId>,
    pub delta: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub speed: f64,
    pub route: Vec<VertexId>,
    pub route_index: usize,
    pub distance: f64,
    pub steps: u64,
    pub is_parked: bool,
    pub marked_for_deletion: bool,
}

impl VehicleRecord {
    pub fn destination(&self) -> Option<VertexId> {
        self.route.last().copied()
    }
}

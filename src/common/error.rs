use thiserror::Error;

use crate::domains::streets::{GraphId, VertexId};
use crate::domains::vehicles::VehicleId;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Graph source error: {reason}")]
    Source { reason: String },

    #[error("Vertex {vertex} is not owned by any leaf")]
    Routing { vertex: VertexId },

    #[error("No edge from {from} to {to}")]
    UnknownEdge { from: VertexId, to: VertexId },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Partition error: {reason}")]
    Partition { reason: String },

    #[error("Vehicle creation failed: {reason}")]
    VehicleCreation { reason: String },

    #[error("Distributed mode needs at least 2 workers, got {world_size}")]
    InsufficientWorkers { world_size: usize },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Vehicle {vehicle} is bound to graph {bound:?}, not graph {actual:?}")]
    GraphMismatch {
        vehicle: VehicleId,
        bound: Option<GraphId>,
        actual: Option<GraphId>,
    },
}

impl SimError {
    pub fn bad_source(reason: impl Into<String>) -> Self {
        SimError::Source {
            reason: reason.into(),
        }
    }

    pub fn partition(reason: impl Into<String>) -> Self {
        SimError::Partition {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        SimError::Protocol(reason.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;

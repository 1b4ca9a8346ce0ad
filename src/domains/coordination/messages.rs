use serde::{Deserialize, Serialize};

use crate::domains::streets::VertexId;
use crate::domains::vehicles::{VehicleId, VehicleRecord};

pub type Rank = usize;

pub const ROOT_RANK: Rank = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeLengthRequest {
    pub request_id: u64,
    pub source: VertexId,
    pub target: VertexId,
}

/// `length` is `None` when the root graph has no such edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeLengthResponse {
    pub request_id: u64,
    pub length: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// root -> leaf: the leaf takes ownership of the vehicle.
    EmitVehicle(VehicleRecord),
    /// leaf -> root
    EdgeLengthRequest(EdgeLengthRequest),
    /// root -> leaf
    EdgeLengthResponse(EdgeLengthResponse),
    /// leaf -> root: the vehicle left the leaf's partition.
    MigrateVehicle(VehicleRecord),
    /// leaf -> root
    VehicleParked(VehicleRecord),
    /// leaf -> root: the vehicle's drive task failed and it was dropped.
    VehicleAbandoned { vehicle_id: VehicleId, reason: String },
    /// root -> leaf
    Shutdown,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::EmitVehicle(_) => "EmitVehicle",
            Message::EdgeLengthRequest(_) => "EdgeLengthRequest",
            Message::EdgeLengthResponse(_) => "EdgeLengthResponse",
            Message::MigrateVehicle(_) => "MigrateVehicle",
            Message::VehicleParked(_) => "VehicleParked",
            Message::VehicleAbandoned { .. } => "VehicleAbandoned",
            Message::Shutdown => "Shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Rank,
    pub to: Rank,
    pub message: Message,
}

/// What a leaf tells the root about one of its vehicles.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafReport {
    Migrate(VehicleRecord),
    Parked(VehicleRecord),
    Abandoned { vehicle_id: VehicleId, reason: String },
}

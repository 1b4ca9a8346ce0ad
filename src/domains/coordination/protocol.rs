//! The four root/leaf exchanges. Leaf ids double as transport ranks.

use super::messages::{EdgeLengthRequest, EdgeLengthResponse, Message, Rank, ROOT_RANK};
use super::ports::Transport;
use crate::common::{SimError, SimResult};
use crate::domains::logger::DynLogger;
use crate::domains::streets::{LeafLookup, StreetGraph};
use crate::domains::vehicles::{Vehicle, VehicleRecord};

/// Sends a fresh vehicle to the leaf owning its starting vertex.
pub async fn emit_vehicle(
    transport: &dyn Transport,
    lookup: &LeafLookup,
    record: VehicleRecord,
) -> SimResult<Rank> {
    let leaf = lookup.leaf_for(record.prev_vertex)?;
    transport.send(leaf, Message::EmitVehicle(record)).await?;
    Ok(leaf)
}

/// Forwards a migrating vehicle to the leaf owning the vertex it is heading to.
pub async fn relay_vehicle(
    transport: &dyn Transport,
    lookup: &LeafLookup,
    record: VehicleRecord,
) -> SimResult<Rank> {
    let vertex = record.next_vertex.ok_or(SimError::Routing {
        vertex: record.prev_vertex,
    })?;
    let leaf = lookup.leaf_for(vertex)?;
    transport.send(leaf, Message::EmitVehicle(record)).await?;
    Ok(leaf)
}

/// Takes ownership of an emitted vehicle: clears the migration mark and
/// binds it to the leaf's graph.
pub fn receive_vehicle_on_leaf(record: VehicleRecord, graph: &StreetGraph) -> SimResult<Vehicle> {
    let mut vehicle = Vehicle::from_record(record)?;
    if vehicle.is_parked() {
        return Err(SimError::protocol(format!(
            "parked vehicle {} was emitted",
            vehicle.id
        )));
    }
    vehicle.bind(graph);
    Ok(vehicle)
}

pub async fn send_vehicle_to_root(transport: &dyn Transport, vehicle: &Vehicle) -> SimResult<()> {
    transport
        .send(ROOT_RANK, Message::MigrateVehicle(vehicle.to_record()))
        .await
}

pub fn resolve_edge_length(graph: &StreetGraph, request: &EdgeLengthRequest) -> SimResult<f64> {
    graph
        .edge_length(request.source, request.target)
        .ok_or(SimError::UnknownEdge {
            from: request.source,
            to: request.target,
        })
}

/// Answers one length request from `from`. An unknown edge is answered with
/// an empty length; only transport failures are returned as errors.
pub async fn respond_to_edge_length_request(
    graph: &StreetGraph,
    transport: &dyn Transport,
    from: Rank,
    request: EdgeLengthRequest,
    logger: &DynLogger,
) -> SimResult<()> {
    let length = match resolve_edge_length(graph, &request) {
        Ok(length) => Some(length),
        Err(e) => {
            logger.warn(&format!("[{}] {} (asked by {})", transport.rank(), e, from));
            None
        }
    };
    transport
        .send(
            from,
            Message::EdgeLengthResponse(EdgeLengthResponse {
                request_id: request.request_id,
                length,
            }),
        )
        .await
}

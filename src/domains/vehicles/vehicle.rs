use serde::{Deserialize, Serialize};

use super::record::VehicleRecord;
use crate::common::{SimError, SimResult};
use crate::domains::streets::{GraphId, StreetGraph, VertexId};

pub type VehicleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleState {
    Driving,
    Parked,
    /// Next edge leaves the bound graph; the vehicle waits to be handed over.
    AwaitingMigration,
}

/// A single vehicle following a fixed route, one edge at a time.
///
/// The vehicle only stores the id of the graph it is bound to. Every call
/// that moves it takes the graph explicitly and checks the binding, so a
/// vehicle can never step against a graph owned by another node.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub min_speed: f64,
    pub max_speed: f64,
    pub speed: f64,
    route: Vec<VertexId>,
    route_index: usize,
    delta: f64,
    edge_length: Option<f64>,
    distance: f64,
    steps: u64,
    state: VehicleState,
    graph_id: Option<GraphId>,
}

pub(crate) fn check_speeds(min_speed: f64, max_speed: f64, speed: f64) -> Result<(), String> {
    if !(min_speed.is_finite() && max_speed.is_finite() && speed.is_finite()) {
        return Err("speeds must be finite".to_string());
    }
    if min_speed <= 0.0 || min_speed > max_speed {
        return Err(format!(
            "speed bounds must satisfy 0 < min <= max, got {}..{}",
            min_speed, max_speed
        ));
    }
    if speed < min_speed || speed > max_speed {
        return Err(format!(
            "speed {} outside bounds {}..{}",
            speed, min_speed, max_speed
        ));
    }
    Ok(())
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        route: Vec<VertexId>,
        min_speed: f64,
        max_speed: f64,
        speed: f64,
        graph: &StreetGraph,
    ) -> SimResult<Self> {
        check_speeds(min_speed, max_speed, speed)
            .map_err(|reason| SimError::VehicleCreation { reason })?;
        if route.is_empty() {
            return Err(SimError::VehicleCreation {
                reason: format!("vehicle {} has an empty route", id),
            });
        }
        if let Some(missing) = route.iter().find(|v| !graph.contains_vertex(**v)) {
            return Err(SimError::VehicleCreation {
                reason: format!("route vertex {} is not in graph {}", missing, graph.id()),
            });
        }
        if let Some(pair) = route
            .windows(2)
            .find(|pair| graph.edge_length(pair[0], pair[1]).is_none())
        {
            return Err(SimError::VehicleCreation {
                reason: format!("route uses missing edge {} -> {}", pair[0], pair[1]),
            });
        }

        let mut vehicle = Self {
            id,
            min_speed,
            max_speed,
            speed,
            route,
            route_index: 0,
            delta: 0.0,
            edge_length: None,
            distance: 0.0,
            steps: 0,
            state: VehicleState::Driving,
            graph_id: Some(graph.id()),
        };
        match vehicle.current_edge() {
            Some((prev, next)) => vehicle.edge_length = graph.edge_length(prev, next),
            None => vehicle.state = VehicleState::Parked,
        }
        Ok(vehicle)
    }

    pub fn prev_id(&self) -> VertexId {
        self.route[self.route_index]
    }

    pub fn next_id(&self) -> Option<VertexId> {
        self.route.get(self.route_index + 1).copied()
    }

    pub fn current_edge(&self) -> Option<(VertexId, VertexId)> {
        self.next_id().map(|next| (self.prev_id(), next))
    }

    pub fn destination(&self) -> VertexId {
        self.route[self.route.len() - 1]
    }

    pub fn route(&self) -> &[VertexId] {
        &self.route
    }

    pub fn route_index(&self) -> usize {
        self.route_index
    }

    /// Progress along the current edge.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn edge_length(&self) -> Option<f64> {
        self.edge_length
    }

    pub fn distance_travelled(&self) -> f64 {
        self.distance
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn is_parked(&self) -> bool {
        self.state == VehicleState::Parked
    }

    pub fn marked_for_deletion(&self) -> bool {
        self.state == VehicleState::AwaitingMigration
    }

    pub fn graph_id(&self) -> Option<GraphId> {
        self.graph_id
    }

    /// Re-binds the vehicle to `graph` and clears a pending migration. The
    /// current edge length is taken from the graph when it holds the edge;
    /// otherwise it has to be supplied with [`Vehicle::set_edge_length`].
    pub fn bind(&mut self, graph: &StreetGraph) {
        self.graph_id = Some(graph.id());
        if self.state == VehicleState::AwaitingMigration {
            self.state = VehicleState::Driving;
        }
        self.edge_length = self
            .current_edge()
            .and_then(|(prev, next)| graph.edge_length(prev, next));
    }

    /// Current edge of a driving vehicle whose length the bound graph could
    /// not supply.
    pub fn missing_edge_length(&self) -> Option<(VertexId, VertexId)> {
        if self.state != VehicleState::Driving || self.edge_length.is_some() {
            return None;
        }
        self.current_edge()
    }

    pub fn set_edge_length(&mut self, length: f64) {
        self.edge_length = Some(length);
    }

    fn check_bound(&self, graph: &StreetGraph) -> SimResult<()> {
        if self.graph_id != Some(graph.id()) {
            return Err(SimError::GraphMismatch {
                vehicle: self.id,
                bound: self.graph_id,
                actual: Some(graph.id()),
            });
        }
        Ok(())
    }

    fn park(&mut self) {
        self.route_index = self.route.len() - 1;
        self.state = VehicleState::Parked;
        self.delta = 0.0;
        self.edge_length = None;
    }

    /// Advances the vehicle by one increment of its speed. Overshoot past the
    /// end of an edge carries over into the following edges.
    pub fn step(&mut self, graph: &StreetGraph) -> SimResult<VehicleState> {
        if self.state != VehicleState::Driving {
            return Ok(self.state);
        }
        self.check_bound(graph)?;
        let Some(length) = self.current_length(graph)? else {
            self.park();
            return Ok(self.state);
        };

        self.delta += self.speed;
        self.distance += self.speed;
        self.steps += 1;
        self.carry_over(graph, length)
    }

    /// Applies progress carried over from another partition without moving
    /// the vehicle further. Called once after a hand-over, before stepping.
    pub fn settle(&mut self, graph: &StreetGraph) -> SimResult<VehicleState> {
        if self.state != VehicleState::Driving {
            return Ok(self.state);
        }
        self.check_bound(graph)?;
        match self.current_length(graph)? {
            Some(length) => self.carry_over(graph, length),
            None => {
                self.park();
                Ok(self.state)
            }
        }
    }

    /// Length of the current edge, `None` at the end of the route.
    fn current_length(&mut self, graph: &StreetGraph) -> SimResult<Option<f64>> {
        let Some((prev, next)) = self.current_edge() else {
            return Ok(None);
        };
        if let Some(length) = self.edge_length {
            return Ok(Some(length));
        }
        let length = graph
            .edge_length(prev, next)
            .ok_or(SimError::UnknownEdge { from: prev, to: next })?;
        self.edge_length = Some(length);
        Ok(Some(length))
    }

    fn carry_over(&mut self, graph: &StreetGraph, mut length: f64) -> SimResult<VehicleState> {
        while self.delta >= length {
            self.delta -= length;
            self.route_index += 1;

            let Some((prev, next)) = self.current_edge() else {
                self.park();
                return Ok(self.state);
            };
            if !graph.contains_vertex(next) {
                self.state = VehicleState::AwaitingMigration;
                self.edge_length = None;
                return Ok(self.state);
            }
            // The route briefly left the partition: the edge back in is only
            // known to the root, so stop here until its length is supplied.
            let Some(next_length) = graph.edge_length(prev, next) else {
                self.edge_length = None;
                return Ok(self.state);
            };
            length = next_length;
            self.edge_length = Some(next_length);
        }
        Ok(self.state)
    }

    /// Steps until parked. Used when one graph holds the whole network, so a
    /// pending migration means the route left the graph.
    pub fn drive(&mut self, graph: &StreetGraph) -> SimResult<()> {
        loop {
            match self.step(graph)? {
                VehicleState::Driving => continue,
                VehicleState::Parked => return Ok(()),
                VehicleState::AwaitingMigration => {
                    return Err(SimError::Routing {
                        vertex: self.next_id().unwrap_or_else(|| self.prev_id()),
                    })
                }
            }
        }
    }

    pub fn to_record(&self) -> VehicleRecord {
        VehicleRecord {
            id: self.id,
            prev_vertex: self.prev_id(),
            next_vertex: self.next_id(),
            delta: self.delta,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            speed: self.speed,
            route: self.route.clone(),
            route_index: self.route_index,
            distance: self.distance,
            steps: self.steps,
            is_parked: self.is_parked(),
            marked_for_deletion: self.marked_for_deletion(),
        }
    }

    /// Rebuilds a vehicle from its wire form. The result is unbound.
    pub fn from_record(record: VehicleRecord) -> SimResult<Self> {
        let malformed = |reason: String| {
            SimError::protocol(format!("malformed record for vehicle {}: {}", record.id, reason))
        };
        check_speeds(record.min_speed, record.max_speed, record.speed).map_err(malformed)?;
        if record.route_index >= record.route.len() {
            return Err(malformed(format!(
                "route index {} outside route of {} vertices",
                record.route_index,
                record.route.len()
            )));
        }
        if record.route[record.route_index] != record.prev_vertex
            || record.route.get(record.route_index + 1).copied() != record.next_vertex
        {
            return Err(malformed("edge endpoints disagree with route".to_string()));
        }
        if record.is_parked && record.marked_for_deletion {
            return Err(malformed("both parked and marked for deletion".to_string()));
        }
        if !record.delta.is_finite() || record.delta < 0.0 {
            return Err(malformed(format!("invalid delta {}", record.delta)));
        }

        let state = if record.is_parked {
            VehicleState::Parked
        } else if record.marked_for_deletion {
            VehicleState::AwaitingMigration
        } else {
            VehicleState::Driving
        };
        Ok(Self {
            id: record.id,
            min_speed: record.min_speed,
            max_speed: record.max_speed,
            speed: record.speed,
            route: record.route,
            route_index: record.route_index,
            delta: record.delta,
            edge_length: None,
            distance: record.distance,
            steps: record.steps,
            state,
            graph_id: None,
        })
    }
}

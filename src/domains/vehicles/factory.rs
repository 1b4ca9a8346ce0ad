use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::vehicle::{check_speeds, Vehicle, VehicleId};
use crate::common::{SimError, SimResult};
use crate::config::SimulationConfig;
use crate::domains::streets::{StreetGraph, VertexId};

/// Creates vehicles on a graph with a random speed and a shortest route
/// between two random vertices.
pub struct VehicleFactory {
    rng: StdRng,
    min_speed: f64,
    max_speed: f64,
    max_route_attempts: usize,
    next_id: VehicleId,
}

impl VehicleFactory {
    pub fn new(
        min_speed: f64,
        max_speed: f64,
        seed: Option<u64>,
        max_route_attempts: usize,
    ) -> SimResult<Self> {
        check_speeds(min_speed, max_speed, min_speed).map_err(SimError::Configuration)?;
        if max_route_attempts == 0 {
            return Err(SimError::Configuration(
                "max_route_attempts must be at least 1".to_string(),
            ));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            min_speed,
            max_speed,
            max_route_attempts,
            next_id: 0,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> SimResult<Self> {
        Self::new(
            config.min_speed,
            config.max_speed,
            config.seed,
            config.max_route_attempts,
        )
    }

    pub fn add_vehicle(&mut self, graph: &StreetGraph) -> SimResult<Vehicle> {
        let (starts, all) = Self::candidates(graph)?;
        self.create(graph, &starts, &all)
    }

    pub fn spawn(&mut self, count: usize, graph: &StreetGraph) -> SimResult<Vec<Vehicle>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let (starts, all) = Self::candidates(graph)?;
        (0..count).map(|_| self.create(graph, &starts, &all)).collect()
    }

    fn candidates(graph: &StreetGraph) -> SimResult<(Vec<VertexId>, Vec<VertexId>)> {
        let all: Vec<VertexId> = graph.vertex_ids().collect();
        let starts: Vec<VertexId> = all
            .iter()
            .copied()
            .filter(|v| graph.out_degree(*v) > 0)
            .collect();
        if starts.is_empty() || all.len() < 2 {
            return Err(SimError::VehicleCreation {
                reason: format!("graph {} has no drivable edges", graph.id()),
            });
        }
        Ok((starts, all))
    }

    fn create(
        &mut self,
        graph: &StreetGraph,
        starts: &[VertexId],
        all: &[VertexId],
    ) -> SimResult<Vehicle> {
        for _ in 0..self.max_route_attempts {
            let (Some(&start), Some(&destination)) =
                (starts.choose(&mut self.rng), all.choose(&mut self.rng))
            else {
                break;
            };
            if start == destination {
                continue;
            }
            let Some((_, route)) = graph.shortest_route(start, destination) else {
                continue;
            };
            let speed = self.rng.gen_range(self.min_speed..=self.max_speed);
            let id = self.next_id;
            self.next_id += 1;
            return Vehicle::new(id, route, self.min_speed, self.max_speed, speed, graph);
        }
        Err(SimError::VehicleCreation {
            reason: format!(
                "no route found after {} attempts",
                self.max_route_attempts
            ),
        })
    }
}

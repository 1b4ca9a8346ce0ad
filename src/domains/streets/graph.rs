use petgraph::algo::astar;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashSet};

use super::types::{Edge, GraphData, GraphId, GraphRole, Position2D, Rect, Vertex, VertexId};
use crate::common::{SimError, SimResult};

/// Directed street network with coordinates, owned by exactly one node.
#[derive(Debug, Clone)]
pub struct StreetGraph {
    id: GraphId,
    role: GraphRole,
    graph: DiGraphMap<VertexId, f64>,
    positions: BTreeMap<VertexId, Position2D>,
    bounds: Option<Rect>,
}

impl StreetGraph {
    /// Validates raw source data and builds an unassigned graph from it.
    pub fn from_data(data: &GraphData) -> SimResult<Self> {
        let mut positions = BTreeMap::new();
        for vertex in &data.vertices {
            if !(vertex.position.x.is_finite() && vertex.position.y.is_finite()) {
                return Err(SimError::bad_source(format!(
                    "vertex {} has non-finite coordinates",
                    vertex.id
                )));
            }
            if positions.insert(vertex.id, vertex.position).is_some() {
                return Err(SimError::bad_source(format!(
                    "duplicate vertex id {}",
                    vertex.id
                )));
            }
        }

        let mut graph = DiGraphMap::with_capacity(positions.len(), data.edges.len());
        for id in positions.keys() {
            graph.add_node(*id);
        }
        for edge in &data.edges {
            if !positions.contains_key(&edge.source) || !positions.contains_key(&edge.target) {
                return Err(SimError::bad_source(format!(
                    "edge {} -> {} references an unknown vertex",
                    edge.source, edge.target
                )));
            }
            if !edge.length.is_finite() || edge.length < 0.0 {
                return Err(SimError::bad_source(format!(
                    "edge {} -> {} has invalid length {}",
                    edge.source, edge.target, edge.length
                )));
            }
            graph.add_edge(edge.source, edge.target, edge.length);
        }

        Ok(Self {
            id: 0,
            role: GraphRole::Unassigned,
            graph,
            positions,
            bounds: None,
        })
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn role(&self) -> GraphRole {
        self.role
    }

    pub fn is_root(&self) -> bool {
        self.role == GraphRole::Root
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.role, GraphRole::Leaf { .. })
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: VertexId) -> Option<Position2D> {
        self.positions.get(&id).copied()
    }

    pub fn edge_length(&self, source: VertexId, target: VertexId) -> Option<f64> {
        self.graph.edge_weight(source, target).copied()
    }

    /// Vertices in ascending id order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.positions
            .iter()
            .map(|(id, position)| Vertex { id: *id, position: *position })
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.positions.keys().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph.all_edges().map(|(source, target, length)| Edge {
            source,
            target,
            length: *length,
        })
    }

    pub fn out_degree(&self, id: VertexId) -> usize {
        if !self.graph.contains_node(id) {
            return 0;
        }
        self.graph.neighbors(id).count()
    }

    /// Shortest route between two vertices by edge length.
    pub fn shortest_route(&self, from: VertexId, to: VertexId) -> Option<(f64, Vec<VertexId>)> {
        if !self.graph.contains_node(from) || !self.graph.contains_node(to) {
            return None;
        }
        astar(&self.graph, from, |v| v == to, |e| *e.weight(), |_| 0.0)
    }

    pub(crate) fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub(crate) fn with_role(mut self, id: GraphId, role: GraphRole) -> Self {
        self.id = id;
        self.role = role;
        self
    }

    /// Copy of this graph restricted to `keep`, preserving vertex and edge order.
    pub(crate) fn retain_vertices(&self, keep: &HashSet<VertexId>) -> Self {
        let positions: BTreeMap<VertexId, Position2D> = self
            .positions
            .iter()
            .filter(|(id, _)| keep.contains(id))
            .map(|(id, p)| (*id, *p))
            .collect();

        let mut graph = DiGraphMap::with_capacity(positions.len(), 0);
        for id in positions.keys() {
            graph.add_node(*id);
        }
        for (source, target, length) in self.graph.all_edges() {
            if keep.contains(&source) && keep.contains(&target) {
                graph.add_edge(source, target, *length);
            }
        }

        Self {
            id: self.id,
            role: GraphRole::Unassigned,
            graph,
            positions,
            bounds: None,
        }
    }
}

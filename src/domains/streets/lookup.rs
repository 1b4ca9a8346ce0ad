use std::collections::{BTreeSet, HashMap};

use super::graph::StreetGraph;
use super::types::{GraphId, VertexId};
use crate::common::{SimError, SimResult};

/// Global vertex -> owning leaf map. Built once on the root, read-only after.
#[derive(Debug, Clone, Default)]
pub struct LeafLookup {
    owners: HashMap<VertexId, GraphId>,
}

impl LeafLookup {
    /// Checks every edge endpoint (and isolated vertex) of the root graph
    /// against every leaf's vertex set. A vertex claimed by two leaves means
    /// the partition overlaps and is rejected.
    pub fn build(root: &StreetGraph, leaves: &[StreetGraph]) -> SimResult<Self> {
        if !root.is_root() {
            return Err(SimError::partition(format!(
                "graph {} is not marked as root",
                root.id()
            )));
        }
        if let Some(stray) = leaves.iter().find(|l| !l.is_leaf()) {
            return Err(SimError::partition(format!(
                "graph {} is not marked as a leaf",
                stray.id()
            )));
        }
        let mut owners = HashMap::with_capacity(root.vertex_count());
        let endpoints = root
            .edges()
            .flat_map(|e| [e.source, e.target])
            .chain(root.vertex_ids());

        for vertex in endpoints {
            if owners.contains_key(&vertex) {
                continue;
            }
            let mut claimed = leaves.iter().filter(|l| l.contains_vertex(vertex));
            if let Some(leaf) = claimed.next() {
                if let Some(other) = claimed.next() {
                    return Err(SimError::partition(format!(
                        "vertex {} is owned by leaves {} and {}",
                        vertex,
                        leaf.id(),
                        other.id()
                    )));
                }
                owners.insert(vertex, leaf.id());
            }
        }
        Ok(Self { owners })
    }

    pub fn get(&self, vertex: VertexId) -> Option<GraphId> {
        self.owners.get(&vertex).copied()
    }

    pub fn leaf_for(&self, vertex: VertexId) -> SimResult<GraphId> {
        self.get(vertex).ok_or(SimError::Routing { vertex })
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn leaf_ids(&self) -> BTreeSet<GraphId> {
        self.owners.values().copied().collect()
    }

    pub fn vertices_of(&self, leaf: GraphId) -> BTreeSet<VertexId> {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == leaf)
            .map(|(vertex, _)| *vertex)
            .collect()
    }
}

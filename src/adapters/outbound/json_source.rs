use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::common::{SimError, SimResult};
use crate::domains::streets::{Edge, GraphData, GraphSource, Vertex, VertexId};

#[derive(Deserialize)]
struct RawEdge {
    source: VertexId,
    target: VertexId,
    #[serde(default)]
    length: Option<f64>,
}

#[derive(Deserialize)]
struct RawGraph {
    vertices: Vec<Vertex>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

/// Street graph stored as `{"vertices": [...], "edges": [...]}`.
/// Edges without a `length` get the straight-line distance between their
/// endpoints.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(text: &str) -> SimResult<GraphData> {
        let raw: RawGraph = serde_json::from_str(text)
            .map_err(|e| SimError::bad_source(format!("invalid graph JSON: {}", e)))?;
        let positions: HashMap<VertexId, _> =
            raw.vertices.iter().map(|v| (v.id, v.position)).collect();

        let mut edges = Vec::with_capacity(raw.edges.len());
        for edge in raw.edges {
            let length = match edge.length {
                Some(length) => length,
                None => match (positions.get(&edge.source), positions.get(&edge.target)) {
                    (Some(a), Some(b)) => a.distance_to(b),
                    _ => {
                        return Err(SimError::bad_source(format!(
                            "edge {} -> {} references an unknown vertex",
                            edge.source, edge.target
                        )))
                    }
                },
            };
            edges.push(Edge {
                source: edge.source,
                target: edge.target,
                length,
            });
        }
        Ok(GraphData {
            vertices: raw.vertices,
            edges,
        })
    }
}

impl GraphSource for JsonFileSource {
    fn load(&self) -> SimResult<GraphData> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SimError::bad_source(format!("{}: {}", self.path.display(), e)))?;
        Self::parse(&text)
    }
}

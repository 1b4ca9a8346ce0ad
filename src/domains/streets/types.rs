use serde::{Deserialize, Serialize};

pub type VertexId = i64;
pub type GraphId = usize;

pub const ROOT_GRAPH_ID: GraphId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl Position2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position2D) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    #[serde(flatten)]
    pub position: Position2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub length: f64,
}

/// Raw vertices and edges as delivered by a graph source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn vertex(&mut self, id: VertexId, x: f64, y: f64) -> &mut Self {
        self.vertices.push(Vertex {
            id,
            position: Position2D::new(x, y),
        });
        self
    }

    pub fn edge(&mut self, source: VertexId, target: VertexId, length: f64) -> &mut Self {
        self.edges.push(Edge {
            source,
            target,
            length,
        });
        self
    }
}

/// Axis-aligned rectangle. The right and top sides are open unless the
/// rectangle touches the outer bound, so adjacent cells never share a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub bottom_left: Position2D,
    pub top_right: Position2D,
    pub closed_right: bool,
    pub closed_top: bool,
}

impl Rect {
    /// A closed rectangle.
    pub fn new(bottom_left: Position2D, top_right: Position2D) -> Self {
        Self {
            bottom_left,
            top_right,
            closed_right: true,
            closed_top: true,
        }
    }

    pub fn width(&self) -> f64 {
        self.top_right.x - self.bottom_left.x
    }

    pub fn height(&self) -> f64 {
        self.top_right.y - self.bottom_left.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains(&self, p: &Position2D) -> bool {
        let in_x = p.x >= self.bottom_left.x
            && (p.x < self.top_right.x || (self.closed_right && p.x <= self.top_right.x));
        let in_y = p.y >= self.bottom_left.y
            && (p.y < self.top_right.y || (self.closed_top && p.y <= self.top_right.y));
        in_x && in_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphRole {
    Unassigned,
    Root,
    Leaf { leaf_id: GraphId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionLayout {
    /// Equal-width vertical strips, left to right.
    #[default]
    Strips,
    /// rows x cols cells, row-major from the bottom-left corner.
    Grid,
}

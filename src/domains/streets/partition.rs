//! Spatial partitioning of a street graph into equal-area rectangular cells.
//!
//! Every function here is pure: it takes a graph and returns a new value, so
//! root and leaves run the same pipeline on the same source and arrive at the
//! same cell boundaries without exchanging them.

use std::collections::HashSet;

use super::graph::StreetGraph;
use super::ports::GraphSource;
use super::types::{GraphData, GraphId, GraphRole, PartitionLayout, Position2D, Rect, ROOT_GRAPH_ID};
use crate::common::{SimError, SimResult};

pub fn build_from_source(source: &dyn GraphSource) -> SimResult<StreetGraph> {
    let data = source.load()?;
    StreetGraph::from_data(&data)
}

/// Enclosing rectangle of all vertex coordinates.
pub fn compute_bounds(graph: &StreetGraph) -> SimResult<Rect> {
    let mut vertices = graph.vertices();
    let first = vertices
        .next()
        .ok_or_else(|| SimError::bad_source("graph has no vertices"))?;

    let (mut min, mut max) = (first.position, first.position);
    for v in vertices {
        min.x = min.x.min(v.position.x);
        min.y = min.y.min(v.position.y);
        max.x = max.x.max(v.position.x);
        max.y = max.y.max(v.position.y);
    }
    Ok(Rect::new(min, max))
}

/// Rows and columns for `rects` cells under `layout`.
pub fn grid_shape(rects: usize, layout: PartitionLayout) -> (usize, usize) {
    match layout {
        PartitionLayout::Strips => (1, rects),
        PartitionLayout::Grid => {
            let mut rows = 1;
            let mut candidate = 1;
            while candidate * candidate <= rects {
                if rects % candidate == 0 {
                    rows = candidate;
                }
                candidate += 1;
            }
            (rows, rects / rows)
        }
    }
}

/// All cells of `bounds`, row-major from the bottom-left.
pub fn cells(bounds: &Rect, rects: usize, layout: PartitionLayout) -> SimResult<Vec<Rect>> {
    if rects == 0 {
        return Err(SimError::partition("number of rectangles must be positive"));
    }
    let (rows, cols) = grid_shape(rects, layout);
    let width = bounds.width() / cols as f64;
    let height = bounds.height() / rows as f64;

    // The outermost boundaries are taken from `bounds` directly so rounding
    // never leaves a sliver outside the last cell.
    let x_at = |col: usize| {
        if col == cols {
            bounds.top_right.x
        } else {
            bounds.bottom_left.x + width * col as f64
        }
    };
    let y_at = |row: usize| {
        if row == rows {
            bounds.top_right.y
        } else {
            bounds.bottom_left.y + height * row as f64
        }
    };

    let mut out = Vec::with_capacity(rects);
    for row in 0..rows {
        for col in 0..cols {
            out.push(Rect {
                bottom_left: Position2D::new(x_at(col), y_at(row)),
                top_right: Position2D::new(x_at(col + 1), y_at(row + 1)),
                closed_right: col + 1 == cols,
                closed_top: row + 1 == rows,
            });
        }
    }
    Ok(out)
}

/// Splits the graph's bounding rectangle into `rects` cells and returns cell `pick`.
pub fn subdivide(
    graph: &StreetGraph,
    rects: usize,
    pick: usize,
    layout: PartitionLayout,
) -> SimResult<Rect> {
    let bounds = compute_bounds(graph)?;
    let mut all = cells(&bounds, rects, layout)?;
    if pick >= all.len() {
        return Err(SimError::partition(format!(
            "picked rectangle {} of {}",
            pick, rects
        )));
    }
    Ok(all.swap_remove(pick))
}

/// Vertices inside `rect` and the edges between them, as graph `id`.
pub fn filter_to_rect(graph: &StreetGraph, rect: &Rect, id: GraphId) -> StreetGraph {
    let keep: HashSet<_> = graph
        .vertices()
        .filter(|v| rect.contains(&v.position))
        .map(|v| v.id)
        .collect();
    graph
        .retain_vertices(&keep)
        .with_role(id, GraphRole::Unassigned)
        .with_bounds(*rect)
}

pub fn mark_as_root(graph: StreetGraph) -> StreetGraph {
    graph.with_role(ROOT_GRAPH_ID, GraphRole::Root)
}

pub fn mark_as_leaf(graph: StreetGraph, root: &StreetGraph, leaf_id: GraphId) -> SimResult<StreetGraph> {
    if leaf_id == ROOT_GRAPH_ID {
        return Err(SimError::partition("leaf ids start at 1"));
    }
    if let Some(stray) = graph.vertex_ids().find(|v| !root.contains_vertex(*v)) {
        return Err(SimError::partition(format!(
            "leaf {} holds vertex {} missing from the root graph",
            leaf_id, stray
        )));
    }
    Ok(graph.with_role(leaf_id, GraphRole::Leaf { leaf_id }))
}

/// source data -> graph -> bounds -> single cell -> root.
pub fn build_root_graph(data: &GraphData) -> SimResult<StreetGraph> {
    let graph = StreetGraph::from_data(data)?;
    let rect = subdivide(&graph, 1, 0, PartitionLayout::Strips)?;
    Ok(mark_as_root(filter_to_rect(&graph, &rect, ROOT_GRAPH_ID)))
}

/// Leaf `leaf_id` (1-based) of `rects` cells over the root graph.
pub fn build_leaf_graph(
    root: &StreetGraph,
    rects: usize,
    leaf_id: GraphId,
    layout: PartitionLayout,
) -> SimResult<StreetGraph> {
    if leaf_id == ROOT_GRAPH_ID {
        return Err(SimError::partition("leaf ids start at 1"));
    }
    let rect = subdivide(root, rects, leaf_id - 1, layout)?;
    mark_as_leaf(filter_to_rect(root, &rect, leaf_id), root, leaf_id)
}

pub fn build_leaf_graphs(
    root: &StreetGraph,
    rects: usize,
    layout: PartitionLayout,
) -> SimResult<Vec<StreetGraph>> {
    (1..=rects)
        .map(|leaf_id| build_leaf_graph(root, rects, leaf_id, layout))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape_prefers_square_layouts() {
        assert_eq!(grid_shape(4, PartitionLayout::Grid), (2, 2));
        assert_eq!(grid_shape(6, PartitionLayout::Grid), (2, 3));
        assert_eq!(grid_shape(7, PartitionLayout::Grid), (1, 7));
        assert_eq!(grid_shape(4, PartitionLayout::Strips), (1, 4));
    }

    #[test]
    fn cells_cover_bounds_with_equal_area() {
        let bounds = Rect::new(Position2D::new(0.0, 0.0), Position2D::new(12.0, 6.0));
        let all = cells(&bounds, 6, PartitionLayout::Grid).unwrap();
        assert_eq!(all.len(), 6);
        for cell in &all {
            assert!((cell.area() - 12.0).abs() < 1e-9);
        }
        assert_eq!(all[5].top_right, bounds.top_right);
        assert!(all[5].closed_right && all[5].closed_top);
        assert!(!all[0].closed_right && !all[0].closed_top);
    }

    #[test]
    fn boundary_points_belong_to_one_cell() {
        let bounds = Rect::new(Position2D::new(0.0, 0.0), Position2D::new(10.0, 10.0));
        let all = cells(&bounds, 2, PartitionLayout::Strips).unwrap();
        let on_split = Position2D::new(5.0, 3.0);
        let owners = all.iter().filter(|c| c.contains(&on_split)).count();
        assert_eq!(owners, 1);
        assert!(all[1].contains(&on_split));
        assert!(all[1].contains(&Position2D::new(10.0, 10.0)));
    }

    #[test]
    fn zero_rectangles_is_rejected() {
        let bounds = Rect::new(Position2D::new(0.0, 0.0), Position2D::new(1.0, 1.0));
        assert!(matches!(
            cells(&bounds, 0, PartitionLayout::Strips),
            Err(SimError::Partition { .. })
        ));
    }
}

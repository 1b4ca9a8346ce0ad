use std::collections::BTreeSet;

use streetsim::domains::streets::{
    build_leaf_graph, build_leaf_graphs, build_root_graph, compute_bounds, filter_to_rect,
    mark_as_leaf, subdivide, GraphData, GraphRole, LeafLookup, PartitionLayout, StreetGraph,
    VertexId,
};
use streetsim::SimError;

/// Two vertices on the left half, two on the right, joined in a loop.
fn split_graph() -> StreetGraph {
    let mut data = GraphData::default();
    data.vertex(1, 0.0, 0.0)
        .vertex(2, 1.0, 1.0)
        .vertex(3, 3.0, 0.0)
        .vertex(4, 4.0, 1.0)
        .edge(1, 2, 1.5)
        .edge(2, 3, 2.5)
        .edge(3, 4, 1.5)
        .edge(4, 1, 4.2);
    build_root_graph(&data).unwrap()
}

fn grid(cols: i64, rows: i64) -> StreetGraph {
    let mut data = GraphData::default();
    for row in 0..rows {
        for col in 0..cols {
            data.vertex(row * cols + col, col as f64 * 10.0, row as f64 * 10.0);
        }
    }
    for row in 0..rows {
        for col in 0..cols {
            let id = row * cols + col;
            if col + 1 < cols {
                data.edge(id, id + 1, 10.0).edge(id + 1, id, 10.0);
            }
            if row + 1 < rows {
                data.edge(id, id + cols, 10.0).edge(id + cols, id, 10.0);
            }
        }
    }
    build_root_graph(&data).unwrap()
}

fn ids(graph: &StreetGraph) -> BTreeSet<VertexId> {
    graph.vertex_ids().collect()
}

#[test]
fn root_graph_keeps_everything() {
    let root = split_graph();
    assert_eq!(root.role(), GraphRole::Root);
    assert!(root.is_root() && !root.is_leaf());
    assert_eq!(root.id(), 0);
    assert_eq!(root.vertex_count(), 4);
    assert_eq!(root.edge_count(), 4);
    let bounds = compute_bounds(&root).unwrap();
    assert_eq!((bounds.bottom_left.x, bounds.bottom_left.y), (0.0, 0.0));
    assert_eq!((bounds.top_right.x, bounds.top_right.y), (4.0, 1.0));
}

#[test]
fn two_strips_split_left_from_right() {
    let root = split_graph();
    let leaves = build_leaf_graphs(&root, 2, PartitionLayout::Strips).unwrap();

    assert_eq!(ids(&leaves[0]), BTreeSet::from([1, 2]));
    assert_eq!(ids(&leaves[1]), BTreeSet::from([3, 4]));
    assert_eq!(leaves[0].role(), GraphRole::Leaf { leaf_id: 1 });
    assert!(leaves.iter().all(|l| l.is_leaf() && !l.is_root()));
    assert_eq!(leaves[1].id(), 2);

    // Only edges with both ends inside survive.
    assert_eq!(leaves[0].edge_length(1, 2), Some(1.5));
    assert_eq!(leaves[0].edge_length(2, 3), None);
    assert_eq!(leaves[1].edge_length(3, 4), Some(1.5));
    assert_eq!(leaves[1].edge_count(), 1);

    let lookup = LeafLookup::build(&root, &leaves).unwrap();
    assert_eq!(lookup.leaf_ids(), BTreeSet::from([1, 2]));
    assert_eq!(lookup.vertices_of(1), BTreeSet::from([1, 2]));
    assert_eq!(lookup.vertices_of(2), BTreeSet::from([3, 4]));
    assert_eq!(lookup.leaf_for(3).unwrap(), 2);
}

#[test]
fn every_vertex_has_exactly_one_owner() {
    let root = grid(7, 5);
    for layout in [PartitionLayout::Strips, PartitionLayout::Grid] {
        for rects in 1..=6 {
            let leaves = build_leaf_graphs(&root, rects, layout).unwrap();
            let total: usize = leaves.iter().map(|l| l.vertex_count()).sum();
            assert_eq!(total, root.vertex_count(), "{:?} x{}", layout, rects);

            let lookup = LeafLookup::build(&root, &leaves).unwrap();
            assert_eq!(lookup.len(), root.vertex_count());
            for vertex in root.vertex_ids() {
                assert!(lookup.get(vertex).is_some(), "vertex {} unowned", vertex);
            }
        }
    }
}

#[test]
fn partitioning_is_deterministic() {
    let root = grid(6, 6);
    for leaf_id in 1..=4 {
        let a = build_leaf_graph(&root, 4, leaf_id, PartitionLayout::Grid).unwrap();
        let b = build_leaf_graph(&root, 4, leaf_id, PartitionLayout::Grid).unwrap();
        assert_eq!(a.vertices().collect::<Vec<_>>(), b.vertices().collect::<Vec<_>>());
        assert_eq!(a.edges().collect::<Vec<_>>(), b.edges().collect::<Vec<_>>());
        assert_eq!(a.bounds(), b.bounds());
    }
}

#[test]
fn out_of_range_picks_are_rejected() {
    let root = split_graph();
    assert!(matches!(
        subdivide(&root, 2, 2, PartitionLayout::Strips),
        Err(SimError::Partition { .. })
    ));
    assert!(matches!(
        subdivide(&root, 0, 0, PartitionLayout::Strips),
        Err(SimError::Partition { .. })
    ));
    assert!(matches!(
        build_leaf_graph(&root, 2, 0, PartitionLayout::Strips),
        Err(SimError::Partition { .. })
    ));
}

#[test]
fn leaf_with_foreign_vertex_is_rejected() {
    let root = split_graph();
    let mut data = GraphData::default();
    data.vertex(1, 0.0, 0.0).vertex(99, 0.5, 0.5);
    let stranger = StreetGraph::from_data(&data).unwrap();
    let rect = compute_bounds(&stranger).unwrap();
    let filtered = filter_to_rect(&stranger, &rect, 1);

    assert!(matches!(
        mark_as_leaf(filtered, &root, 1),
        Err(SimError::Partition { .. })
    ));
}

#[test]
fn overlapping_leaves_are_rejected_by_lookup() {
    let root = split_graph();
    let first = build_leaf_graph(&root, 1, 1, PartitionLayout::Strips).unwrap();
    let second = build_leaf_graph(&root, 1, 1, PartitionLayout::Strips).unwrap();
    assert!(matches!(
        LeafLookup::build(&root, &[first, second]),
        Err(SimError::Partition { .. })
    ));
}

#[test]
fn malformed_graph_data_is_a_source_error() {
    let mut duplicate = GraphData::default();
    duplicate.vertex(1, 0.0, 0.0).vertex(1, 1.0, 1.0);
    assert!(matches!(
        StreetGraph::from_data(&duplicate),
        Err(SimError::Source { .. })
    ));

    let mut dangling = GraphData::default();
    dangling.vertex(1, 0.0, 0.0).edge(1, 2, 1.0);
    assert!(matches!(
        StreetGraph::from_data(&dangling),
        Err(SimError::Source { .. })
    ));

    let mut negative = GraphData::default();
    negative.vertex(1, 0.0, 0.0).vertex(2, 1.0, 0.0).edge(1, 2, -1.0);
    assert!(matches!(
        StreetGraph::from_data(&negative),
        Err(SimError::Source { .. })
    ));

    assert!(matches!(
        build_root_graph(&GraphData::default()),
        Err(SimError::Source { .. })
    ));
}

#[test]
fn lookup_needs_a_root_and_leaves() {
    let root = split_graph();
    let leaves = build_leaf_graphs(&root, 2, PartitionLayout::Strips).unwrap();

    // Swapped arguments: a leaf in the root slot and the root among the leaves.
    assert!(matches!(
        LeafLookup::build(&leaves[0], &leaves),
        Err(SimError::Partition { .. })
    ));
    assert!(matches!(
        LeafLookup::build(&root, &[leaves[0].clone(), root.clone()]),
        Err(SimError::Partition { .. })
    ));

    // Rects that hold no vertex do not show up as owners.
    let sparse = build_leaf_graphs(&root, 4, PartitionLayout::Strips).unwrap();
    let lookup = LeafLookup::build(&root, &sparse).unwrap();
    let occupied: BTreeSet<_> = sparse
        .iter()
        .filter(|l| l.vertex_count() > 0)
        .map(|l| l.id())
        .collect();
    assert_eq!(lookup.leaf_ids(), occupied);
    assert_eq!(lookup.len(), root.vertex_count());
}

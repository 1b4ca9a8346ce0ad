use std::time::Duration;
use streetsim::adapters::inbound::LocalNetwork;
use streetsim::adapters::outbound::init_noop_logger;
use streetsim::application::{
    run_leaf_node, run_local_cluster, run_root_node, RunSummary, Simulation,
};
use streetsim::config::{Config, ExecutionMode};
use streetsim::domains::coordination::{
    EdgeLengthRequest, EdgeLengthResponse, Message, ROOT_RANK,
};
use streetsim::domains::streets::{
    build_leaf_graphs, build_root_graph, GraphData, LeafLookup, PartitionLayout,
};
use streetsim::domains::vehicles::{Vehicle, VehicleRecord};
use streetsim::SimError;
use tokio_util::sync::CancellationToken;

fn grid(cols: i64, rows: i64) -> GraphData {
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
    data
}

fn config(vehicles: usize) -> Config {
    let mut config = Config::default();
    config.simulation.vehicles = vehicles;
    config.simulation.seed = Some(42);
    config
}

async fn local_vehicles(config: Config, data: &GraphData) -> Vec<Vehicle> {
    match Simulation::new(config, init_noop_logger()).run_with_source(data).await {
        Ok(RunSummary::Local { vehicles }) => vehicles,
        other => panic!("expected a local run, got {:?}", other),
    }
}

async fn distributed_report(
    mut config: Config,
    data: &GraphData,
    world_size: usize,
) -> streetsim::application::SimulationReport {
    config.simulation.distributed = true;
    config.network.world_size = world_size;
    match Simulation::new(config, init_noop_logger()).run_with_source(data).await {
        Ok(RunSummary::Root(report)) => report,
        other => panic!("expected a root report, got {:?}", other),
    }
}

fn assert_same_outcome(local: &[Vehicle], parked: &[VehicleRecord]) {
    assert_eq!(local.len(), parked.len());
    for (vehicle, record) in local.iter().zip(parked) {
        assert_eq!(vehicle.id, record.id);
        assert!(vehicle.is_parked() && record.is_parked);
        assert_eq!(record.prev_vertex, vehicle.destination());
        assert_eq!(record.route, vehicle.route());
        assert!((record.distance - vehicle.distance_travelled()).abs() < 1e-6);
        assert_eq!(record.steps, vehicle.steps());
    }
}

#[tokio::test]
async fn sequential_and_concurrent_runs_agree() {
    let data = grid(6, 6);
    let sequential = local_vehicles(config(50), &data).await;

    let mut concurrent_config = config(50);
    concurrent_config.simulation.mode = ExecutionMode::Concurrent;
    let concurrent = local_vehicles(concurrent_config, &data).await;

    assert_eq!(sequential.len(), 50);
    assert!(sequential.iter().all(|v| v.is_parked()));
    assert_eq!(sequential, concurrent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distributed_run_parks_every_vehicle_where_the_local_run_does() {
    let data = grid(6, 6);
    let local = local_vehicles(config(40), &data).await;

    for world_size in [2, 3, 5] {
        let report = distributed_report(config(40), &data, world_size).await;
        assert!(report.abandoned.is_empty(), "world {}: {:?}", world_size, report.abandoned);
        assert_same_outcome(&local, &report.parked);
        // One length query per emission and one per migration.
        assert_eq!(report.length_requests, 40 + report.migrations);
        if world_size > 2 {
            assert!(report.migrations > 0);
        }
    }
}

#[tokio::test]
async fn grid_layout_and_length_cache_give_the_same_result() {
    let data = grid(8, 5);
    let local = local_vehicles(config(30), &data).await;

    let mut cached = config(30);
    cached.simulation.partition_layout = PartitionLayout::Grid;
    cached.simulation.cache_edge_lengths = true;
    let report = distributed_report(cached, &data, 5).await;

    assert_same_outcome(&local, &report.parked);
    assert!(report.length_requests <= 30 + report.migrations);
}

#[tokio::test]
async fn distributed_mode_needs_two_workers() {
    let mut config = config(5);
    config.simulation.distributed = true;
    config.network.world_size = 1;
    let result = Simulation::new(config, init_noop_logger())
        .run_with_source(&grid(3, 3))
        .await;
    assert!(matches!(result, Err(SimError::InsufficientWorkers { world_size: 1 })));
}

#[tokio::test]
async fn failed_drive_task_is_reported_and_the_leaf_keeps_running() {
    let root = build_root_graph(&grid(4, 1)).unwrap();
    let mut leaves = build_leaf_graphs(&root, 1, PartitionLayout::Strips).unwrap();
    let mut endpoints = LocalNetwork::endpoints(2).into_iter();
    let mut root_end = endpoints.next().unwrap();
    let leaf_end = endpoints.next().unwrap();

    let leaf = tokio::spawn(run_leaf_node(
        leaves.remove(0),
        leaf_end,
        false,
        CancellationToken::new(),
        init_noop_logger(),
    ));

    let transport = root_end.transport.clone();
    let send = |message: Message| {
        let transport = transport.clone();
        async move { transport.send(1, message).await.unwrap() }
    };

    // First vehicle: the root claims not to know its edge.
    let doomed = Vehicle::new(1, vec![0, 1, 2], 1.0, 10.0, 5.0, &root).unwrap();
    send(Message::EmitVehicle(doomed.to_record())).await;
    let request = match root_end.inbound.recv().await.unwrap().message {
        Message::EdgeLengthRequest(request) => request,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!((request.source, request.target), (0, 1));
    send(Message::EdgeLengthResponse(EdgeLengthResponse {
        request_id: request.request_id,
        length: None,
    }))
    .await;
    match root_end.inbound.recv().await.unwrap().message {
        Message::VehicleAbandoned { vehicle_id, .. } => assert_eq!(vehicle_id, 1),
        other => panic!("unexpected {:?}", other),
    }

    // Second vehicle drives normally on the same leaf.
    let healthy = Vehicle::new(2, vec![1, 2, 3], 1.0, 10.0, 10.0, &root).unwrap();
    send(Message::EmitVehicle(healthy.to_record())).await;
    let request = match root_end.inbound.recv().await.unwrap().message {
        Message::EdgeLengthRequest(request) => request,
        other => panic!("unexpected {:?}", other),
    };
    send(Message::EdgeLengthResponse(EdgeLengthResponse {
        request_id: request.request_id,
        length: Some(10.0),
    }))
    .await;
    let envelope = root_end.inbound.recv().await.unwrap();
    assert_eq!(envelope.to, ROOT_RANK);
    match envelope.message {
        Message::VehicleParked(record) => {
            assert_eq!(record.id, 2);
            assert_eq!(record.prev_vertex, 3);
        }
        other => panic!("unexpected {:?}", other),
    }

    send(Message::Shutdown).await;
    let summary = leaf.await.unwrap().unwrap();
    assert_eq!(summary.received, 2);
    assert_eq!(summary.parked, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.migrated, 0);
}

#[tokio::test]
async fn route_back_into_its_own_strip_needs_no_migration() {
    // 1 and 3 sit in the left strip, 2 in the right one.
    let mut data = GraphData::default();
    data.vertex(1, 0.0, 0.0)
        .vertex(2, 3.0, 0.0)
        .vertex(3, 1.0, 0.0)
        .edge(1, 2, 3.0)
        .edge(2, 3, 2.0);
    let root = build_root_graph(&data).unwrap();
    let mut whole = Vehicle::new(3, vec![1, 2, 3], 1.0, 2.0, 1.0, &root).unwrap();
    let start = whole.clone();
    whole.drive(&root).unwrap();

    let mut config = config(1);
    config.simulation.distributed = true;
    config.network.world_size = 3;
    let report = run_local_cluster(&config, root, vec![start], init_noop_logger())
        .await
        .unwrap();

    assert_eq!(report.migrations, 0);
    // 1 -> 2 on arrival, then 2 -> 3 on the way back in.
    assert_eq!(report.length_requests, 2);
    assert_same_outcome(&[whole], &report.parked);
}

#[tokio::test]
async fn unroutable_migration_stops_the_root_and_shuts_down_every_leaf() {
    let root = build_root_graph(&grid(4, 1)).unwrap();
    let leaves = build_leaf_graphs(&root, 2, PartitionLayout::Strips).unwrap();
    let lookup = LeafLookup::build(&root, &leaves).unwrap();
    let mut endpoints = LocalNetwork::endpoints(3).into_iter();
    let root_end = endpoints.next().unwrap();
    let mut leaf_ends: Vec<_> = endpoints.collect();

    let vehicle = Vehicle::new(1, vec![0, 1, 2], 1.0, 10.0, 5.0, &root).unwrap();
    let mut stray = vehicle.to_record();
    stray.next_vertex = Some(42);

    let node = tokio::spawn(run_root_node(
        root,
        lookup,
        root_end,
        vec![vehicle],
        CancellationToken::new(),
        init_noop_logger(),
    ));

    match leaf_ends[0].inbound.recv().await.unwrap().message {
        Message::EmitVehicle(record) => assert_eq!(record.id, 1),
        other => panic!("unexpected {:?}", other),
    }
    leaf_ends[0]
        .transport
        .send(ROOT_RANK, Message::MigrateVehicle(stray))
        .await
        .unwrap();

    let result = node.await.unwrap();
    assert!(matches!(result, Err(SimError::Routing { vertex: 42 })));
    for leaf in leaf_ends.iter_mut() {
        assert_eq!(leaf.inbound.recv().await.unwrap().message, Message::Shutdown);
    }

    // The length server went down with the relay.
    let request = EdgeLengthRequest { request_id: 0, source: 0, target: 1 };
    let _ = leaf_ends[0]
        .transport
        .send(ROOT_RANK, Message::EdgeLengthRequest(request))
        .await;
    assert!(
        tokio::time::timeout(Duration::from_millis(100), leaf_ends[0].inbound.recv())
            .await
            .is_err()
    );
}

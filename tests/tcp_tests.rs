use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use streetsim::adapters::inbound::TcpNetwork;
use streetsim::adapters::outbound::init_noop_logger;
use streetsim::application::{RunSummary, Simulation};
use streetsim::config::{Config, NetworkConfig, TransportKind};
use streetsim::domains::streets::GraphData;
use streetsim::domains::coordination::{EdgeLengthRequest, EdgeLengthResponse, Message, ROOT_RANK};
use streetsim::SimError;

fn network(address: String, world_size: usize, rank: usize) -> NetworkConfig {
    NetworkConfig {
        world_size,
        rank,
        root_address: address,
        connect_attempts: 20,
        connect_backoff_ms: 20,
        ..NetworkConfig::default()
    }
}

#[tokio::test]
async fn envelopes_travel_both_ways() {
    let listener = TcpNetwork::bind_root(&network("127.0.0.1:0".into(), 3, 0)).await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let root_config = network(address.clone(), 3, 0);
    let root = tokio::spawn(async move {
        TcpNetwork::accept_leaves(listener, &root_config, init_noop_logger()).await
    });
    let mut first = TcpNetwork::connect_leaf(&network(address.clone(), 3, 1), init_noop_logger())
        .await
        .unwrap();
    let mut second = TcpNetwork::connect_leaf(&network(address, 3, 2), init_noop_logger())
        .await
        .unwrap();
    let mut root = root.await.unwrap().unwrap();
    assert_eq!(root.rank(), ROOT_RANK);
    assert_eq!(second.rank(), 2);

    let request = EdgeLengthRequest { request_id: 4, source: 10, target: 11 };
    second
        .transport
        .send(ROOT_RANK, Message::EdgeLengthRequest(request))
        .await
        .unwrap();
    let envelope = root.inbound.recv().await.unwrap();
    assert_eq!(envelope.from, 2);
    assert_eq!(envelope.message, Message::EdgeLengthRequest(request));

    let response = Message::EdgeLengthResponse(EdgeLengthResponse { request_id: 4, length: Some(12.5) });
    root.transport.send(2, response.clone()).await.unwrap();
    root.transport.send(1, Message::Shutdown).await.unwrap();
    assert_eq!(second.inbound.recv().await.unwrap().message, response);
    assert_eq!(first.inbound.recv().await.unwrap().message, Message::Shutdown);

    // Leaves only talk to the root.
    assert!(matches!(
        first.transport.send(2, Message::Shutdown).await,
        Err(SimError::Protocol(_))
    ));
}

#[tokio::test]
async fn bad_handshakes_are_refused() {
    let listener = TcpNetwork::bind_root(&network("127.0.0.1:0".into(), 2, 0)).await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let root_config = network(address.clone(), 2, 0);
    let root = tokio::spawn(async move {
        TcpNetwork::accept_leaves(listener, &root_config, init_noop_logger()).await
    });

    // Rank 7 does not exist in a world of two.
    let mut stranger = TcpStream::connect(&address).await.unwrap();
    stranger.write_u32(7).await.unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(stranger.read(&mut buf).await.unwrap_or(0), 0);

    let leaf = TcpNetwork::connect_leaf(&network(address.clone(), 2, 1), init_noop_logger())
        .await
        .unwrap();
    let root = root.await.unwrap().unwrap();
    assert_eq!(root.transport.world_size(), 2);

    // The slot is taken now; a second rank 1 gets nowhere.
    drop(leaf);
    assert!(matches!(
        TcpNetwork::connect_leaf(&network(address, 2, 1), init_noop_logger()).await,
        Err(SimError::Protocol(_))
    ));
}

#[tokio::test]
async fn silent_connection_does_not_block_other_leaves() {
    let listener = TcpNetwork::bind_root(&network("127.0.0.1:0".into(), 2, 0)).await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let mut root_config = network(address.clone(), 2, 0);
    root_config.handshake_timeout_ms = 100;
    let root = tokio::spawn(async move {
        TcpNetwork::accept_leaves(listener, &root_config, init_noop_logger()).await
    });

    // Connects first and never sends a rank.
    let mut silent = TcpStream::connect(&address).await.unwrap();

    let leaf = TcpNetwork::connect_leaf(&network(address, 2, 1), init_noop_logger())
        .await
        .unwrap();
    let root = tokio::time::timeout(std::time::Duration::from_secs(5), root)
        .await
        .expect("root kept waiting on the silent connection")
        .unwrap()
        .unwrap();
    assert_eq!(root.transport.world_size(), 2);
    assert_eq!(leaf.rank(), 1);

    // The silent peer was dropped without an acknowledgement.
    let mut buf = [0u8; 1];
    assert_eq!(silent.read(&mut buf).await.unwrap_or(0), 0);
}

#[tokio::test]
async fn leaves_must_have_a_leaf_rank() {
    assert!(matches!(
        TcpNetwork::connect_leaf(&network("127.0.0.1:1".into(), 2, 0), init_noop_logger()).await,
        Err(SimError::Configuration(_))
    ));
}

#[tokio::test]
async fn unreachable_root_gives_up_after_retries() {
    // Bind and release a port so nothing is listening on it.
    let listener = TcpNetwork::bind_root(&network("127.0.0.1:0".into(), 2, 0)).await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut config = network(address, 2, 1);
    config.connect_attempts = 2;
    config.connect_backoff_ms = 1;
    assert!(matches!(
        TcpNetwork::connect_leaf(&config, init_noop_logger()).await,
        Err(SimError::Protocol(_))
    ));
}

fn ring(n: i64) -> GraphData {
    let mut data = GraphData::default();
    for i in 0..n {
        let angle = i as f64 / n as f64 * std::f64::consts::TAU;
        data.vertex(i, 50.0 * angle.cos(), 50.0 * angle.sin());
    }
    for i in 0..n {
        let next = (i + 1) % n;
        data.edge(i, next, 10.0).edge(next, i, 10.0);
    }
    data
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulation_runs_across_tcp_nodes() {
    let port_finder = TcpNetwork::bind_root(&network("127.0.0.1:0".into(), 2, 0)).await.unwrap();
    let address = port_finder.local_addr().unwrap().to_string();
    drop(port_finder);

    let mut nodes = Vec::new();
    for rank in 0..3 {
        let mut config = Config::default();
        config.simulation.vehicles = 12;
        config.simulation.seed = Some(5);
        config.simulation.distributed = true;
        config.network = network(address.clone(), 3, rank);
        config.network.transport = TransportKind::Tcp;
        let data = ring(12);
        nodes.push(tokio::spawn(async move {
            Simulation::new(config, init_noop_logger())
                .run_with_source(&data)
                .await
        }));
    }

    let mut parked_on_leaves = 0;
    let mut root_parked = None;
    for node in nodes {
        match node.await.unwrap().unwrap() {
            RunSummary::Root(report) => {
                assert!(report.abandoned.is_empty());
                root_parked = Some(report.parked.len());
            }
            RunSummary::Leaf(summary) => {
                assert_eq!(summary.failed, 0);
                parked_on_leaves += summary.parked;
            }
            RunSummary::Local { .. } => panic!("no local run expected"),
        }
    }
    assert_eq!(root_parked, Some(12));
    assert_eq!(parked_on_leaves, 12);
}

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::leaf::{LeafSummary, LeafWorker};
use super::local_runner::{run_concurrently, run_sequentially};
use super::root::{RootOrchestrator, SimulationReport};
use crate::adapters::inbound::{LocalNetwork, TcpNetwork};
use crate::adapters::outbound::open_graph_source;
use crate::common::{SimError, SimResult};
use crate::config::{Config, ExecutionMode, TransportKind};
use crate::domains::coordination::{Endpoint, LeafMailbox, RootMailbox, ROOT_RANK};
use crate::domains::logger::DynLogger;
use crate::domains::streets::{
    build_leaf_graph, build_leaf_graphs, build_root_graph, GraphRegistry, GraphSource, LeafLookup,
    StreetGraph,
};
use crate::domains::vehicles::{Vehicle, VehicleFactory};

#[derive(Debug)]
pub enum RunSummary {
    /// Single-graph run; vehicles in creation order.
    Local { vehicles: Vec<Vehicle> },
    Root(SimulationReport),
    Leaf(LeafSummary),
}

pub struct Simulation {
    config: Config,
    logger: DynLogger,
}

impl Simulation {
    pub fn new(config: Config, logger: DynLogger) -> Self {
        Self { config, logger }
    }

    pub async fn run(&self) -> SimResult<RunSummary> {
        let source = open_graph_source(&self.config.simulation.graph_path);
        self.run_with_source(source.as_ref()).await
    }

    pub async fn run_with_source(&self, source: &dyn GraphSource) -> SimResult<RunSummary> {
        self.config.validate()?;
        let sim = &self.config.simulation;
        let network = &self.config.network;

        let root = build_root_graph(&source.load()?)?;
        self.logger.info(&format!(
            "street graph: {} vertices, {} edges",
            root.vertex_count(),
            root.edge_count()
        ));

        if !sim.distributed {
            let vehicles = self.create_vehicles(&root)?;
            return self.run_local(root, vehicles).await;
        }
        if network.world_size < 2 {
            return Err(SimError::InsufficientWorkers {
                world_size: network.world_size,
            });
        }

        match network.transport {
            TransportKind::Local => {
                let vehicles = self.create_vehicles(&root)?;
                run_local_cluster(&self.config, root, vehicles, self.logger.clone())
                    .await
                    .map(RunSummary::Root)
            }
            TransportKind::Tcp if network.rank == ROOT_RANK => {
                let vehicles = self.create_vehicles(&root)?;
                self.run_tcp_root(root, vehicles).await.map(RunSummary::Root)
            }
            TransportKind::Tcp => self.run_tcp_leaf(root).await.map(RunSummary::Leaf),
        }
    }

    fn create_vehicles(&self, root: &StreetGraph) -> SimResult<Vec<Vehicle>> {
        let mut factory = VehicleFactory::from_config(&self.config.simulation)?;
        let vehicles = factory.spawn(self.config.simulation.vehicles, root)?;
        self.logger
            .info(&format!("created {} vehicles", vehicles.len()));
        Ok(vehicles)
    }

    async fn run_local(&self, root: StreetGraph, mut vehicles: Vec<Vehicle>) -> SimResult<RunSummary> {
        let mut registry = GraphRegistry::new();
        let graph = registry.insert(root);
        let vehicles = match self.config.simulation.mode {
            ExecutionMode::Sequential => {
                run_sequentially(&mut vehicles, &graph)?;
                vehicles
            }
            ExecutionMode::Concurrent => run_concurrently(vehicles, graph).await?,
        };
        let distance: f64 = vehicles.iter().map(|v| v.distance_travelled()).sum();
        self.logger.info(&format!(
            "{:?} run finished: {} vehicles parked, {:.1} total distance",
            self.config.simulation.mode,
            vehicles.iter().filter(|v| v.is_parked()).count(),
            distance
        ));
        Ok(RunSummary::Local { vehicles })
    }

    async fn run_tcp_root(&self, root: StreetGraph, vehicles: Vec<Vehicle>) -> SimResult<SimulationReport> {
        let network = &self.config.network;
        let leaves = build_leaf_graphs(
            &root,
            network.world_size - 1,
            self.config.simulation.partition_layout,
        )?;
        let lookup = LeafLookup::build(&root, &leaves)?;

        let listener = TcpNetwork::bind_root(network).await?;
        self.logger.info(&format!(
            "[{}] waiting for {} leaves on {}",
            ROOT_RANK,
            network.world_size - 1,
            network.root_address
        ));
        let endpoint = TcpNetwork::accept_leaves(listener, network, self.logger.clone()).await?;
        let cancel = CancellationToken::new();
        let report = run_root_node(root, lookup, endpoint, vehicles, cancel.clone(), self.logger.clone()).await;
        cancel.cancel();
        report
    }

    async fn run_tcp_leaf(&self, root: StreetGraph) -> SimResult<LeafSummary> {
        let network = &self.config.network;
        let leaf = build_leaf_graph(
            &root,
            network.world_size - 1,
            network.rank,
            self.config.simulation.partition_layout,
        )?;
        let endpoint = TcpNetwork::connect_leaf(network, self.logger.clone()).await?;
        run_leaf_node(
            leaf,
            endpoint,
            self.config.simulation.cache_edge_lengths,
            CancellationToken::new(),
            self.logger.clone(),
        )
        .await
    }
}

pub async fn run_root_node(
    root: StreetGraph,
    lookup: LeafLookup,
    endpoint: Endpoint,
    vehicles: Vec<Vehicle>,
    cancel: CancellationToken,
    logger: DynLogger,
) -> SimResult<SimulationReport> {
    let mailbox = RootMailbox::spawn(endpoint.inbound, cancel.clone(), logger.clone());
    RootOrchestrator::new(Arc::new(root), Arc::new(lookup), endpoint.transport, logger)
        .run(vehicles, mailbox, cancel)
        .await
}

pub async fn run_leaf_node(
    graph: StreetGraph,
    endpoint: Endpoint,
    cache_edge_lengths: bool,
    cancel: CancellationToken,
    logger: DynLogger,
) -> SimResult<LeafSummary> {
    let transport = endpoint.transport.clone();
    let (mailbox, lengths) =
        LeafMailbox::spawn(endpoint, cache_edge_lengths, cancel.clone(), logger.clone());
    LeafWorker::new(graph, transport, logger)
        .run(mailbox, lengths, cancel)
        .await
}

/// Runs the root and `world_size - 1` leaves as task groups in this process,
/// connected by the in-process network.
pub async fn run_local_cluster(
    config: &Config,
    root: StreetGraph,
    vehicles: Vec<Vehicle>,
    logger: DynLogger,
) -> SimResult<SimulationReport> {
    let world_size = config.network.world_size;
    if world_size < 2 {
        return Err(SimError::InsufficientWorkers { world_size });
    }
    let leaves = build_leaf_graphs(&root, world_size - 1, config.simulation.partition_layout)?;
    let lookup = LeafLookup::build(&root, &leaves)?;

    let mut endpoints = LocalNetwork::endpoints(world_size).into_iter();
    let root_endpoint = endpoints
        .next()
        .ok_or_else(|| SimError::protocol("local network has no root endpoint"))?;

    let cancel = CancellationToken::new();
    let mut leaf_nodes = JoinSet::new();
    for (leaf, endpoint) in leaves.into_iter().zip(endpoints) {
        leaf_nodes.spawn(run_leaf_node(
            leaf,
            endpoint,
            config.simulation.cache_edge_lengths,
            cancel.child_token(),
            logger.clone(),
        ));
    }

    let report = run_root_node(root, lookup, root_endpoint, vehicles, cancel.clone(), logger.clone()).await;
    cancel.cancel();
    while let Some(joined) = leaf_nodes.join_next().await {
        match joined {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => logger.warn(&format!("leaf stopped with error: {}", e)),
            Err(e) => logger.warn(&format!("leaf task failed: {}", e)),
        }
    }
    report
}

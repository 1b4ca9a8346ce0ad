use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::common::{SimError, SimResult};
use crate::domains::coordination::{
    receive_vehicle_on_leaf, send_vehicle_to_root, DynTransport, EdgeLengthClient, LeafMailbox,
    Message, ROOT_RANK,
};
use crate::domains::logger::DynLogger;
use crate::domains::streets::{GraphRegistry, StreetGraph};
use crate::domains::vehicles::{Vehicle, VehicleState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeafSummary {
    pub received: usize,
    pub parked: usize,
    pub migrated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveOutcome {
    Parked,
    Migrated,
}

/// Drives the vehicles of one partition. Every received vehicle runs on
/// its own task, so the receive loop never waits on a single vehicle.
pub struct LeafWorker {
    graph: Arc<StreetGraph>,
    registry: Arc<GraphRegistry>,
    transport: DynTransport,
    logger: DynLogger,
}

impl LeafWorker {
    pub fn new(graph: StreetGraph, transport: DynTransport, logger: DynLogger) -> Self {
        let mut registry = GraphRegistry::new();
        let graph = registry.insert(graph);
        Self {
            graph,
            registry: Arc::new(registry),
            transport,
            logger,
        }
    }

    pub async fn run(
        &self,
        mailbox: LeafMailbox,
        lengths: EdgeLengthClient,
        cancel: CancellationToken,
    ) -> SimResult<LeafSummary> {
        let rank = self.transport.rank();
        let mut vehicles = mailbox.vehicles;
        let mut tasks: JoinSet<SimResult<DriveOutcome>> = JoinSet::new();
        let mut summary = LeafSummary::default();
        self.logger.info(&format!(
            "[{}] serving {} vertices and {} edges",
            rank,
            self.graph.vertex_count(),
            self.graph.edge_count()
        ));

        let inbox_closed = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break false,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    tally(joined, &mut summary);
                }
                next = vehicles.recv() => {
                    let Some(record) = next else {
                        break !cancel.is_cancelled();
                    };
                    summary.received += 1;
                    let vehicle_id = record.id;
                    match receive_vehicle_on_leaf(record, &self.graph) {
                        Ok(vehicle) => {
                            self.logger.debug(&format!("[{}] received vehicle {}", rank, vehicle.id));
                            tasks.spawn(drive_reporting(
                                vehicle,
                                self.registry.clone(),
                                self.transport.clone(),
                                lengths.clone(),
                                self.logger.clone(),
                            ));
                        }
                        Err(e) => {
                            summary.failed += 1;
                            abandon(&self.transport, &self.logger, vehicle_id, &e).await;
                        }
                    }
                }
            }
        };

        while let Some(joined) = tasks.join_next().await {
            tally(joined, &mut summary);
        }
        if inbox_closed {
            return Err(SimError::protocol(format!(
                "leaf {} lost its inbound stream before shutdown",
                rank
            )));
        }
        self.logger.info(&format!(
            "[{}] shut down: received {}, parked {}, migrated {}, failed {}",
            rank, summary.received, summary.parked, summary.migrated, summary.failed
        ));
        Ok(summary)
    }
}

fn tally(
    joined: Result<SimResult<DriveOutcome>, tokio::task::JoinError>,
    summary: &mut LeafSummary,
) {
    match joined {
        Ok(Ok(DriveOutcome::Parked)) => summary.parked += 1,
        Ok(Ok(DriveOutcome::Migrated)) => summary.migrated += 1,
        Ok(Err(_)) | Err(_) => summary.failed += 1,
    }
}

async fn abandon(transport: &DynTransport, logger: &DynLogger, vehicle_id: u64, error: &SimError) {
    logger.error(&format!(
        "[{}] vehicle {} abandoned: {}",
        transport.rank(),
        vehicle_id,
        error
    ));
    let report = Message::VehicleAbandoned {
        vehicle_id,
        reason: error.to_string(),
    };
    if let Err(e) = transport.send(ROOT_RANK, report).await {
        logger.error(&format!("[{}] {}", transport.rank(), e));
    }
}

/// Drive task body. A failure ends only this vehicle and is reported to the
/// root so it can still account for the vehicle.
async fn drive_reporting(
    vehicle: Vehicle,
    registry: Arc<GraphRegistry>,
    transport: DynTransport,
    lengths: EdgeLengthClient,
    logger: DynLogger,
) -> SimResult<DriveOutcome> {
    let vehicle_id = vehicle.id;
    let result = drive(vehicle, &registry, &transport, &lengths).await;
    match &result {
        Ok(outcome) => logger.debug(&format!(
            "[{}] vehicle {} {:?}",
            transport.rank(),
            vehicle_id,
            outcome
        )),
        Err(e) => abandon(&transport, &logger, vehicle_id, e).await,
    }
    result
}

async fn drive(
    mut vehicle: Vehicle,
    registry: &GraphRegistry,
    transport: &DynTransport,
    lengths: &EdgeLengthClient,
) -> SimResult<DriveOutcome> {
    let graph = registry.resolve(&vehicle)?;
    // The current edge may straddle two partitions, so its length comes
    // from the root.
    if let Some((prev, next)) = vehicle.current_edge() {
        let length = lengths.ask_root_for_edge_length(prev, next).await?;
        vehicle.set_edge_length(length);
    }
    let mut state = vehicle.settle(&graph)?;
    loop {
        match state {
            VehicleState::Driving => {
                if let Some((prev, next)) = vehicle.missing_edge_length() {
                    let length = lengths.ask_root_for_edge_length(prev, next).await?;
                    vehicle.set_edge_length(length);
                    state = vehicle.settle(&graph)?;
                    continue;
                }
                tokio::task::yield_now().await;
                state = vehicle.step(&graph)?;
            }
            VehicleState::Parked => {
                transport
                    .send(ROOT_RANK, Message::VehicleParked(vehicle.to_record()))
                    .await?;
                return Ok(DriveOutcome::Parked);
            }
            VehicleState::AwaitingMigration => {
                send_vehicle_to_root(transport.as_ref(), &vehicle).await?;
                return Ok(DriveOutcome::Migrated);
            }
        }
    }
}

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::{SimError, SimResult};
use crate::domains::coordination::{
    emit_vehicle, relay_vehicle, respond_to_edge_length_request, DynTransport, EdgeLengthRequest,
    LeafReport, Message, Rank, RootMailbox, ROOT_RANK,
};
use crate::domains::logger::DynLogger;
use crate::domains::streets::{LeafLookup, StreetGraph};
use crate::domains::vehicles::{Vehicle, VehicleId, VehicleRecord};

/// Outcome of a distributed run as seen by the root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    /// Final records of parked vehicles, sorted by id.
    pub parked: Vec<VehicleRecord>,
    pub abandoned: Vec<(VehicleId, String)>,
    pub migrations: usize,
    pub length_requests: usize,
}

#[derive(Debug, Default)]
pub struct RelayOutcome {
    pub parked: Vec<VehicleRecord>,
    pub abandoned: Vec<(VehicleId, String)>,
    pub migrations: usize,
}

/// Rank 0. Emits the initial vehicles, then answers length queries and
/// relays migrating vehicles until every vehicle is parked or abandoned.
pub struct RootOrchestrator {
    graph: Arc<StreetGraph>,
    lookup: Arc<LeafLookup>,
    transport: DynTransport,
    logger: DynLogger,
}

impl RootOrchestrator {
    pub fn new(
        graph: Arc<StreetGraph>,
        lookup: Arc<LeafLookup>,
        transport: DynTransport,
        logger: DynLogger,
    ) -> Self {
        Self {
            graph,
            lookup,
            transport,
            logger,
        }
    }

    /// Sends every driving vehicle to the leaf owning its start vertex and
    /// returns how many were sent. Vehicles that are already parked stay
    /// here and go straight into `parked`.
    pub async fn emit_vehicles(
        &self,
        vehicles: Vec<Vehicle>,
        parked: &mut Vec<VehicleRecord>,
    ) -> SimResult<usize> {
        let mut emitted = 0;
        for vehicle in vehicles {
            if vehicle.is_parked() {
                parked.push(vehicle.to_record());
                continue;
            }
            let leaf = emit_vehicle(self.transport.as_ref(), &self.lookup, vehicle.to_record()).await?;
            self.logger.debug(&format!(
                "[{}] emitted vehicle {} to leaf {}",
                ROOT_RANK, vehicle.id, leaf
            ));
            emitted += 1;
        }
        Ok(emitted)
    }

    pub async fn run(
        &self,
        vehicles: Vec<Vehicle>,
        mailbox: RootMailbox,
        cancel: CancellationToken,
    ) -> SimResult<SimulationReport> {
        let mut report = SimulationReport::default();
        let emitted = match self.emit_vehicles(vehicles, &mut report.parked).await {
            Ok(emitted) => emitted,
            Err(e) => {
                self.broadcast_shutdown().await;
                return Err(e);
            }
        };
        self.logger.info(&format!(
            "[{}] emitted {} vehicles to {} leaves",
            ROOT_RANK,
            emitted,
            self.transport.world_size() - 1
        ));

        let servers = cancel.child_token();
        let RootMailbox {
            length_requests,
            reports,
        } = mailbox;
        let mut length_server: JoinHandle<SimResult<usize>> = tokio::spawn(serve_edge_lengths(
            self.graph.clone(),
            self.transport.clone(),
            length_requests,
            servers.clone(),
            self.logger.clone(),
        ));
        let mut relay_server: JoinHandle<SimResult<RelayOutcome>> = tokio::spawn(relay_vehicles(
            self.lookup.clone(),
            self.transport.clone(),
            reports,
            emitted,
            servers.clone(),
            self.logger.clone(),
        ));

        // Whichever server stops first takes the other one down with it.
        let (served, relayed) = tokio::select! {
            relayed = &mut relay_server => {
                servers.cancel();
                (length_server.await, relayed)
            }
            served = &mut length_server => {
                servers.cancel();
                (served, relay_server.await)
            }
        };
        self.broadcast_shutdown().await;

        let relayed = joined(relayed)?;
        report.length_requests = joined(served)?;
        report.migrations = relayed.migrations;
        report.abandoned = relayed.abandoned;
        report.parked.extend(relayed.parked);
        report.parked.sort_by_key(|r| r.id);
        self.logger.info(&format!(
            "[{}] done: {} parked, {} abandoned, {} migrations, {} length requests",
            ROOT_RANK,
            report.parked.len(),
            report.abandoned.len(),
            report.migrations,
            report.length_requests
        ));
        Ok(report)
    }

    async fn broadcast_shutdown(&self) {
        for rank in 1..self.transport.world_size() {
            if let Err(e) = self.transport.send(rank, Message::Shutdown).await {
                self.logger
                    .warn(&format!("[{}] shutdown to {} failed: {}", ROOT_RANK, rank, e));
            }
        }
    }
}

fn joined<T>(result: Result<SimResult<T>, tokio::task::JoinError>) -> SimResult<T> {
    result.map_err(|e| SimError::protocol(format!("root server task failed: {}", e)))?
}

/// Answers length queries against the full graph until cancelled. Returns
/// the number of requests served.
pub async fn serve_edge_lengths(
    graph: Arc<StreetGraph>,
    transport: DynTransport,
    mut requests: mpsc::UnboundedReceiver<(Rank, EdgeLengthRequest)>,
    cancel: CancellationToken,
    logger: DynLogger,
) -> SimResult<usize> {
    let mut served = 0;
    loop {
        let (from, request) = tokio::select! {
            _ = cancel.cancelled() => break,
            next = requests.recv() => match next {
                Some(next) => next,
                None => break,
            },
        };
        respond_to_edge_length_request(&graph, transport.as_ref(), from, request, &logger).await?;
        served += 1;
    }
    Ok(served)
}

/// Handles leaf reports until `in_flight` vehicles are parked or abandoned.
/// Migrating vehicles are forwarded to the leaf owning their next vertex; an
/// unroutable vehicle stops the relay with an error.
pub async fn relay_vehicles(
    lookup: Arc<LeafLookup>,
    transport: DynTransport,
    mut reports: mpsc::UnboundedReceiver<(Rank, LeafReport)>,
    in_flight: usize,
    cancel: CancellationToken,
    logger: DynLogger,
) -> SimResult<RelayOutcome> {
    let mut outcome = RelayOutcome::default();
    let mut remaining = in_flight;
    while remaining > 0 {
        let (from, report) = tokio::select! {
            _ = cancel.cancelled() => break,
            next = reports.recv() => match next {
                Some(next) => next,
                None => {
                    return Err(SimError::protocol(format!(
                        "leaf reports ended with {} vehicles outstanding",
                        remaining
                    )))
                }
            },
        };
        match report {
            LeafReport::Migrate(record) => {
                let id = record.id;
                let leaf = relay_vehicle(transport.as_ref(), &lookup, record).await?;
                outcome.migrations += 1;
                logger.debug(&format!(
                    "[{}] relayed vehicle {} from leaf {} to leaf {}",
                    ROOT_RANK, id, from, leaf
                ));
            }
            LeafReport::Parked(record) => {
                remaining -= 1;
                logger.debug(&format!(
                    "[{}] vehicle {} parked on leaf {} ({} left)",
                    ROOT_RANK, record.id, from, remaining
                ));
                outcome.parked.push(record);
            }
            LeafReport::Abandoned { vehicle_id, reason } => {
                remaining -= 1;
                logger.warn(&format!(
                    "[{}] leaf {} abandoned vehicle {}: {}",
                    ROOT_RANK, from, vehicle_id, reason
                ));
                outcome.abandoned.push((vehicle_id, reason));
            }
        }
    }
    Ok(outcome)
}

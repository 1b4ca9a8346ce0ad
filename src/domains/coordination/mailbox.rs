//! Demultiplexing of a node's inbound stream.
//!
//! Each node has one inbound stream. A mailbox task owns it and fans the
//! messages out to typed channels. On leaves the task also owns the table
//! of pending length queries, so concurrent drive tasks get their own reply
//! without sharing any state.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::messages::{
    EdgeLengthRequest, EdgeLengthResponse, Envelope, LeafReport, Message, Rank, ROOT_RANK,
};
use super::ports::{DynTransport, Endpoint};
use crate::common::{SimError, SimResult};
use crate::domains::logger::DynLogger;
use crate::domains::streets::VertexId;
use crate::domains::vehicles::VehicleRecord;

pub struct RootMailbox {
    pub length_requests: mpsc::UnboundedReceiver<(Rank, EdgeLengthRequest)>,
    pub reports: mpsc::UnboundedReceiver<(Rank, LeafReport)>,
}

impl RootMailbox {
    pub fn spawn(
        inbound: mpsc::UnboundedReceiver<Envelope>,
        cancel: CancellationToken,
        logger: DynLogger,
    ) -> Self {
        let (requests_tx, length_requests) = mpsc::unbounded_channel();
        let (reports_tx, reports) = mpsc::unbounded_channel();
        tokio::spawn(route_root_inbound(inbound, requests_tx, reports_tx, cancel, logger));
        Self {
            length_requests,
            reports,
        }
    }
}

async fn route_root_inbound(
    mut inbound: mpsc::UnboundedReceiver<Envelope>,
    requests: mpsc::UnboundedSender<(Rank, EdgeLengthRequest)>,
    reports: mpsc::UnboundedSender<(Rank, LeafReport)>,
    cancel: CancellationToken,
    logger: DynLogger,
) {
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = inbound.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };
        let from = envelope.from;
        let delivered = match envelope.message {
            Message::EdgeLengthRequest(request) => requests.send((from, request)).is_ok(),
            Message::MigrateVehicle(record) => reports.send((from, LeafReport::Migrate(record))).is_ok(),
            Message::VehicleParked(record) => reports.send((from, LeafReport::Parked(record))).is_ok(),
            Message::VehicleAbandoned { vehicle_id, reason } => reports
                .send((from, LeafReport::Abandoned { vehicle_id, reason }))
                .is_ok(),
            other => {
                logger.warn(&format!(
                    "[{}] ignoring unexpected {} from {}",
                    ROOT_RANK,
                    other.kind(),
                    from
                ));
                true
            }
        };
        if !delivered {
            break;
        }
    }
}

struct PendingQuery {
    source: VertexId,
    target: VertexId,
    reply: oneshot::Sender<SimResult<f64>>,
}

/// Handle drive tasks use to ask the root for edge lengths.
#[derive(Clone)]
pub struct EdgeLengthClient {
    queries: mpsc::UnboundedSender<PendingQuery>,
}

impl EdgeLengthClient {
    /// Blocks only the calling task until the root answers.
    pub async fn ask_root_for_edge_length(&self, source: VertexId, target: VertexId) -> SimResult<f64> {
        let (reply, answer) = oneshot::channel();
        self.queries
            .send(PendingQuery {
                source,
                target,
                reply,
            })
            .map_err(|_| SimError::protocol("leaf mailbox is closed"))?;
        answer
            .await
            .map_err(|_| SimError::protocol("leaf mailbox dropped a length query"))?
    }
}

pub struct LeafMailbox {
    pub vehicles: mpsc::UnboundedReceiver<VehicleRecord>,
}

impl LeafMailbox {
    /// Starts the leaf's mailbox task. A `Shutdown` from the root cancels
    /// `cancel`.
    pub fn spawn(
        endpoint: Endpoint,
        cache_lengths: bool,
        cancel: CancellationToken,
        logger: DynLogger,
    ) -> (Self, EdgeLengthClient) {
        let (vehicles_tx, vehicles) = mpsc::unbounded_channel();
        let (queries_tx, queries) = mpsc::unbounded_channel();
        let dispatch = LeafDispatch {
            transport: endpoint.transport,
            pending: HashMap::new(),
            cache: cache_lengths.then(HashMap::new),
            next_request_id: 0,
            logger,
        };
        tokio::spawn(dispatch.run(endpoint.inbound, queries, vehicles_tx, cancel));
        (Self { vehicles }, EdgeLengthClient { queries: queries_tx })
    }
}

struct LeafDispatch {
    transport: DynTransport,
    pending: HashMap<u64, PendingQuery>,
    cache: Option<HashMap<(VertexId, VertexId), f64>>,
    next_request_id: u64,
    logger: DynLogger,
}

impl LeafDispatch {
    async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Envelope>,
        mut queries: mpsc::UnboundedReceiver<PendingQuery>,
        vehicles: mpsc::UnboundedSender<VehicleRecord>,
        cancel: CancellationToken,
    ) {
        let rank = self.transport.rank();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(query) = queries.recv() => self.forward_query(query).await,
                envelope = inbound.recv() => {
                    let Some(envelope) = envelope else {
                        self.logger.error(&format!("[{}] inbound stream from root closed", rank));
                        break;
                    };
                    match envelope.message {
                        Message::EmitVehicle(record) => {
                            if vehicles.send(record).is_err() {
                                break;
                            }
                        }
                        Message::EdgeLengthResponse(response) => self.answer(response),
                        Message::Shutdown => {
                            self.logger.debug(&format!("[{}] shutdown received", rank));
                            cancel.cancel();
                            break;
                        }
                        other => self.logger.warn(&format!(
                            "[{}] ignoring unexpected {} from {}",
                            rank,
                            other.kind(),
                            envelope.from
                        )),
                    }
                }
            }
        }
    }

    async fn forward_query(&mut self, query: PendingQuery) {
        if let Some(length) = self
            .cache
            .as_ref()
            .and_then(|c| c.get(&(query.source, query.target)))
        {
            let _ = query.reply.send(Ok(*length));
            return;
        }
        let request = EdgeLengthRequest {
            request_id: self.next_request_id,
            source: query.source,
            target: query.target,
        };
        self.next_request_id += 1;
        match self
            .transport
            .send(ROOT_RANK, Message::EdgeLengthRequest(request))
            .await
        {
            Ok(()) => {
                self.pending.insert(request.request_id, query);
            }
            Err(e) => {
                let _ = query.reply.send(Err(e));
            }
        }
    }

    fn answer(&mut self, response: EdgeLengthResponse) {
        let Some(query) = self.pending.remove(&response.request_id) else {
            self.logger.warn(&format!(
                "[{}] length response {} matches no pending query",
                self.transport.rank(),
                response.request_id
            ));
            return;
        };
        let result = match response.length {
            Some(length) => {
                if let Some(cache) = self.cache.as_mut() {
                    cache.insert((query.source, query.target), length);
                }
                Ok(length)
            }
            None => Err(SimError::UnknownEdge {
                from: query.source,
                to: query.target,
            }),
        };
        let _ = query.reply.send(result);
    }
}

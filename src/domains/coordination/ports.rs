use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::{Envelope, Message, Rank};
use crate::common::SimResult;

/// Outbound half of a node's connection to the message-passing layer.
/// Sends are buffered: they hand the message to the transport and return
/// without waiting for the peer to receive it.
#[async_trait]
pub trait Transport: Send + Sync {
    fn rank(&self) -> Rank;
    fn world_size(&self) -> usize;
    async fn send(&self, to: Rank, message: Message) -> SimResult<()>;
}

pub type DynTransport = Arc<dyn Transport>;

/// A node's transport together with its inbound message stream.
pub struct Endpoint {
    pub transport: DynTransport,
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
}

impl Endpoint {
    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }
}

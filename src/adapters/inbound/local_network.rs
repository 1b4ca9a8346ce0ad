use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::common::{SimError, SimResult};
use crate::domains::coordination::{Endpoint, Envelope, Message, Rank, Transport};

/// In-process network: every rank gets an unbounded inbox and a sender to
/// every other rank's inbox.
pub struct LocalNetwork;

impl LocalNetwork {
    /// Endpoints for ranks `0..world_size`, in rank order.
    pub fn endpoints(world_size: usize) -> Vec<Endpoint> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..world_size).map(|_| mpsc::unbounded_channel()).unzip();
        let peers = Arc::new(senders);
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbound)| Endpoint {
                transport: Arc::new(LocalTransport {
                    rank,
                    peers: peers.clone(),
                }),
                inbound,
            })
            .collect()
    }
}

struct LocalTransport {
    rank: Rank,
    peers: Arc<Vec<mpsc::UnboundedSender<Envelope>>>,
}

#[async_trait]
impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.peers.len()
    }

    async fn send(&self, to: Rank, message: Message) -> SimResult<()> {
        let peer = self.peers.get(to).ok_or_else(|| {
            SimError::protocol(format!("rank {} outside world of size {}", to, self.peers.len()))
        })?;
        peer.send(Envelope {
            from: self.rank,
            to,
            message,
        })
        .map_err(|_| SimError::protocol(format!("rank {} is no longer receiving", to)))
    }
}

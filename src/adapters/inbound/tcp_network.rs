//! Star-shaped TCP transport: the root accepts one connection per leaf.
//!
//! Every connection opens with the leaf's rank as a big-endian u32, which
//! the root acknowledges with a single byte. After that both sides exchange
//! frames: a big-endian u32 length followed by a bincode-encoded envelope.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::common::{SimError, SimResult};
use crate::config::NetworkConfig;
use crate::domains::coordination::{Endpoint, Envelope, Message, Rank, Transport, ROOT_RANK};
use crate::domains::logger::DynLogger;

const HANDSHAKE_ACK: u8 = 1;

pub struct TcpNetwork;

impl TcpNetwork {
    pub async fn bind_root(config: &NetworkConfig) -> SimResult<TcpListener> {
        TcpListener::bind(&config.root_address)
            .await
            .map_err(|e| SimError::protocol(format!("cannot bind {}: {}", config.root_address, e)))
    }

    /// Accepts connections until every leaf rank has completed its
    /// handshake. Connections with an out-of-range or duplicate rank, or
    /// that stay silent past `handshake_timeout_ms`, are dropped and
    /// accepting continues.
    pub async fn accept_leaves(
        listener: TcpListener,
        config: &NetworkConfig,
        logger: DynLogger,
    ) -> SimResult<Endpoint> {
        let world_size = config.world_size;
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let mut writers = HashMap::new();
        let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms);

        while writers.len() + 1 < world_size {
            let (mut stream, peer) = listener
                .accept()
                .await
                .map_err(|e| SimError::protocol(format!("accept failed: {}", e)))?;
            let rank = match tokio::time::timeout(handshake_timeout, stream.read_u32()).await {
                Ok(Ok(rank)) => rank as Rank,
                Ok(Err(e)) => {
                    logger.warn(&format!("[{}] handshake from {} failed: {}", ROOT_RANK, peer, e));
                    continue;
                }
                Err(_) => {
                    logger.warn(&format!(
                        "[{}] {} sent no rank within {:?}",
                        ROOT_RANK, peer, handshake_timeout
                    ));
                    continue;
                }
            };
            if rank == ROOT_RANK || rank >= world_size || writers.contains_key(&rank) {
                logger.warn(&format!(
                    "[{}] rejecting {} claiming rank {}",
                    ROOT_RANK, peer, rank
                ));
                continue;
            }
            if let Err(e) = stream.write_u8(HANDSHAKE_ACK).await {
                logger.warn(&format!("[{}] handshake with rank {} failed: {}", ROOT_RANK, rank, e));
                continue;
            }
            logger.info(&format!("[{}] rank {} connected from {}", ROOT_RANK, rank, peer));

            let (reader, writer) = stream.into_split();
            tokio::spawn(read_frames(
                reader,
                rank,
                config.max_frame_bytes,
                inbound_tx.clone(),
                logger.clone(),
            ));
            writers.insert(rank, Mutex::new(writer));
        }

        Ok(Endpoint {
            transport: Arc::new(RootTransport {
                world_size,
                max_frame: config.max_frame_bytes,
                writers,
            }),
            inbound,
        })
    }

    /// Connects this leaf (`config.rank`) to the root, retrying while the
    /// root is not yet listening.
    pub async fn connect_leaf(config: &NetworkConfig, logger: DynLogger) -> SimResult<Endpoint> {
        let rank = config.rank;
        if rank == ROOT_RANK || rank >= config.world_size {
            return Err(SimError::Configuration(format!(
                "rank {} is not a leaf rank in a world of size {}",
                rank, config.world_size
            )));
        }

        let mut stream = connect_with_retry(config, &logger).await?;
        stream
            .write_u32(rank as u32)
            .await
            .map_err(|e| SimError::protocol(format!("handshake failed: {}", e)))?;
        match stream.read_u8().await {
            Ok(HANDSHAKE_ACK) => {}
            Ok(other) => {
                return Err(SimError::protocol(format!(
                    "unexpected handshake reply {}",
                    other
                )))
            }
            Err(e) => {
                return Err(SimError::protocol(format!(
                    "root rejected rank {}: {}",
                    rank, e
                )))
            }
        }
        logger.info(&format!("[{}] connected to root at {}", rank, config.root_address));

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (reader, writer) = stream.into_split();
        tokio::spawn(read_frames(
            reader,
            ROOT_RANK,
            config.max_frame_bytes,
            inbound_tx,
            logger,
        ));
        Ok(Endpoint {
            transport: Arc::new(LeafTransport {
                rank,
                world_size: config.world_size,
                max_frame: config.max_frame_bytes,
                writer: Mutex::new(writer),
            }),
            inbound,
        })
    }
}

async fn connect_with_retry(config: &NetworkConfig, logger: &DynLogger) -> SimResult<TcpStream> {
    let attempts = config.connect_attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match TcpStream::connect(&config.root_address).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                logger.debug(&format!(
                    "[{}] connect attempt {}/{} to {} failed: {}",
                    config.rank, attempt, attempts, config.root_address, e
                ));
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(config.connect_backoff_ms)).await;
                }
            }
        }
    }
    Err(SimError::protocol(format!(
        "could not reach root at {} after {} attempts: {}",
        config.root_address,
        attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn encode_frame(envelope: &Envelope, max_frame: usize) -> SimResult<Vec<u8>> {
    let payload = bincode::serialize(envelope)
        .map_err(|e| SimError::protocol(format!("cannot encode {}: {}", envelope.message.kind(), e)))?;
    if payload.len() > max_frame || payload.len() > u32::MAX as usize {
        return Err(SimError::protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            payload.len(),
            max_frame
        )));
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

async fn read_frame(reader: &mut OwnedReadHalf, max_frame: usize) -> SimResult<Option<Envelope>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(SimError::protocol(format!("read failed: {}", e))),
    };
    if len > max_frame {
        return Err(SimError::protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            len, max_frame
        )));
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| SimError::protocol(format!("truncated frame: {}", e)))?;
    bincode::deserialize(&payload)
        .map(Some)
        .map_err(|e| SimError::protocol(format!("cannot decode frame: {}", e)))
}

/// Pushes decoded envelopes from one connection into the node's inbox until
/// the peer closes the connection or sends something invalid.
async fn read_frames(
    mut reader: OwnedReadHalf,
    peer: Rank,
    max_frame: usize,
    inbound: mpsc::UnboundedSender<Envelope>,
    logger: DynLogger,
) {
    loop {
        match read_frame(&mut reader, max_frame).await {
            Ok(Some(envelope)) if envelope.from == peer => {
                if inbound.send(envelope).is_err() {
                    break;
                }
            }
            Ok(Some(envelope)) => {
                logger.error(&format!(
                    "connection of rank {} carried a message from rank {}",
                    peer, envelope.from
                ));
                break;
            }
            Ok(None) => {
                logger.debug(&format!("connection to rank {} closed", peer));
                break;
            }
            Err(e) => {
                logger.error(&format!("connection to rank {}: {}", peer, e));
                break;
            }
        }
    }
}

async fn write_envelope(
    writer: &Mutex<OwnedWriteHalf>,
    envelope: &Envelope,
    max_frame: usize,
) -> SimResult<()> {
    let frame = encode_frame(envelope, max_frame)?;
    let mut writer = writer.lock().await;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| SimError::protocol(format!("send to rank {} failed: {}", envelope.to, e)))
}

struct RootTransport {
    world_size: usize,
    max_frame: usize,
    writers: HashMap<Rank, Mutex<OwnedWriteHalf>>,
}

#[async_trait]
impl Transport for RootTransport {
    fn rank(&self) -> Rank {
        ROOT_RANK
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn send(&self, to: Rank, message: Message) -> SimResult<()> {
        let writer = self
            .writers
            .get(&to)
            .ok_or_else(|| SimError::protocol(format!("no connection to rank {}", to)))?;
        let envelope = Envelope {
            from: ROOT_RANK,
            to,
            message,
        };
        write_envelope(writer, &envelope, self.max_frame).await
    }
}

struct LeafTransport {
    rank: Rank,
    world_size: usize,
    max_frame: usize,
    writer: Mutex<OwnedWriteHalf>,
}

#[async_trait]
impl Transport for LeafTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn send(&self, to: Rank, message: Message) -> SimResult<()> {
        if to != ROOT_RANK {
            return Err(SimError::protocol(format!(
                "leaf {} can only address the root, not rank {}",
                self.rank, to
            )));
        }
        let envelope = Envelope {
            from: self.rank,
            to,
            message,
        };
        write_envelope(&self.writer, &envelope, self.max_frame).await
    }
}

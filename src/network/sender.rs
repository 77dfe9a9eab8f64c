use super::codec::{frame, read_frame, write_frame};
use super::message::{Message, MessageKind, Node, Reply};
use crate::config::NetworkConfig;
use crate::context::{NodeContext, QueueReceiver};
use crate::error::{ChatError, SendError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Open a connection to the message's recipient, send it, and wait for the one reply.
///
/// The connection is closed on every return path when the framed stream drops.
pub async fn send_raw_message(message: &Message, config: &NetworkConfig) -> Result<Reply, SendError> {
    let node = &message.recipient;
    let addrs: Vec<SocketAddr> = match lookup_host((node.host.as_str(), node.port)).await {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            debug!(%node, error = %e, "lookup failed");
            Vec::new()
        }
    };
    if addrs.is_empty() {
        return Err(SendError::Unresolvable(node.clone()));
    }

    let stream = match timeout(config.connect_timeout, TcpStream::connect(&addrs[..])).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(SendError::Unreachable {
                node: node.clone(),
                source,
            })
        }
        Err(_) => return Err(SendError::TimedOut(node.clone())),
    };

    let mut framed = frame(stream);
    write_frame(&mut framed, message, config.io_timeout)
        .await
        .map_err(|e| classify(node, e))?;
    read_frame(&mut framed, config.io_timeout)
        .await
        .map_err(|e| classify(node, e))
}

fn classify(node: &Node, err: ChatError) -> SendError {
    match err {
        ChatError::Timeout(_) => SendError::TimedOut(node.clone()),
        ChatError::Io(source) => SendError::Unreachable {
            node: node.clone(),
            source,
        },
        ChatError::ConnectionClosed => SendError::Unreachable {
            node: node.clone(),
            source: io::Error::from(io::ErrorKind::UnexpectedEof),
        },
        other => SendError::MalformedReply {
            node: node.clone(),
            reason: other.to_string(),
        },
    }
}

/// The only consumer of the send queue. Handles one message start to finish
/// before taking the next, so at most one outbound exchange is in flight.
pub struct Sender {
    ctx: Arc<NodeContext>,
    queue: QueueReceiver,
}

impl Sender {
    pub fn new(ctx: Arc<NodeContext>, queue: QueueReceiver) -> Self {
        Self { ctx, queue }
    }

    pub async fn run(mut self) {
        while let Some(message) = self.queue.recv().await {
            process(&self.ctx, message).await;
        }
        debug!("send queue closed");
    }
}

/// Carry out one queued message.
pub async fn process(ctx: &NodeContext, message: Message) {
    debug!(message = %message, "sending");
    match message.kind {
        MessageKind::Register => register(ctx, message).await,
        MessageKind::RelayRegister => relay_register(ctx, message).await,
        MessageKind::PublicMessage => {
            ctx.status.emit(format!("<ME - PUBLIC> {}", message.content));
            for peer in ctx.directory.snapshot() {
                if send(ctx, &message.readdressed(&peer)).await.is_err() {
                    ctx.directory.remove(&peer);
                }
            }
        }
        MessageKind::PrivateMessage => {
            ctx.status.emit(format!("<ME - PRIVATE> {}", message.content));
            if send(ctx, &message).await.is_err() {
                ctx.directory.remove(&message.recipient);
            }
        }
        other => warn!(kind = %other, "not an outbound message type, dropping"),
    }
}

async fn send(ctx: &NodeContext, message: &Message) -> Result<Reply, SendError> {
    let result = send_raw_message(message, &ctx.config).await;
    match &result {
        Ok(Reply::Error(reason)) => {
            warn!(peer = %message.recipient, %reason, "peer rejected message")
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "send failed");
            if e.peer_left() {
                ctx.status
                    .emit(format!("*** {} has left the swarm ***", e.node()));
            }
        }
    }
    result
}

/// Tell every known peer about a newcomer, then remember it ourselves.
async fn register(ctx: &NodeContext, message: Message) {
    let newcomer: Node = match message.content.parse() {
        Ok(node) => node,
        Err(e) => {
            warn!(error = %e, "register for an unparseable address");
            return;
        }
    };
    for peer in ctx.directory.snapshot() {
        if peer == newcomer {
            continue;
        }
        let _ = send(ctx, &message.readdressed(&peer)).await;
    }
    ctx.directory.insert(newcomer);
}

/// Ask the bootstrap peer to introduce us and adopt its peer list.
async fn relay_register(ctx: &NodeContext, message: Message) {
    match send(ctx, &message).await {
        Ok(Reply::PeerList(peers)) => {
            let added = ctx.directory.extend(peers);
            info!(bootstrap = %message.recipient, added, "joined swarm");
            ctx.status.emit("*** Successfully Connected To Swarm ***");
        }
        Ok(other) => {
            warn!(bootstrap = %message.recipient, reply = ?other, "unexpected relay reply");
            ctx.status.emit(format!(
                "*** Could not connect to swarm through {} ***",
                message.recipient
            ));
        }
        Err(_) => ctx.status.emit(format!(
            "*** Could not connect to swarm through {} ***",
            message.recipient
        )),
    }
}

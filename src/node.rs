//! A running chat node and the handle front-ends use to drive it.

use crate::bootstrap::{self, CandidateSource};
use crate::config::NetworkConfig;
use crate::context::NodeContext;
use crate::error::ChatResult;
use crate::network::message::{Message, MessageKind, Node};
use crate::network::peer::Listener;
use crate::network::sender::Sender;
use crate::status::StatusLine;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Listener and sender tasks of one node, plus the shared context they run on.
pub struct ChatNode {
    ctx: Arc<NodeContext>,
    listener: JoinHandle<()>,
    sender: JoinHandle<()>,
    first_status: Mutex<Option<broadcast::Receiver<StatusLine>>>,
}

impl ChatNode {
    /// Bind the listener and start both background tasks.
    ///
    /// Fails only if the port cannot be bound.
    pub async fn start(config: NetworkConfig) -> ChatResult<Self> {
        let listener = Listener::bind(&config).await?;
        let (ctx, queue) = NodeContext::new(listener.self_node().clone(), config);
        let first_status = Mutex::new(Some(ctx.status.subscribe()));
        let sender = tokio::spawn(Sender::new(ctx.clone(), queue).run());
        let listener = tokio::spawn(listener.run(ctx.clone()));
        Ok(Self {
            ctx,
            listener,
            sender,
            first_status,
        })
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    pub fn self_node(&self) -> &Node {
        &self.ctx.self_node
    }

    /// Start a new swarm with this node as its founder.
    pub fn create_swarm(&self) {
        bootstrap::create_swarm(&self.ctx);
    }

    /// Join an existing swarm through `entry`, asking `candidates` for
    /// alternatives while the current address is unreachable.
    pub async fn join_swarm<C>(&self, entry: Node, candidates: &mut C) -> Option<Node>
    where
        C: CandidateSource + ?Sized,
    {
        bootstrap::join_swarm(&self.ctx, entry, candidates).await
    }

    /// Queue a chat message for every peer.
    pub fn send_public(&self, text: impl Into<String>) -> bool {
        self.ctx.queue.push(Message::new(
            self.ctx.self_node.clone(),
            MessageKind::PublicMessage,
            text,
            Node::broadcast(),
        ))
    }

    /// Queue a chat message for one peer.
    pub fn send_private(&self, peer: Node, text: impl Into<String>) -> bool {
        self.ctx.queue.push(Message::new(
            self.ctx.self_node.clone(),
            MessageKind::PrivateMessage,
            text,
            peer,
        ))
    }

    /// Current peers, in the order they were learned.
    pub fn peers(&self) -> Vec<Node> {
        self.ctx.directory.snapshot()
    }

    /// Fresh snapshot of the peers after every change.
    pub fn watch_peers(&self) -> watch::Receiver<Vec<Node>> {
        self.ctx.directory.subscribe()
    }

    /// Status lines for display. The first receiver handed out also holds the
    /// lines emitted during start-up.
    pub fn status(&self) -> broadcast::Receiver<StatusLine> {
        let mut first = self.first_status.lock().unwrap_or_else(|e| e.into_inner());
        first.take().unwrap_or_else(|| self.ctx.status.subscribe())
    }

    /// Stop both tasks. Queued messages and open connections are abandoned.
    pub async fn shutdown(self) {
        self.listener.abort();
        self.sender.abort();
        // Wait for the tasks to drop so the listening port is released.
        let _ = self.listener.await;
        let _ = self.sender.await;
    }
}

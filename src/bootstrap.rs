//! Finding and joining a swarm.
//!
//! A candidate bootstrap peer is pinged before the node commits to
//! it. Once one answers `PONG`, a `RELAY_REGISTER` goes onto the send queue and
//! the sender finishes the join asynchronously.

use crate::config::NetworkConfig;
use crate::context::NodeContext;
use crate::network::message::{Message, MessageKind, Node, Reply};
use crate::network::sender::send_raw_message;
use async_trait::async_trait;
use tracing::{debug, info};

/// Supplies another bootstrap address after the previous one did not answer.
#[async_trait]
pub trait CandidateSource: Send {
    /// `None` gives up on joining.
    async fn next_candidate(&mut self, unreachable: &Node) -> Option<Node>;
}

#[async_trait]
impl CandidateSource for std::vec::IntoIter<Node> {
    async fn next_candidate(&mut self, _unreachable: &Node) -> Option<Node> {
        self.next()
    }
}

/// Check whether `candidate` is a live node by sending it a `PING`.
pub async fn is_reachable(self_node: &Node, candidate: &Node, config: &NetworkConfig) -> bool {
    let ping = Message::new(
        self_node.clone(),
        MessageKind::Ping,
        self_node.to_string(),
        candidate.clone(),
    );
    match send_raw_message(&ping, config).await {
        Ok(Reply::Pong) => true,
        Ok(other) => {
            debug!(%candidate, reply = ?other, "reachability check got something other than PONG");
            false
        }
        Err(e) => {
            debug!(%candidate, error = %e, "reachability check failed");
            false
        }
    }
}

/// Announce a brand new swarm with this node as its only member.
pub fn create_swarm(ctx: &NodeContext) {
    info!(node = %ctx.self_node, "new swarm");
    ctx.status.emit("*** New Swarm Started ***");
}

/// Ping `first`, falling back to `candidates` until one answers, then queue the
/// relay registration. Returns the bootstrap peer that was used.
pub async fn join_swarm<C>(ctx: &NodeContext, first: Node, candidates: &mut C) -> Option<Node>
where
    C: CandidateSource + ?Sized,
{
    let mut candidate = first;
    loop {
        if candidate != ctx.self_node && is_reachable(&ctx.self_node, &candidate, &ctx.config).await {
            break;
        }
        ctx.status.emit(format!(
            "*** Could not find peer {}. Please enter the host/port of another peer. ***",
            candidate
        ));
        candidate = candidates.next_candidate(&candidate).await?;
    }

    ctx.status.emit(format!("*** Found peer {} ***", candidate));
    ctx.status.emit("*** Please Wait. Connecting to swarm... ***");
    ctx.queue.push(Message::new(
        ctx.self_node.clone(),
        MessageKind::RelayRegister,
        ctx.self_node.to_string(),
        candidate.clone(),
    ));
    Some(candidate)
}

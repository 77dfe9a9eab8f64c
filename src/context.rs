//! State shared by the listener, the sender and every connection handler.

use crate::config::NetworkConfig;
use crate::directory::PeerDirectory;
use crate::network::message::{Message, Node};
use crate::status::StatusFeed;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Producer side of the outbound queue. Any number of clones may push; the
/// sender worker is the only consumer.
#[derive(Debug, Clone)]
pub struct SendQueue {
    tx: mpsc::UnboundedSender<Message>,
}

/// Consumer side of the outbound queue, owned by the sender worker.
pub type QueueReceiver = mpsc::UnboundedReceiver<Message>;

impl SendQueue {
    pub fn new() -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a message. Returns false once the sender worker has stopped.
    pub fn push(&self, message: Message) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                warn!(message = %message, "send queue closed, dropping message");
                false
            }
        }
    }
}

/// Everything a node's tasks share, built once at start-up.
#[derive(Debug)]
pub struct NodeContext {
    pub self_node: Node,
    pub directory: PeerDirectory,
    pub queue: SendQueue,
    pub status: StatusFeed,
    pub config: NetworkConfig,
}

impl NodeContext {
    pub fn new(self_node: Node, config: NetworkConfig) -> (Arc<Self>, QueueReceiver) {
        let (queue, rx) = SendQueue::new();
        let ctx = Self {
            directory: PeerDirectory::new(self_node.clone()),
            status: StatusFeed::new(config.status_capacity),
            self_node,
            queue,
            config,
        };
        (Arc::new(ctx), rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::message::MessageKind;

    fn chat(n: u16) -> Message {
        Message::new(
            Node::loopback(n),
            MessageKind::PublicMessage,
            n.to_string(),
            Node::broadcast(),
        )
    }

    #[tokio::test]
    async fn test_queue_is_fifo_across_clones() {
        let (queue, mut rx) = SendQueue::new();
        let other = queue.clone();
        assert!(queue.push(chat(1)));
        assert!(other.push(chat(2)));
        assert!(queue.push(chat(3)));
        for expected in ["1", "2", "3"] {
            assert_eq!(rx.recv().await.unwrap().content, expected);
        }
    }

    #[test]
    fn test_push_after_consumer_dropped() {
        let (queue, rx) = SendQueue::new();
        drop(rx);
        assert!(!queue.push(chat(1)));
    }

    #[test]
    fn test_context_directory_excludes_self() {
        let (ctx, _rx) = NodeContext::new(Node::loopback(5000), NetworkConfig::default());
        assert!(!ctx.directory.insert(Node::loopback(5000)));
        assert!(ctx.directory.is_empty());
    }
}

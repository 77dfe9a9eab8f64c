//! Error types.
//!
//! `ChatError` covers local failures (binding, framing, parsing). `SendError` is the
//! outcome of a failed outbound exchange and decides whether a peer is evicted.

use crate::network::message::Node;
use thiserror::Error;

/// Errors raised by the local node.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The listener could not acquire its port.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Text that is not a `host/port` pair.
    #[error("invalid node address {0:?}: expected host/port")]
    InvalidNode(String),

    /// A frame that does not describe a message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The remote side closed before sending a frame.
    #[error("connection closed before a frame arrived")]
    ConnectionClosed,

    /// A read or write did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// JSON payload error.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ChatError.
pub type ChatResult<T> = Result<T, ChatError>;

/// Why an outbound exchange produced no usable reply.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("host of {0} could not be resolved")]
    Unresolvable(Node),

    #[error("{node} is unreachable: {source}")]
    Unreachable {
        node: Node,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} did not answer in time")]
    TimedOut(Node),

    #[error("malformed reply from {node}: {reason}")]
    MalformedReply { node: Node, reason: String },
}

impl SendError {
    pub fn node(&self) -> &Node {
        match self {
            SendError::Unresolvable(node) | SendError::TimedOut(node) => node,
            SendError::Unreachable { node, .. } | SendError::MalformedReply { node, .. } => node,
        }
    }

    /// The peer was there to talk to but the connection failed or stalled.
    pub fn peer_left(&self) -> bool {
        matches!(self, SendError::Unreachable { .. } | SendError::TimedOut(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::InvalidNode("nope".to_string());
        assert_eq!(
            format!("{}", err),
            "invalid node address \"nope\": expected host/port"
        );

        let err = SendError::TimedOut(Node::loopback(5000));
        assert_eq!(format!("{}", err), "127.0.0.1/5000 did not answer in time");
    }

    #[test]
    fn test_peer_left_classification() {
        let node = Node::loopback(5000);
        let refused = SendError::Unreachable {
            node: node.clone(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.peer_left());
        assert!(SendError::TimedOut(node.clone()).peer_left());
        assert!(!SendError::Unresolvable(node.clone()).peer_left());
        assert!(!SendError::MalformedReply {
            node: node.clone(),
            reason: "bad".into()
        }
        .peer_left());
        assert_eq!(refused.node(), &node);
    }
}

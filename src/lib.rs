//! # A peer-to-peer chat swarm.
//!
//! Nodes find each other through a bootstrap peer, keep a shared directory of
//! known peers, and exchange public or private text messages. Every exchange is
//! one request and one reply over a fresh TCP connection.
//!
//! Architecture:
//!
//! ```text
//!   front-end ──push──> SendQueue ──> Sender ──connect──> remote Listener
//!                          ^            |                      |
//!                          |            v                      v
//!   ConnectionHandler ─────┘      PeerDirectory <────── ConnectionHandler
//!                                      |
//!                               watch / StatusFeed ──> front-end
//! ```
//!
//! Joining: a new node pings its bootstrap peer with `PING`, then sends
//! `RELAY_REGISTER`. The bootstrap peer replies with itself plus its peer list
//! and queues a `REGISTER` for the newcomer to every peer it knows.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod network;
pub mod node;
pub mod status;

pub use config::NetworkConfig;
pub use error::{ChatError, ChatResult, SendError};
pub use network::message::{Message, MessageKind, Node, Reply};
pub use node::ChatNode;

use crate::error::ChatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host every node advertises itself on.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Represents a peer in the swarm by its listening address
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Node {
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A node on the loopback interface.
    pub fn loopback(port: u16) -> Self {
        Self::new(LOOPBACK_HOST, port)
    }

    /// Placeholder recipient for public messages; the sender fans out to every peer instead.
    pub fn broadcast() -> Self {
        Self::loopback(0)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.port)
    }
}

impl FromStr for Node {
    type Err = ChatError;

    /// Parses `host/port`, splitting on the last `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once('/')
            .ok_or_else(|| ChatError::InvalidNode(s.to_string()))?;
        if host.is_empty() {
            return Err(ChatError::InvalidNode(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ChatError::InvalidNode(s.to_string()))?;
        Ok(Node::new(host, port))
    }
}

impl TryFrom<String> for Node {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Node> for String {
    fn from(node: Node) -> Self {
        node.to_string()
    }
}

/// Every tag a frame can carry. The last four only ever appear in replies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Register,
    RelayRegister,
    Ping,
    PublicMessage,
    PrivateMessage,
    RegisterAck,
    Pong,
    PublicMessageAck,
    PrivateMessageAck,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Register => "REGISTER",
            MessageKind::RelayRegister => "RELAY_REGISTER",
            MessageKind::Ping => "PING",
            MessageKind::PublicMessage => "PUBLIC_MESSAGE",
            MessageKind::PrivateMessage => "PRIVATE_MESSAGE",
            MessageKind::RegisterAck => "REGISTER_ACK",
            MessageKind::Pong => "PONG",
            MessageKind::PublicMessageAck => "PUBLIC_MESSAGE_ACK",
            MessageKind::PrivateMessageAck => "PRIVATE_MESSAGE_ACK",
        }
    }

    /// True for the tags a listener accepts as a request.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageKind::Register
                | MessageKind::RelayRegister
                | MessageKind::Ping
                | MessageKind::PublicMessage
                | MessageKind::PrivateMessage
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "REGISTER" => MessageKind::Register,
            "RELAY_REGISTER" => MessageKind::RelayRegister,
            "PING" => MessageKind::Ping,
            "PUBLIC_MESSAGE" => MessageKind::PublicMessage,
            "PRIVATE_MESSAGE" => MessageKind::PrivateMessage,
            "REGISTER_ACK" => MessageKind::RegisterAck,
            "PONG" => MessageKind::Pong,
            "PUBLIC_MESSAGE_ACK" => MessageKind::PublicMessageAck,
            "PRIVATE_MESSAGE_ACK" => MessageKind::PrivateMessageAck,
            other => {
                return Err(ChatError::MalformedMessage(format!(
                    "unknown message type {other:?}"
                )))
            }
        };
        Ok(kind)
    }
}

/// Represents a request sent from one node to another
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Node,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub recipient: Node,
}

impl Message {
    pub fn new(sender: Node, kind: MessageKind, content: impl Into<String>, recipient: Node) -> Self {
        Self {
            sender,
            kind,
            content: content.into(),
            recipient,
        }
    }

    /// Copy of this message addressed to `recipient`.
    pub fn readdressed(&self, recipient: &Node) -> Self {
        Self {
            recipient: recipient.clone(),
            ..self.clone()
        }
    }

    /// Canonical `sender,type,content,recipient` form.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.sender, self.kind, self.content, self.recipient
        )
    }

    /// Inverse of [`Message::to_line`]. The content is whatever sits between the
    /// second comma and the last one.
    pub fn parse_line(line: &str) -> Result<Self, ChatError> {
        let malformed = || ChatError::MalformedMessage(line.to_string());
        let (sender, rest) = line.split_once(',').ok_or_else(malformed)?;
        let (kind, rest) = rest.split_once(',').ok_or_else(malformed)?;
        let (content, recipient) = rest.rsplit_once(',').ok_or_else(malformed)?;
        Ok(Self {
            sender: sender.parse()?,
            kind: kind.parse()?,
            content: content.to_string(),
            recipient: recipient.parse()?,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// The single frame written back before a listener closes the connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    PeerList(Vec<Node>),
    RegisterAck,
    Pong,
    PublicMessageAck,
    PrivateMessageAck,
    Error(String),
}

impl Reply {
    /// The acknowledgement a listener sends for a successfully handled request.
    pub fn ack_for(kind: MessageKind) -> Option<Reply> {
        match kind {
            MessageKind::Register => Some(Reply::RegisterAck),
            MessageKind::Ping => Some(Reply::Pong),
            MessageKind::PublicMessage => Some(Reply::PublicMessageAck),
            MessageKind::PrivateMessage => Some(Reply::PrivateMessageAck),
            _ => None,
        }
    }
}

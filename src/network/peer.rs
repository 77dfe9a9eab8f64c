use super::codec::{frame, read_frame, write_frame};
use super::message::{Message, MessageKind, Node, Reply};
use crate::config::NetworkConfig;
use crate::context::NodeContext;
use crate::error::{ChatError, ChatResult};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) can't spin the loop.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bound listening socket of a node
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    self_node: Node,
}

impl Listener {
    /// Bind the configured host and port. This node is known to peers as the
    /// loopback host with the resolved port.
    pub async fn bind(config: &NetworkConfig) -> ChatResult<Self> {
        let listener = match TcpListener::bind((config.host.as_str(), config.port)).await {
            Ok(listener) => listener,
            Err(source) => {
                let addr = format!("{}/{}", config.host, config.port);
                error!(%addr, error = %source, "cannot bind listener");
                return Err(ChatError::Bind { addr, source });
            }
        };
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            self_node: Node::loopback(port),
        })
    }

    pub fn self_node(&self) -> &Node {
        &self.self_node
    }

    /// Accept incoming connections and hand each one to its own task
    pub async fn run(self, ctx: Arc<NodeContext>) {
        info!(node = %self.self_node, "listening");
        ctx.status
            .emit(format!("*** Running on PORT: {} ***", self.self_node.port));

        let permits = Arc::new(Semaphore::new(ctx.config.max_connections));
        loop {
            // Wait for a free slot before taking the next connection off the backlog.
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            match self.listener.accept().await {
                Ok((socket, remote)) => {
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, &ctx).await {
                            warn!(%remote, error = %e, "dropping connection");
                        }
                        drop(permit);
                    });
                }
                Err(e) => back_off_after(&e).await,
            }
        }
    }
}

async fn back_off_after(err: &io::Error) {
    warn!(error = %err, "failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Read one request, act on it, write one reply, close.
pub async fn handle_connection(socket: TcpStream, ctx: &NodeContext) -> ChatResult<()> {
    let limit = ctx.config.io_timeout;
    let mut framed = frame(socket);
    let message: Message = read_frame(&mut framed, limit).await?;
    debug!(message = %message, "received");

    let reply = dispatch(ctx, message)?;
    write_frame(&mut framed, &reply, limit).await
}

/// Apply a request to the shared state and pick the reply.
pub fn dispatch(ctx: &NodeContext, message: Message) -> ChatResult<Reply> {
    let kind = message.kind;
    if !kind.is_request() {
        warn!(sender = %message.sender, %kind, "unexpected request type");
        return Ok(Reply::Error(format!("unexpected message type {kind}")));
    }

    match kind {
        MessageKind::RelayRegister => {
            let peers = ctx.directory.snapshot_with_self();
            // The sender task relays the newcomer to everyone else.
            ctx.queue.push(Message::new(
                ctx.self_node.clone(),
                MessageKind::Register,
                message.sender.to_string(),
                ctx.self_node.clone(),
            ));
            ctx.status
                .emit(format!("*** {} joined the swarm ***", message.sender));
            return Ok(Reply::PeerList(peers));
        }
        MessageKind::Register => {
            let node: Node = message.content.parse()?;
            ctx.directory.insert(node.clone());
            ctx.status.emit(format!("*** {} joined the swarm ***", node));
        }
        MessageKind::PublicMessage => ctx.status.emit(format!(
            "<{} - PUBLIC> {}",
            message.sender.port, message.content
        )),
        MessageKind::PrivateMessage => ctx.status.emit(format!(
            "<{} - PRIVATE> {}",
            message.sender.port, message.content
        )),
        _ => {}
    }

    Ok(Reply::ack_for(kind).unwrap_or_else(|| Reply::Error(format!("no reply for {kind}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::QueueReceiver;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const LIMIT: Duration = Duration::from_secs(5);

    fn context() -> (Arc<NodeContext>, QueueReceiver) {
        NodeContext::new(Node::loopback(5000), NetworkConfig::default())
    }

    fn from(port: u16, kind: MessageKind, content: &str) -> Message {
        Message::new(Node::loopback(port), kind, content, Node::loopback(5000))
    }

    #[tokio::test]
    async fn test_relay_register_replies_with_self_and_peers() {
        let (ctx, mut rx) = context();
        ctx.directory.insert(Node::loopback(5001));
        let mut status = ctx.status.subscribe();

        let reply = dispatch(&ctx, from(5002, MessageKind::RelayRegister, "127.0.0.1/5002")).unwrap();
        assert_eq!(
            reply,
            Reply::PeerList(vec![Node::loopback(5000), Node::loopback(5001)])
        );

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.kind, MessageKind::Register);
        assert_eq!(queued.content, "127.0.0.1/5002");
        assert_eq!(queued.recipient, Node::loopback(5000));
        // The newcomer is only added once the sender has relayed it.
        assert!(!ctx.directory.contains(&Node::loopback(5002)));

        let line = status.recv().await.unwrap();
        assert_eq!(line.text, "*** 127.0.0.1/5002 joined the swarm ***");
    }

    #[test]
    fn test_register_adds_peer() {
        let (ctx, _rx) = context();
        let reply = dispatch(&ctx, from(5001, MessageKind::Register, "127.0.0.1/5003")).unwrap();
        assert_eq!(reply, Reply::RegisterAck);
        assert_eq!(ctx.directory.snapshot(), vec![Node::loopback(5003)]);
    }

    #[test]
    fn test_register_with_bad_content_is_rejected() {
        let (ctx, _rx) = context();
        let err = dispatch(&ctx, from(5001, MessageKind::Register, "nonsense")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidNode(_)));
        assert!(ctx.directory.is_empty());
    }

    #[tokio::test]
    async fn test_chat_messages_are_acked_and_shown() {
        let (ctx, _rx) = context();
        let mut status = ctx.status.subscribe();

        let reply = dispatch(&ctx, from(5001, MessageKind::PublicMessage, "hi all")).unwrap();
        assert_eq!(reply, Reply::PublicMessageAck);
        let reply = dispatch(&ctx, from(5002, MessageKind::PrivateMessage, "psst")).unwrap();
        assert_eq!(reply, Reply::PrivateMessageAck);

        assert_eq!(status.recv().await.unwrap().text, "<5001 - PUBLIC> hi all");
        assert_eq!(status.recv().await.unwrap().text, "<5002 - PRIVATE> psst");
    }

    #[test]
    fn test_reply_tags_as_requests_get_an_error() {
        let (ctx, _rx) = context();
        let reply = dispatch(&ctx, from(5001, MessageKind::Pong, "")).unwrap();
        assert_eq!(reply, Reply::Error("unexpected message type PONG".to_string()));
    }

    async fn spawn_listener() -> (Arc<NodeContext>, QueueReceiver) {
        let listener = Listener::bind(&NetworkConfig::default()).await.unwrap();
        let (ctx, rx) = NodeContext::new(listener.self_node().clone(), NetworkConfig::default());
        tokio::spawn(listener.run(ctx.clone()));
        (ctx, rx)
    }

    #[tokio::test]
    async fn test_ping_over_the_wire() {
        let (ctx, _rx) = spawn_listener().await;
        let addr = format!("127.0.0.1:{}", ctx.self_node.port);

        let mut framed = frame(TcpStream::connect(&addr).await.unwrap());
        let ping = Message::new(Node::loopback(1), MessageKind::Ping, "", ctx.self_node.clone());
        write_frame(&mut framed, &ping, LIMIT).await.unwrap();
        let reply: Reply = read_frame(&mut framed, LIMIT).await.unwrap();
        assert_eq!(reply, Reply::Pong);

        // One request per connection.
        let err = read_frame::<Reply>(&mut framed, LIMIT).await.unwrap_err();
        assert!(matches!(err, ChatError::ConnectionClosed | ChatError::Io(_)));
    }

    #[tokio::test]
    async fn test_malformed_frame_drops_only_that_connection() {
        let (ctx, _rx) = spawn_listener().await;
        let addr = format!("127.0.0.1:{}", ctx.self_node.port);

        let mut raw = TcpStream::connect(&addr).await.unwrap();
        raw.write_all(&4u32.to_be_bytes()).await.unwrap();
        raw.write_all(b"oops").await.unwrap();
        let mut framed = frame(raw);
        assert!(read_frame::<Reply>(&mut framed, LIMIT).await.is_err());

        let mut framed = frame(TcpStream::connect(&addr).await.unwrap());
        let ping = Message::new(Node::loopback(1), MessageKind::Ping, "", ctx.self_node.clone());
        write_frame(&mut framed, &ping, LIMIT).await.unwrap();
        assert_eq!(read_frame::<Reply>(&mut framed, LIMIT).await.unwrap(), Reply::Pong);
    }

    #[test]
    fn test_every_request_gets_its_ack() {
        let (ctx, _rx) = context();
        let cases = [
            (MessageKind::Register, "127.0.0.1/5003", Reply::RegisterAck),
            (MessageKind::Ping, "", Reply::Pong),
            (MessageKind::PublicMessage, "hi", Reply::PublicMessageAck),
            (MessageKind::PrivateMessage, "hi", Reply::PrivateMessageAck),
        ];
        for (kind, content, expected) in cases {
            assert_eq!(dispatch(&ctx, from(5001, kind, content)).unwrap(), expected);
        }
        for kind in [
            MessageKind::RegisterAck,
            MessageKind::PublicMessageAck,
            MessageKind::PrivateMessageAck,
        ] {
            let reply = dispatch(&ctx, from(5001, kind, "")).unwrap();
            assert_eq!(reply, Reply::Error(format!("unexpected message type {kind}")));
        }
    }

    #[tokio::test]
    async fn test_wildcard_bind_advertises_loopback() {
        let config = NetworkConfig::default().with_host("0.0.0.0");
        let listener = Listener::bind(&config).await.unwrap();
        assert_eq!(listener.self_node().host, "127.0.0.1");
        assert_ne!(listener.self_node().port, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_error_backs_off() {
        let started = tokio::time::Instant::now();
        back_off_after(&io::Error::from(io::ErrorKind::Other)).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let listener = Listener::bind(&NetworkConfig::default()).await.unwrap();
        let taken = NetworkConfig::default().with_port(listener.self_node().port);
        let err = Listener::bind(&taken).await.unwrap_err();
        assert!(matches!(err, ChatError::Bind { .. }));
    }
}

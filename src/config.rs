//! Node configuration.

use crate::network::message::{Node, LOOPBACK_HOST};
use clap::Parser;
use std::time::Duration;

/// Where new nodes look for a swarm unless told otherwise.
pub const DEFAULT_BOOTSTRAP: &str = "127.0.0.1/5000";

/// Configuration for the network layer.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface to bind. Peers always know this node by the loopback host.
    ///
    /// Default: `127.0.0.1`.
    pub host: String,

    /// Port to listen on. `0` lets the system choose.
    pub port: u16,

    /// Timeout for establishing an outbound connection.
    ///
    /// Default: 5 seconds.
    pub connect_timeout: Duration,

    /// Timeout for each frame read or write, inbound and outbound.
    ///
    /// Default: 10 seconds.
    pub io_timeout: Duration,

    /// Maximum number of inbound connections handled at once.
    ///
    /// Default: 64.
    pub max_connections: usize,

    /// Lines a slow status subscriber may fall behind before it skips ahead.
    pub status_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: LOOPBACK_HOST.to_string(),
            port: 0,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
            max_connections: 64,
            status_capacity: 256,
        }
    }
}

impl NetworkConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }
}

/// Command-line options of the chat binary
#[derive(Parser, Debug)]
#[command(name = "swarm-chat", about = "Peer-to-peer chat over a bootstrap swarm")]
pub struct Cli {
    /// Port to listen on (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, default_value = LOOPBACK_HOST)]
    pub host: String,

    /// Peer to join through, as host/port
    #[arg(long, value_name = "HOST/PORT", default_value = DEFAULT_BOOTSTRAP)]
    pub bootstrap: Node,

    /// Start a new swarm instead of joining one
    #[arg(long)]
    pub create: bool,

    /// Outbound connect timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Per-frame read/write timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    pub io_timeout_ms: u64,

    /// Inbound connections handled concurrently
    #[arg(long, default_value_t = 64)]
    pub max_connections: usize,

    /// Status lines buffered for slow readers
    #[arg(long, default_value_t = 256)]
    pub status_capacity: usize,
}

impl Cli {
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig::new()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_io_timeout(Duration::from_millis(self.io_timeout_ms))
            .with_max_connections(self.max_connections)
            .with_status_capacity(self.status_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["swarm-chat"]).unwrap();
        assert_eq!(cli.bootstrap, Node::loopback(5000));
        assert!(!cli.create);

        let config = cli.network_config();
        assert_eq!(config.port, 0);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
        assert_eq!(config.max_connections, 64);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "swarm-chat",
            "--port",
            "5001",
            "--bootstrap",
            "10.0.0.2/6000",
            "--io-timeout-ms",
            "250",
            "--max-connections",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.bootstrap, Node::new("10.0.0.2", 6000));

        let config = cli.network_config();
        assert_eq!(config.port, 5001);
        assert_eq!(config.io_timeout, Duration::from_millis(250));
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn test_cli_rejects_bad_bootstrap() {
        assert!(Cli::try_parse_from(["swarm-chat", "--bootstrap", "localhost:5000"]).is_err());
    }
}

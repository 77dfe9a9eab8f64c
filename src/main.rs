use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use swarm_chat::bootstrap::CandidateSource;
use swarm_chat::config::Cli;
use swarm_chat::status::StatusLine;
use swarm_chat::{ChatNode, Node};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Reads replacement bootstrap addresses typed by the user.
struct StdinCandidates<'a> {
    lines: &'a mut Lines<BufReader<Stdin>>,
}

#[async_trait]
impl<'a> CandidateSource for StdinCandidates<'a> {
    async fn next_candidate(&mut self, _unreachable: &Node) -> Option<Node> {
        loop {
            let line = self.lines.next_line().await.ok()??;
            match line.parse() {
                Ok(node) => return Some(node),
                Err(e) => println!("{}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let node = ChatNode::start(cli.network_config())
        .await
        .context("could not start listener")?;

    // Show status lines in a separate task so input never waits on output
    tokio::spawn(show_status(node.status()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if cli.create {
        node.create_swarm();
    } else {
        let mut prompt = StdinCandidates { lines: &mut lines };
        if node.join_swarm(cli.bootstrap.clone(), &mut prompt).await.is_none() {
            anyhow::bail!("no reachable peer to join through");
        }
    }

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        handle_input(&node, line.trim());
    }

    node.shutdown().await;
    Ok(())
}

/// `@host/port text` is private, `/peers` lists peers, anything else goes to everyone.
fn handle_input(node: &ChatNode, line: &str) {
    if line.is_empty() {
        return;
    }
    if line == "/peers" {
        let peers: Vec<String> = node.peers().iter().map(Node::to_string).collect();
        println!("ALL, {}", peers.join(", "));
        return;
    }
    if let Some(rest) = line.strip_prefix('@') {
        let Some((addr, text)) = rest.split_once(' ') else {
            println!("usage: @host/port message");
            return;
        };
        match addr.parse::<Node>() {
            Ok(peer) if node.peers().contains(&peer) => {
                node.send_private(peer, text.trim());
            }
            Ok(peer) => println!("*** {} is not a known peer ***", peer),
            Err(e) => println!("{}", e),
        }
        return;
    }
    node.send_public(line);
}

async fn show_status(mut rx: broadcast::Receiver<StatusLine>) {
    loop {
        match rx.recv().await {
            Ok(line) => println!("{}", line),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "status output fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

//! The shared directory of known peers.
//!
//! Every read and write goes through one directory-wide lock. Entries keep
//! insertion order and are unique; the local node is never stored. Each
//! mutation publishes a fresh snapshot to `watch` subscribers.

use crate::network::message::Node;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct PeerDirectory {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    self_node: Node,
    peers: RwLock<Vec<Node>>,
    view: watch::Sender<Vec<Node>>,
}

impl PeerDirectory {
    pub fn new(self_node: Node) -> Self {
        let (view, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                self_node,
                peers: RwLock::new(Vec::new()),
                view,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Node>> {
        // A panic while holding the lock leaves the list itself intact.
        self.inner.peers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Node>> {
        self.inner.peers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, peers: &[Node]) {
        self.inner.view.send_replace(peers.to_vec());
    }

    /// Add a peer. Returns false if it was already known or is the local node.
    pub fn insert(&self, node: Node) -> bool {
        if node == self.inner.self_node {
            return false;
        }
        let mut peers = self.write();
        if peers.contains(&node) {
            return false;
        }
        peers.push(node);
        self.publish(&peers);
        true
    }

    /// Add several peers under one lock acquisition. Returns how many were new.
    pub fn extend<I: IntoIterator<Item = Node>>(&self, nodes: I) -> usize {
        let mut peers = self.write();
        let mut added = 0;
        for node in nodes {
            if node != self.inner.self_node && !peers.contains(&node) {
                peers.push(node);
                added += 1;
            }
        }
        if added > 0 {
            self.publish(&peers);
        }
        added
    }

    /// Evict a peer. Returns false if it was not present.
    pub fn remove(&self, node: &Node) -> bool {
        let mut peers = self.write();
        let before = peers.len();
        peers.retain(|peer| peer != node);
        let removed = peers.len() != before;
        if removed {
            self.publish(&peers);
        }
        removed
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.read().contains(node)
    }

    /// Point-in-time copy of the peers, in insertion order.
    pub fn snapshot(&self) -> Vec<Node> {
        self.read().clone()
    }

    /// Self followed by every known peer, as handed to a joining node.
    pub fn snapshot_with_self(&self) -> Vec<Node> {
        let peers = self.read();
        let mut list = Vec::with_capacity(peers.len() + 1);
        list.push(self.inner.self_node.clone());
        list.extend(peers.iter().cloned());
        list
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Receive a snapshot after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Node>> {
        self.inner.view.subscribe()
    }
}

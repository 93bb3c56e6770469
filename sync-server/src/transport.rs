//! Server-side transport contract.
//!
//! A [`Listener`] yields accepted connections. Each connection is split
//! into a [`PeerLink`] for outbound frames (kept in the registry so any
//! task can address the peer) and an inbound frame stream owned by that
//! connection's session. The inbound stream ending means the peer left.

use std::sync::Arc;

use async_trait::async_trait;
use sync_types::Frame;
use tokio::sync::mpsc;

use crate::error::LinkError;

/// Outbound half of one connection.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Send one frame to this peer.
    async fn send(&self, frame: &Frame) -> Result<(), LinkError>;

    /// Human-readable peer address.
    fn remote(&self) -> &str;

    /// Close the outbound half.
    async fn close(&self);
}

/// A freshly accepted connection.
pub struct IncomingConnection {
    /// Outbound half.
    pub link: Arc<dyn PeerLink>,
    /// Inbound frames, in receipt order.
    pub inbound: mpsc::Receiver<Frame>,
    /// Peer address.
    pub remote: String,
}

impl std::fmt::Debug for IncomingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingConnection")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

/// Source of incoming connections.
#[async_trait]
pub trait Listener: Send {
    /// Wait for the next connection. `None` once the listener is closed.
    async fn accept(&mut self) -> Option<IncomingConnection>;
}

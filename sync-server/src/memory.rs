//! In-process listener for tests and embedding.
//!
//! [`memory_listener`] returns a listener and a cloneable connector. Each
//! `connect` wires a fresh pair of channels and hands the server its end;
//! the caller gets the other end to drive a client transport.

use std::sync::Arc;

use async_trait::async_trait;
use sync_types::Frame;
use tokio::sync::{mpsc, Mutex};

use crate::error::LinkError;
use crate::transport::{IncomingConnection, Listener, PeerLink};

/// Frames buffered per direction.
const LINK_BUFFER: usize = 64;

/// Create a connected listener/connector pair.
pub fn memory_listener() -> (MemoryListener, MemoryConnector) {
    let (tx, rx) = mpsc::channel(LINK_BUFFER);
    (MemoryListener { rx }, MemoryConnector { tx })
}

/// Listener half; give it to `SyncServer::serve`.
pub struct MemoryListener {
    rx: mpsc::Receiver<IncomingConnection>,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&mut self) -> Option<IncomingConnection> {
        self.rx.recv().await
    }
}

/// Connector half; each call opens one connection.
#[derive(Clone)]
pub struct MemoryConnector {
    tx: mpsc::Sender<IncomingConnection>,
}

impl MemoryConnector {
    /// Open a connection named `remote`.
    ///
    /// Returns the client's sender (towards the server) and receiver (from
    /// the server).
    pub async fn connect(
        &self,
        remote: &str,
    ) -> Result<(mpsc::Sender<Frame>, mpsc::Receiver<Frame>), LinkError> {
        let (to_server_tx, to_server_rx) = mpsc::channel(LINK_BUFFER);
        let (to_client_tx, to_client_rx) = mpsc::channel(LINK_BUFFER);

        let link = MemoryLink {
            tx: Mutex::new(Some(to_client_tx)),
            remote: remote.to_string(),
        };
        let incoming = IncomingConnection {
            link: Arc::new(link),
            inbound: to_server_rx,
            remote: remote.to_string(),
        };
        self.tx.send(incoming).await.map_err(|_| LinkError::Closed)?;

        Ok((to_server_tx, to_client_rx))
    }
}

struct MemoryLink {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    remote: String,
}

#[async_trait]
impl PeerLink for MemoryLink {
    async fn send(&self, frame: &Frame) -> Result<(), LinkError> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or(LinkError::Closed)?;
        tx.send(frame.clone()).await.map_err(|_| LinkError::Closed)
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    async fn close(&self) {
        self.tx.lock().await.take();
    }
}

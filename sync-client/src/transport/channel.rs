//! In-process transport over tokio channels.
//!
//! Pairs with the server's in-memory listener: the server hands out the
//! two channel ends and the test wraps them here. `connect` only flips the
//! connected flag since the pair is already wired.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use sync_types::Frame;
use tokio::sync::{mpsc, Mutex};

/// Transport backed by an `mpsc` pair.
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
    rx: Mutex<mpsc::Receiver<Frame>>,
    connected: AtomicBool,
}

impl ChannelTransport {
    /// Wrap a pre-wired channel pair.
    pub fn new(tx: mpsc::Sender<Frame>, rx: mpsc::Receiver<Frame>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self, _address: &str) -> Result<(), TransportError> {
        if self.tx.lock().await.is_none() {
            return Err(TransportError::ConnectionFailed("channel closed".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, channel: &str, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(Frame::new(channel, data.to_vec()))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping the sender ends the peer's inbound stream
        self.tx.lock().await.take();
        Ok(())
    }
}

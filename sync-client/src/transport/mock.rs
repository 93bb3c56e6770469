//! Mock transport for testing.
//!
//! Allows queueing frames and capturing sent frames for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use sync_types::{Envelope, Frame, FILE_TRANSFER_CHANNEL};

/// Mock transport for testing.
///
/// Clones share state, so a test can keep a handle after moving the
/// transport into a client.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    sent: Vec<Frame>,
    receive_queue: VecDeque<Frame>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_frame(&self, frame: Frame) {
        self.lock().receive_queue.push_back(frame);
    }

    /// Queue an envelope on the file-transfer channel.
    pub fn queue_envelope(&self, envelope: &Envelope) {
        // Envelopes built in tests always encode
        if let Ok(bytes) = envelope.to_bytes() {
            self.queue_frame(Frame::new(FILE_TRANSFER_CHANNEL, bytes));
        }
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.lock().sent.clone()
    }

    /// Decode every sent frame as an envelope, skipping any that fail.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.lock()
            .sent
            .iter()
            .filter_map(|f| Envelope::from_bytes(&f.payload).ok())
            .collect()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected_address.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockTransportInner> {
        // A panicking test thread poisons the lock; the data is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, channel: &str, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent.push(Frame::new(channel, data.to_vec()));
        Ok(())
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::PacketType;

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect("127.0.0.1:7400").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(
            transport.connected_address(),
            Some("127.0.0.1:7400".to_string())
        );
    }

    #[tokio::test]
    async fn mock_transport_records_channel() {
        let transport = MockTransport::new();
        transport.connect("server").await.unwrap();

        transport.send("a", b"one").await.unwrap();
        transport.send("b", b"two").await.unwrap();

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], Frame::new("a", b"one".to_vec()));
        assert_eq!(sent[1].channel, "b");
    }

    #[tokio::test]
    async fn mock_transport_receives_queued_frames() {
        let transport = MockTransport::new();
        transport.connect("server").await.unwrap();
        transport.queue_envelope(&Envelope::new(PacketType::Broadcast, vec![]));

        let frame = transport.recv().await.unwrap();
        assert_eq!(frame.channel, FILE_TRANSFER_CHANNEL);
        let envelope = Envelope::from_bytes(&frame.payload).unwrap();
        assert_eq!(envelope.packet_type, PacketType::Broadcast);
    }

    #[tokio::test]
    async fn recv_empty_returns_closed() {
        let transport = MockTransport::new();
        transport.connect("server").await.unwrap();

        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = MockTransport::new();
        assert!(matches!(
            transport.send("c", b"data").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn forced_failures_are_one_shot() {
        let transport = MockTransport::new();
        transport.fail_next_connect("refused");
        assert!(matches!(
            transport.connect("server").await,
            Err(TransportError::ConnectionFailed(_))
        ));
        assert!(!transport.is_connected());

        transport.connect("server").await.unwrap();
        transport.fail_next_send("buffer full");
        assert!(transport.send("c", b"x").await.is_err());
        transport.send("c", b"x").await.unwrap();
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let t1 = MockTransport::new();
        let t2 = t1.clone();

        t1.connect("server").await.unwrap();
        assert!(t2.is_connected());

        t2.close().await.unwrap();
        assert!(!t1.is_connected());
    }
}

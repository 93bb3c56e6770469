//! SyncClient - the client side of a dirsync reconciliation.
//!
//! # Architecture
//!
//! SyncClient uses a pure state machine (from sync-core) for protocol logic
//! and interprets the actions to perform actual I/O via the Transport trait
//! and the local [`FileStore`].
//!
//! ```text
//! Application → SyncClient → Transport → Network
//!                   ↓            ↑
//!              sync-core     FileStore (local directory)
//! ```
//!
//! # Exchange
//!
//! 1. `connect()` opens the transport and sends a `Metadata` envelope.
//! 2. The server answers `Differences`: every blob after the manifest is
//!    written locally, and the files the manifest requests (`-1`) are sent
//!    back as `ClientFiles`. The client always answers, even with nothing.
//! 3. `Broadcast` envelopes are written unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use sync_client::{ClientConfig, SyncClient, TcpTransport};
//!
//! let config = ClientConfig::new("./tools", "127.0.0.1:7400");
//! let client = SyncClient::new(config, TcpTransport::new());
//!
//! client.connect().await?;
//! client.run().await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use sync_core::{Action, ClientState, Event, SyncEvent};
use sync_store::{FileStore, StorageError};
use sync_types::{CodecError, Envelope, Frame, PacketType, FILE_TRANSFER_CHANNEL};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportError};

/// Capacity of the status event channel.
const EVENT_CAPACITY: usize = 64;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Local file store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Not connected to a server.
    #[error("not connected")]
    NotConnected,

    /// Already connected or connecting.
    #[error("already connected")]
    AlreadyConnected,

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server sent a packet type only clients send.
    #[error("protocol error: unexpected {0:?} envelope")]
    UnexpectedPacket(PacketType),
}

/// Configuration for SyncClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory kept in sync.
    pub directory: PathBuf,
    /// Address of the server.
    pub server_address: String,
    /// Prefix received files with a per-exchange token.
    pub unique_prefix: bool,
    /// Channel envelopes travel on.
    pub channel: String,
}

impl ClientConfig {
    /// Create a configuration with defaults.
    pub fn new(directory: impl Into<PathBuf>, server_address: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            server_address: server_address.into(),
            unique_prefix: false,
            channel: FILE_TRANSFER_CHANNEL.to_string(),
        }
    }

    /// Prefix received files with a per-exchange token.
    pub fn with_unique_prefix(mut self, enabled: bool) -> Self {
        self.unique_prefix = enabled;
        self
    }

    /// Use a custom channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

/// What handling one envelope did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handled {
    /// Packet type that was handled.
    pub packet_type: Option<PacketType>,
    /// Names written locally.
    pub written: Vec<String>,
    /// Names uploaded to the server.
    pub uploaded: Vec<String>,
}

/// The dirsync client.
pub struct SyncClient<T: Transport> {
    config: ClientConfig,
    transport: T,
    store: FileStore,
    state: Arc<Mutex<ClientState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl<T: Transport> SyncClient<T> {
    /// Create a new SyncClient.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let store = FileStore::new(&config.directory).with_unique_prefix(config.unique_prefix);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            transport,
            store,
            state: Arc::new(Mutex::new(ClientState::new())),
            events,
        }
    }

    /// Subscribe to status events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Current state.
    pub async fn state(&self) -> ClientState {
        *self.state.lock().await
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    /// The local file store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Connect to the server and send this directory's metadata.
    ///
    /// A failed connect leaves the client disconnected; it is not retried.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let actions = self.apply(Event::ConnectRequested).await?;
        if !actions.contains(&Action::Connect) {
            return Err(ClientError::AlreadyConnected);
        }

        if let Err(e) = self.transport.connect(&self.config.server_address).await {
            warn!(address = %self.config.server_address, error = %e, "Connection failed");
            self.apply(Event::ConnectFailed {
                error: e.to_string(),
            })
            .await?;
            return Err(ClientError::ConnectionFailed(e.to_string()));
        }

        info!(address = %self.config.server_address, "Connected");
        self.apply(Event::ConnectSucceeded).await?;
        Ok(())
    }

    /// Re-send metadata to start another reconciliation pass.
    pub async fn sync_up(&self) -> Result<(), ClientError> {
        if !self.is_connected().await {
            return Err(ClientError::NotConnected);
        }
        self.apply(Event::SyncRequested).await?;
        Ok(())
    }

    /// Disconnect from the server.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.apply(Event::DisconnectRequested).await?;
        Ok(())
    }

    /// Receive and handle frames until the connection closes.
    ///
    /// Handler errors are logged and reported as events; they never end
    /// the loop. Returns `Ok` on a clean close.
    pub async fn run(&self) -> Result<(), ClientError> {
        loop {
            match self.transport.recv().await {
                Ok(frame) => {
                    self.handle_frame_logged(frame).await;
                }
                Err(TransportError::ConnectionClosed) => {
                    self.apply(Event::Disconnected {
                        reason: "connection closed".into(),
                    })
                    .await?;
                    return Ok(());
                }
                Err(e) => {
                    self.apply(Event::Disconnected {
                        reason: e.to_string(),
                    })
                    .await?;
                    return Err(e.into());
                }
            }
        }
    }

    /// Receive frames until one `Differences` exchange has been answered.
    ///
    /// Broadcasts arriving first are handled along the way.
    pub async fn sync_once(&self) -> Result<Handled, ClientError> {
        loop {
            let frame = self.transport.recv().await?;
            if let Some(handled) = self.handle_frame_logged(frame).await {
                if handled.packet_type == Some(PacketType::Differences) {
                    return Ok(handled);
                }
            }
        }
    }

    async fn handle_frame_logged(&self, frame: Frame) -> Option<Handled> {
        match self.handle_frame(frame).await {
            Ok(handled) => Some(handled),
            Err(e) => {
                warn!(error = %e, "Failed to handle envelope");
                self.emit(SyncEvent::Error {
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Handle one received frame. Frames on other channels are ignored.
    pub async fn handle_frame(&self, frame: Frame) -> Result<Handled, ClientError> {
        if frame.channel != self.config.channel {
            debug!(channel = %frame.channel, "Ignoring frame on foreign channel");
            return Ok(Handled::default());
        }
        let envelope = Envelope::from_bytes(&frame.payload)?;
        self.handle_envelope(envelope).await
    }

    /// Handle one decoded envelope.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<Handled, ClientError> {
        match envelope.packet_type {
            PacketType::Differences => self.on_differences(envelope).await,
            PacketType::Broadcast => self.on_broadcast(envelope).await,
            other => Err(ClientError::UnexpectedPacket(other)),
        }
    }

    async fn on_differences(&self, envelope: Envelope) -> Result<Handled, ClientError> {
        // A bad manifest drops the whole exchange before anything is written
        let diff = envelope.diff_manifest()?;

        let actions = self.apply(Event::DifferencesReceived).await?;
        let mut handled = Handled {
            packet_type: Some(PacketType::Differences),
            ..Default::default()
        };
        if !actions.contains(&Action::WriteFiles) {
            return Ok(handled);
        }

        handled.written = self.write_blobs(&envelope).await;

        for rename in &diff.renamed {
            debug!(from = %rename.rename_from, to = %rename.rename_to, "Server holds file under another name");
        }

        let requested = diff.remote_only_names();
        let blobs = self.store.read_blobs(&requested).await;
        handled.uploaded = blobs.iter().map(|b| b.name.clone()).collect();
        let answer = Envelope::new(PacketType::ClientFiles, blobs);
        self.send_envelope(&answer).await?;

        info!(
            received = handled.written.len(),
            requested = requested.len(),
            uploaded = handled.uploaded.len(),
            "Reconciliation exchange complete"
        );
        self.emit(SyncEvent::FilesUploaded {
            names: handled.uploaded.clone(),
        });
        self.apply(Event::UploadSent).await?;
        Ok(handled)
    }

    async fn on_broadcast(&self, envelope: Envelope) -> Result<Handled, ClientError> {
        let actions = self.apply(Event::BroadcastReceived).await?;
        let mut handled = Handled {
            packet_type: Some(PacketType::Broadcast),
            ..Default::default()
        };
        if actions.contains(&Action::WriteFiles) {
            handled.written = self.write_blobs(&envelope).await;
            info!(files = handled.written.len(), "Broadcast applied");
        }
        Ok(handled)
    }

    async fn write_blobs(&self, envelope: &Envelope) -> Vec<String> {
        let blobs = envelope.data_blobs();
        if blobs.is_empty() {
            return Vec::new();
        }
        let report = self.store.write_all(blobs).await;
        if !report.written.is_empty() {
            self.emit(SyncEvent::FilesWritten {
                names: report.written.clone(),
            });
        }
        report.written
    }

    async fn send_metadata(&self) -> Result<(), ClientError> {
        let records = self.store.snapshot().await;
        debug!(files = records.len(), "Sending metadata");
        self.send_envelope(&Envelope::metadata(&records)?).await
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let bytes = envelope.to_bytes()?;
        self.transport.send(&self.config.channel, &bytes).await?;
        Ok(())
    }

    /// Feed an event to the state machine and run the I/O actions it asks
    /// for. Returns the actions left for the caller (file writes).
    async fn apply(&self, event: Event) -> Result<Vec<Action>, ClientError> {
        let actions = {
            let mut state = self.state.lock().await;
            let (next, actions) = state.on_event(event);
            *state = next;
            actions
        };

        let mut remaining = Vec::new();
        for action in actions {
            match action {
                Action::EmitEvent(event) => self.emit(event),
                Action::SendMetadata => self.send_metadata().await?,
                Action::Disconnect => self.transport.close().await?,
                other => remaining.push(other),
            }
        }
        Ok(remaining)
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use sync_store::hash_bytes;
    use sync_types::{ContentBlob, DiffResult, FileEntry, FileRecord};

    fn setup() -> (tempfile::TempDir, MockTransport, SyncClient<MockTransport>) {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        let config = ClientConfig::new(dir.path(), "server:7400");
        let client = SyncClient::new(config, transport.clone());
        (dir, transport, client)
    }

    fn entry(name: &str, content: &[u8]) -> FileEntry {
        FileEntry {
            name: name.into(),
            content_hash: hash_bytes(content),
        }
    }

    #[tokio::test]
    async fn connect_sends_metadata() {
        let (dir, transport, client) = setup();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();

        client.connect().await.unwrap();

        assert_eq!(transport.connected_address(), Some("server:7400".into()));
        assert_eq!(client.state().await, ClientState::AwaitingDifferences);

        let sent = transport.sent_envelopes();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet_type, PacketType::Metadata);
        assert_eq!(
            sent[0].metadata_records().unwrap(),
            vec![FileRecord::new("a.txt", hash_bytes(b"alpha"))]
        );
        assert_eq!(transport.sent_frames()[0].channel, FILE_TRANSFER_CHANNEL);
    }

    #[tokio::test]
    async fn second_connect_rejected_without_redialing() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();
        let sent_before = transport.sent_frames().len();
        let state_before = client.state().await;

        let result = client.connect().await;
        assert!(matches!(result, Err(ClientError::AlreadyConnected)));
        assert_eq!(client.state().await, state_before);
        assert_eq!(transport.sent_frames().len(), sent_before);
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn connect_failure_reports_and_stays_disconnected() {
        let (_dir, transport, client) = setup();
        let mut events = client.subscribe();
        transport.fail_next_connect("refused");

        let result = client.connect().await;
        assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));
        assert_eq!(client.state().await, ClientState::Disconnected);
        assert!(transport.sent_frames().is_empty());
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::ConnectionFailed { .. }
        ));
    }

    #[tokio::test]
    async fn differences_writes_files_and_uploads_requested() {
        let (dir, transport, client) = setup();
        std::fs::write(dir.path().join("mine.txt"), b"client data").unwrap();
        client.connect().await.unwrap();

        let diff = DiffResult {
            remote_only: vec![entry("mine.txt", b"client data")],
            local_only: vec![entry("theirs.txt", b"server data")],
            ..Default::default()
        };
        let envelope = Envelope::differences(
            &diff,
            vec![ContentBlob::encode("theirs.txt", b"server data")],
        )
        .unwrap();

        let handled = client.handle_envelope(envelope).await.unwrap();
        assert_eq!(handled.written, vec!["theirs.txt"]);
        assert_eq!(handled.uploaded, vec!["mine.txt"]);
        assert_eq!(
            std::fs::read(dir.path().join("theirs.txt")).unwrap(),
            b"server data"
        );

        let sent = transport.sent_envelopes();
        let answer = sent.last().unwrap();
        assert_eq!(answer.packet_type, PacketType::ClientFiles);
        assert_eq!(answer.blobs.len(), 1);
        assert_eq!(answer.blobs[0].decode().unwrap(), b"client data");
        assert_eq!(client.state().await, ClientState::Connected);
    }

    #[tokio::test]
    async fn manifest_is_never_written_as_a_file() {
        let (dir, _transport, client) = setup();
        client.connect().await.unwrap();

        let envelope = Envelope::differences(&DiffResult::default(), vec![]).unwrap();
        let handled = client.handle_envelope(envelope).await.unwrap();

        assert!(handled.written.is_empty());
        assert!(!dir.path().join("differences.json").exists());
    }

    #[tokio::test]
    async fn empty_request_still_answers() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();

        let envelope = Envelope::differences(&DiffResult::default(), vec![]).unwrap();
        client.handle_envelope(envelope).await.unwrap();

        let sent = transport.sent_envelopes();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].packet_type, PacketType::ClientFiles);
        assert!(sent[1].blobs.is_empty());
    }

    #[tokio::test]
    async fn requested_file_missing_is_skipped() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();

        let diff = DiffResult {
            remote_only: vec![entry("vanished.txt", b"x")],
            ..Default::default()
        };
        let envelope = Envelope::differences(&diff, vec![]).unwrap();
        let handled = client.handle_envelope(envelope).await.unwrap();

        assert!(handled.uploaded.is_empty());
        assert!(transport.sent_envelopes()[1].blobs.is_empty());
    }

    #[tokio::test]
    async fn bad_blob_does_not_stop_others() {
        let (dir, _transport, client) = setup();
        client.connect().await.unwrap();

        let envelope = Envelope::new(
            PacketType::Broadcast,
            vec![
                ContentBlob::new("broken.bin", "!!not base64!!"),
                ContentBlob::encode("ok.txt", b"fine"),
            ],
        );
        let handled = client.handle_envelope(envelope).await.unwrap();

        assert_eq!(handled.written, vec!["ok.txt"]);
        assert!(dir.path().join("ok.txt").exists());
        assert!(!dir.path().join("broken.bin").exists());
    }

    #[tokio::test]
    async fn broadcast_writes_every_blob() {
        let (dir, transport, client) = setup();
        client.connect().await.unwrap();
        let before = transport.sent_frames().len();

        let xml = b"<?xml version=\"1.0\"?><tool/>";
        let envelope = Envelope::new(
            PacketType::Broadcast,
            vec![
                ContentBlob::encode("a.xml", xml),
                ContentBlob::encode("b.bin", &[9, 8, 7]),
            ],
        );
        client.handle_envelope(envelope).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.xml")).unwrap(), xml);
        assert_eq!(std::fs::read(dir.path().join("b.bin")).unwrap(), vec![9, 8, 7]);
        // No reply to a broadcast
        assert_eq!(transport.sent_frames().len(), before);
    }

    #[tokio::test]
    async fn unique_prefix_applied_to_received_files() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        let config = ClientConfig::new(dir.path(), "server").with_unique_prefix(true);
        let client = SyncClient::new(config, transport);
        client.connect().await.unwrap();

        let envelope = Envelope::new(
            PacketType::Broadcast,
            vec![ContentBlob::encode("r.txt", b"x")],
        );
        let handled = client.handle_envelope(envelope).await.unwrap();

        assert_eq!(handled.written.len(), 1);
        assert_ne!(handled.written[0], "r.txt");
        assert!(handled.written[0].ends_with("_r.txt"));
    }

    #[tokio::test]
    async fn client_only_packets_rejected() {
        let (_dir, _transport, client) = setup();
        client.connect().await.unwrap();

        for packet_type in [PacketType::Metadata, PacketType::ClientFiles] {
            let result = client
                .handle_envelope(Envelope::new(packet_type, vec![]))
                .await;
            assert!(matches!(result, Err(ClientError::UnexpectedPacket(p)) if p == packet_type));
        }
    }

    #[tokio::test]
    async fn foreign_channel_ignored() {
        let (_dir, _transport, client) = setup();
        client.connect().await.unwrap();

        let handled = client
            .handle_frame(Frame::new("chat", b"garbage".to_vec()))
            .await
            .unwrap();
        assert_eq!(handled, Handled::default());
    }

    #[tokio::test]
    async fn run_survives_malformed_frame() {
        let (dir, transport, client) = setup();
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        transport.queue_frame(Frame::new(FILE_TRANSFER_CHANNEL, b"garbage".to_vec()));
        transport.queue_envelope(&Envelope::new(
            PacketType::Broadcast,
            vec![ContentBlob::encode("after.txt", b"still here")],
        ));

        // Queue drains, then the mock reports the connection closed
        client.run().await.unwrap();

        assert!(dir.path().join("after.txt").exists());
        assert!(matches!(events.recv().await.unwrap(), SyncEvent::Error { .. }));
        assert_eq!(client.state().await, ClientState::Disconnected);
    }

    #[tokio::test]
    async fn sync_once_stops_after_differences() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();

        transport.queue_envelope(&Envelope::new(PacketType::Broadcast, vec![]));
        transport.queue_envelope(&Envelope::differences(&DiffResult::default(), vec![]).unwrap());
        transport.queue_envelope(&Envelope::new(PacketType::Broadcast, vec![]));

        let handled = client.sync_once().await.unwrap();
        assert_eq!(handled.packet_type, Some(PacketType::Differences));
        // The trailing broadcast is still queued
        assert!(transport.recv().await.is_ok());
    }

    #[tokio::test]
    async fn sync_up_resends_metadata() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();
        client
            .handle_envelope(Envelope::differences(&DiffResult::default(), vec![]).unwrap())
            .await
            .unwrap();

        client.sync_up().await.unwrap();

        let sent = transport.sent_envelopes();
        assert_eq!(sent.last().unwrap().packet_type, PacketType::Metadata);
        assert_eq!(client.state().await, ClientState::AwaitingDifferences);
    }

    #[tokio::test]
    async fn sync_up_requires_connection() {
        let (_dir, _transport, client) = setup();
        assert!(matches!(
            client.sync_up().await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_closes_transport() {
        let (_dir, transport, client) = setup();
        client.connect().await.unwrap();
        client.disconnect().await.unwrap();

        assert!(!transport.is_connected());
        assert!(!client.is_connected().await);
    }
}

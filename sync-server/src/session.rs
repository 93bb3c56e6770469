//! Per-connection session management.
//!
//! Each connection gets a Session that reads frames in order and handles
//! one envelope at a time behind the connection's gate. A failing handler
//! is logged and the session keeps reading; only the inbound stream ending
//! (or the read timeout) closes it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use sync_core::{compare, SyncEvent};
use sync_types::{ConnectionId, Envelope, Frame, PacketType};
use tokio::sync::{mpsc, Mutex};

use crate::error::{ProtocolError, Result};
use crate::server::SyncServer;

/// A per-connection session.
pub struct Session {
    server: Arc<SyncServer>,
    id: ConnectionId,
    gate: Arc<Mutex<()>>,
    inbound: mpsc::Receiver<Frame>,
}

impl Session {
    /// Create a session for a registered connection.
    pub fn new(
        server: Arc<SyncServer>,
        id: ConnectionId,
        gate: Arc<Mutex<()>>,
        inbound: mpsc::Receiver<Frame>,
    ) -> Self {
        Self {
            server,
            id,
            gate,
            inbound,
        }
    }

    /// Run the session until the peer goes away.
    pub async fn run(mut self) {
        let timeout = self.server.config().limits.read_timeout();

        loop {
            let frame = match timeout {
                Some(limit) => match tokio::time::timeout(limit, self.inbound.recv()).await {
                    Ok(frame) => frame,
                    Err(_) => {
                        tracing::warn!("Read timeout ({:?}) for {}", limit, self.id);
                        break;
                    }
                },
                None => self.inbound.recv().await,
            };
            let Some(frame) = frame else {
                tracing::debug!("Connection closed: {}", self.id);
                break;
            };

            if let Err(e) = self.handle_frame(frame).await {
                tracing::warn!("Error handling envelope from {}: {}", self.id, e);
                self.server.metrics().errors_total.fetch_add(1, Ordering::Relaxed);
                self.server.emit(SyncEvent::Error {
                    message: format!("{}: {}", self.id, e),
                });
            }
        }
    }

    /// Decode and dispatch one frame.
    async fn handle_frame(&self, frame: Frame) -> Result<()> {
        let config = self.server.config();
        if frame.channel != config.sync.channel {
            tracing::trace!("Ignoring frame on channel {}", frame.channel);
            return Ok(());
        }

        let limit = config.limits.max_message_size;
        if frame.payload.len() > limit {
            return Err(ProtocolError::MessageTooLarge {
                size: frame.payload.len(),
                limit,
            }
            .into());
        }

        let envelope = Envelope::from_bytes(&frame.payload)?;
        self.server
            .metrics()
            .envelopes_received
            .fetch_add(1, Ordering::Relaxed);

        let _guard = self.gate.lock().await;
        self.handle_envelope(envelope).await
    }

    async fn handle_envelope(&self, envelope: Envelope) -> Result<()> {
        tracing::debug!(
            "{} sent {:?} with {} blob(s)",
            self.id,
            envelope.packet_type,
            envelope.blobs.len()
        );
        match envelope.packet_type {
            PacketType::Metadata => self.handle_metadata(envelope).await,
            PacketType::ClientFiles => self.handle_client_files(envelope).await,
            other => Err(ProtocolError::UnexpectedPacket(other).into()),
        }
    }

    /// Compare the client's listing with the server directory and answer.
    async fn handle_metadata(&self, envelope: Envelope) -> Result<()> {
        let remote = envelope.metadata_records()?;
        let store = self.server.store();
        let local = store.snapshot().await;

        let diff = compare(&local, &remote);
        if let Err(e) = store.write_manifest(&diff).await {
            tracing::warn!("Failed to persist diff manifest: {}", e);
        }

        let pushed = store.read_blobs(&diff.local_only_names()).await;
        let pushed_count = pushed.len();
        let requested = diff.remote_only.len();
        let reply = Envelope::differences(&diff, pushed)?;
        self.server.send_to(self.id, &reply).await?;

        tracing::info!(
            "Differences sent to {}: {} pushed, {} requested, {} renamed",
            self.id,
            pushed_count,
            requested,
            diff.renamed.len()
        );
        self.server.emit(SyncEvent::DifferencesSent {
            connection: self.id,
            requested,
            pushed: pushed_count,
        });
        Ok(())
    }

    /// Ingest uploaded files and broadcast what the policy keeps.
    async fn handle_client_files(&self, envelope: Envelope) -> Result<()> {
        let received = envelope.blobs.len();
        let outcome = self
            .server
            .policy()
            .ingest(self.server.store(), envelope.blobs)
            .await;

        self.server
            .metrics()
            .files_received
            .fetch_add(outcome.stored.len() as u64, Ordering::Relaxed);
        for (name, reason) in outcome.dropped {
            self.server.emit(SyncEvent::FileDropped { name, reason });
        }
        tracing::info!(
            "{} uploaded {} file(s): {} stored, {} failed",
            self.id,
            received,
            outcome.stored.len(),
            outcome.failed
        );

        if outcome.broadcast.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = outcome.broadcast.iter().map(|b| b.name.clone()).collect();
        let exclude = (!self.server.config().sync.broadcast_to_origin).then_some(self.id);
        let broadcast = Envelope::new(PacketType::ClientFiles, outcome.broadcast)
            .retag(PacketType::Broadcast);
        let recipients = self.server.broadcast(&broadcast, exclude).await?;

        self.server
            .emit(SyncEvent::FilesBroadcast { names, recipients });
        Ok(())
    }
}

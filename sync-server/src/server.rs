//! Main SyncServer coordination.
//!
//! SyncServer owns the server directory, the active ingest policy and the
//! connection registry, and routes envelopes between connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use sync_core::SyncEvent;
use sync_store::FileStore;
use sync_types::{ConnectionId, Envelope, Frame, PacketType};
use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::error::{LinkError, Result, ServerError};
use crate::lock::InstanceLock;
use crate::policy::{policy_for, IngestPolicy};
use crate::session::Session;
use crate::transport::{IncomingConnection, Listener, PeerLink};

/// Capacity of the status event channel.
const EVENT_CAPACITY: usize = 256;

/// Operational metrics for monitoring server activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Total connections accepted.
    pub connections_total: AtomicU64,
    /// Total envelopes decoded.
    pub envelopes_received: AtomicU64,
    /// Total files ingested from clients.
    pub files_received: AtomicU64,
    /// Total files pushed to clients (replies and broadcasts).
    pub files_sent: AtomicU64,
    /// Total broadcasts sent.
    pub broadcasts_total: AtomicU64,
    /// Total handler errors.
    pub errors_total: AtomicU64,
}

/// Point-in-time copy of [`ServerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Total connections accepted.
    pub connections_total: u64,
    /// Connections currently registered.
    pub connections_active: u64,
    /// Total envelopes decoded.
    pub envelopes_received: u64,
    /// Total files ingested from clients.
    pub files_received: u64,
    /// Total files pushed to clients.
    pub files_sent: u64,
    /// Total broadcasts sent.
    pub broadcasts_total: u64,
    /// Total handler errors.
    pub errors_total: u64,
}

/// Registry entry for one live connection.
#[derive(Clone)]
struct ConnectionEntry {
    link: Arc<dyn PeerLink>,
    /// Serializes envelope handling for this connection.
    gate: Arc<Mutex<()>>,
    remote: String,
}

/// Main sync server.
pub struct SyncServer {
    config: Config,
    store: FileStore,
    policy: Box<dyn IngestPolicy>,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    next_id: AtomicU64,
    metrics: ServerMetrics,
    events: broadcast::Sender<SyncEvent>,
    _lock: Option<InstanceLock>,
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("config", &self.config)
            .field("policy", &self.policy.kind())
            .field("metrics", &self.metrics)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl SyncServer {
    /// Start a server: take the instance lock, then prepare the directory.
    ///
    /// Fails with [`ServerError::AlreadyRunning`] before touching the
    /// directory if another instance holds the lock.
    pub async fn start(config: Config) -> Result<Self> {
        let lock = InstanceLock::acquire(&config.server.lock_path)?;
        Self::build(config, Some(lock)).await
    }

    /// Create a server without the instance lock.
    pub async fn new(config: Config) -> Result<Self> {
        Self::build(config, None).await
    }

    async fn build(config: Config, lock: Option<InstanceLock>) -> Result<Self> {
        let store = FileStore::new(&config.server.directory)
            .with_unique_prefix(config.sync.unique_prefix);
        store.ensure_dir().await?;

        let policy = policy_for(config.sync.policy);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tracing::info!(
            directory = %config.server.directory.display(),
            policy = %config.sync.policy,
            "Sync server ready"
        );

        Ok(Self {
            config,
            store,
            policy,
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            metrics: ServerMetrics::default(),
            events,
            _lock: lock,
        })
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the server directory store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Get the active ingest policy.
    pub fn policy(&self) -> &dyn IngestPolicy {
        self.policy.as_ref()
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Snapshot the metrics.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let m = &self.metrics;
        MetricsSnapshot {
            connections_total: m.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections.len() as u64,
            envelopes_received: m.envelopes_received.load(Ordering::Relaxed),
            files_received: m.files_received.load(Ordering::Relaxed),
            files_sent: m.files_sent.load(Ordering::Relaxed),
            broadcasts_total: m.broadcasts_total.load(Ordering::Relaxed),
            errors_total: m.errors_total.load(Ordering::Relaxed),
        }
    }

    /// Subscribe to status events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ids of registered connections, ascending.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Register a connection and assign it the next id.
    ///
    /// Returns the id and the connection's processing gate.
    pub fn register(&self, link: Arc<dyn PeerLink>, remote: &str) -> (ConnectionId, Arc<Mutex<()>>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let gate = Arc::new(Mutex::new(()));
        self.connections.insert(
            id,
            ConnectionEntry {
                link,
                gate: gate.clone(),
                remote: remote.to_string(),
            },
        );
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);

        tracing::info!("Registered {} from {} (total: {})", id, remote, self.connections.len());
        self.emit(SyncEvent::ClientJoined { connection: id });
        (id, gate)
    }

    /// Remove a connection from the registry and close its link.
    pub async fn unregister(&self, id: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&id) else {
            return;
        };
        entry.link.close().await;

        tracing::info!(
            "Unregistered {} ({}) (remaining: {})",
            id,
            entry.remote,
            self.connections.len()
        );
        self.emit(SyncEvent::ClientLeft { connection: id });
    }

    /// Accept connections until the listener closes.
    ///
    /// Each connection runs on its own task.
    pub async fn serve<L: Listener>(self: Arc<Self>, mut listener: L) {
        while let Some(incoming) = listener.accept().await {
            let server = self.clone();
            tokio::spawn(async move {
                server.handle_connection(incoming).await;
            });
        }
        tracing::info!("Listener closed, no longer accepting connections");
    }

    /// Register `incoming` and process its envelopes until it disconnects.
    pub async fn handle_connection(self: Arc<Self>, incoming: IncomingConnection) {
        let IncomingConnection {
            link,
            inbound,
            remote,
        } = incoming;
        let (id, gate) = self.register(link, &remote);

        Session::new(self.clone(), id, gate, inbound).run().await;

        self.unregister(id).await;
    }

    fn frame_for(&self, envelope: &Envelope) -> Result<Frame> {
        Ok(Frame::new(self.config.sync.channel.clone(), envelope.to_bytes()?))
    }

    /// Send an envelope to one connection.
    pub async fn send_to(&self, id: ConnectionId, envelope: &Envelope) -> Result<()> {
        let link = self
            .connections
            .get(&id)
            .map(|e| e.link.clone())
            .ok_or(ServerError::UnknownConnection(id))?;
        let frame = self.frame_for(envelope)?;
        self.send_link(link.as_ref(), &frame).await?;
        self.metrics
            .files_sent
            .fetch_add(envelope.data_blobs().len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Send an envelope to every connection, optionally skipping one.
    ///
    /// Returns how many connections it reached. A failing peer is logged
    /// and skipped.
    pub async fn broadcast(&self, envelope: &Envelope, exclude: Option<ConnectionId>) -> Result<usize> {
        let frame = self.frame_for(envelope)?;

        // Collect first so no registry guard is held across an await
        let targets: Vec<(ConnectionId, Arc<dyn PeerLink>)> = self
            .connections
            .iter()
            .filter(|e| Some(*e.key()) != exclude)
            .map(|e| (*e.key(), e.value().link.clone()))
            .collect();

        let mut sent = 0;
        for (id, link) in &targets {
            match self.send_link(link.as_ref(), &frame).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!("Failed to deliver to {}: {}", id, e),
            }
        }

        let files = envelope.data_blobs().len() as u64;
        self.metrics.broadcasts_total.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .files_sent
            .fetch_add(files * sent as u64, Ordering::Relaxed);

        tracing::debug!(
            "Broadcast {} file(s) to {}/{} connections",
            files,
            sent,
            targets.len()
        );
        Ok(sent)
    }

    /// Send one frame, giving up after the configured write timeout.
    ///
    /// A timed out link may hold a partial frame, so it is closed.
    async fn send_link(
        &self,
        link: &dyn PeerLink,
        frame: &Frame,
    ) -> std::result::Result<(), LinkError> {
        let limit = self.config.limits.write_timeout();
        match tokio::time::timeout(limit, link.send(frame)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(remote = link.remote(), ?limit, "Send timed out, closing link");
                link.close().await;
                Err(LinkError::TimedOut)
            }
        }
    }

    /// Push named files from the server directory to every client.
    ///
    /// Missing or unreadable files are skipped; nothing is sent when none
    /// can be read. Returns how many connections were reached.
    pub async fn broadcast_files<S: AsRef<str>>(&self, names: &[S]) -> Result<usize> {
        let blobs = self.store.read_blobs(names).await;
        if blobs.is_empty() {
            return Ok(0);
        }

        let names: Vec<String> = blobs.iter().map(|b| b.name.clone()).collect();
        let envelope = Envelope::new(PacketType::Broadcast, blobs);
        let recipients = self.broadcast(&envelope, None).await?;

        tracing::info!(files = names.len(), recipients, "Broadcast new files");
        self.emit(SyncEvent::FilesBroadcast { names, recipients });
        Ok(recipients)
    }
}

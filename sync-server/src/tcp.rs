//! TCP listener using the length-prefixed frame codec.
//!
//! Each accepted stream is split: a reader task decodes frames into the
//! connection's inbound channel, and the write half becomes the peer link.
//! A framing error (oversized or malformed frame) ends the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use sync_types::{read_frame, write_frame, Frame};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

use crate::error::LinkError;
use crate::server::SyncServer;
use crate::transport::{IncomingConnection, Listener, PeerLink};

/// Frames buffered between the reader task and the session.
const INBOUND_BUFFER: usize = 64;

/// Listener accepting framed TCP connections.
pub struct TcpFrameListener {
    listener: TcpListener,
    max_frame_size: usize,
}

impl TcpFrameListener {
    /// Bind to `addr`.
    pub async fn bind(addr: &str, max_frame_size: usize) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            max_frame_size,
        })
    }

    /// Bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Listener for TcpFrameListener {
    async fn accept(&mut self) -> Option<IncomingConnection> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("set_nodelay failed for {}: {}", addr, e);
            }

            let remote = addr.to_string();
            let (mut read, write) = stream.into_split();
            let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
            let max = self.max_frame_size;
            let peer = remote.clone();

            tokio::spawn(async move {
                loop {
                    match read_frame(&mut read, max).await {
                        Ok(Some(frame)) => {
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!("Dropping connection {}: {}", peer, e);
                            break;
                        }
                    }
                }
            });

            let link = TcpLink {
                writer: Mutex::new(Some(write)),
                remote: remote.clone(),
            };
            return Some(IncomingConnection {
                link: Arc::new(link),
                inbound: rx,
                remote,
            });
        }
    }
}

/// Bind the configured address and serve until the listener fails.
pub async fn serve_tcp(server: Arc<SyncServer>) -> std::io::Result<()> {
    let config = server.config();
    let listener =
        TcpFrameListener::bind(&config.server.bind_address, config.limits.max_message_size).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    server.serve(listener).await;
    Ok(())
}

struct TcpLink {
    writer: Mutex<Option<OwnedWriteHalf>>,
    remote: String,
}

#[async_trait]
impl PeerLink for TcpLink {
    async fn send(&self, frame: &Frame) -> Result<(), LinkError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::Closed)?;
        write_frame(writer, frame)
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

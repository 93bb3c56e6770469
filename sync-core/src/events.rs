//! Status events published to observers.
//!
//! Both the client and the server emit these on a
//! `tokio::sync::broadcast` channel. Nothing in the sync path waits on an
//! observer; a lagging or absent subscriber only misses events.

use sync_types::ConnectionId;

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Transport connection established.
    Connected,
    /// Connection attempt failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Transport connection closed.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// Server accepted and registered a connection.
    ClientJoined {
        /// Registry id of the new connection.
        connection: ConnectionId,
    },
    /// Server removed a connection from its registry.
    ClientLeft {
        /// Registry id of the closed connection.
        connection: ConnectionId,
    },
    /// A diff was computed and the `Differences` reply sent.
    DifferencesSent {
        /// Connection the reply went to.
        connection: ConnectionId,
        /// Files requested from the client.
        requested: usize,
        /// Files pushed to the client.
        pushed: usize,
    },
    /// Files were written to the local directory.
    FilesWritten {
        /// Stored names.
        names: Vec<String>,
    },
    /// Files were uploaded to the server.
    FilesUploaded {
        /// Uploaded names.
        names: Vec<String>,
    },
    /// A `Broadcast` went out.
    FilesBroadcast {
        /// Broadcast names.
        names: Vec<String>,
        /// Connections it reached.
        recipients: usize,
    },
    /// An incoming file lost against a known version.
    FileDropped {
        /// Incoming name.
        name: String,
        /// Why it was dropped.
        reason: String,
    },
    /// A handler failed; the connection stays up.
    Error {
        /// Error message.
        message: String,
    },
}

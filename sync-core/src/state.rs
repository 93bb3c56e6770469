//! Client reconciliation state machine for dirsync.
//!
//! This module provides a pure, side-effect-free state machine for a
//! client's lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (connecting, writing files, sending envelopes) is
//! performed by sync-client, not by this module.
//!
//! There is no reconnect state: a failed connect returns to
//! `Disconnected` and reports the cause. Retrying is up to the caller.

use crate::SyncEvent;

/// Client state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Not connected to a server.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and idle.
    Connected,
    /// Metadata sent, waiting for the server's differences.
    AwaitingDifferences,
    /// Writing received files and uploading the requested ones.
    Reconciling,
}

impl ClientState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting, vec![Action::Connect])
            }

            (Self::Connecting, Event::ConnectSucceeded) => (
                Self::AwaitingDifferences,
                vec![
                    Action::EmitEvent(SyncEvent::Connected),
                    Action::SendMetadata,
                ],
            ),
            (Self::Connecting, Event::ConnectFailed { error }) => (
                Self::Disconnected,
                vec![Action::EmitEvent(SyncEvent::ConnectionFailed { error })],
            ),

            (Self::Connected, Event::SyncRequested) => {
                (Self::AwaitingDifferences, vec![Action::SendMetadata])
            }

            // A Differences reply is accepted in any connected state; the
            // server answers every Metadata, including late ones.
            (
                Self::Connected | Self::AwaitingDifferences | Self::Reconciling,
                Event::DifferencesReceived,
            ) => (
                Self::Reconciling,
                vec![Action::WriteFiles, Action::SendRequestedFiles],
            ),
            (Self::Reconciling, Event::UploadSent) => (Self::Connected, vec![]),

            (
                state @ (Self::Connected | Self::AwaitingDifferences | Self::Reconciling),
                Event::BroadcastReceived,
            ) => (state, vec![Action::WriteFiles]),

            (
                Self::Connected | Self::AwaitingDifferences | Self::Reconciling,
                Event::Disconnected { reason },
            ) => (
                Self::Disconnected,
                vec![Action::EmitEvent(SyncEvent::Disconnected { reason })],
            ),
            (
                Self::Connecting | Self::Connected | Self::AwaitingDifferences | Self::Reconciling,
                Event::DisconnectRequested,
            ) => (
                Self::Disconnected,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(SyncEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a transport connection is up.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::AwaitingDifferences | Self::Reconciling
        )
    }

    /// Check if an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingDifferences | Self::Reconciling)
    }
}

/// Events that can occur in the client lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User requested connection.
    ConnectRequested,
    /// Transport connection succeeded.
    ConnectSucceeded,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// User asked for another reconciliation pass.
    SyncRequested,
    /// A `Differences` envelope arrived.
    DifferencesReceived,
    /// The `ClientFiles` answer went out.
    UploadSent,
    /// A `Broadcast` envelope arrived.
    BroadcastReceived,
    /// Connection was lost.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// User requested disconnect.
    DisconnectRequested,
}

/// Actions to be executed by the sync-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the transport.
    Connect,
    /// Close the transport.
    Disconnect,
    /// Snapshot the directory and send a `Metadata` envelope.
    SendMetadata,
    /// Write the received file blobs.
    WriteFiles,
    /// Answer with a `ClientFiles` envelope.
    SendRequestedFiles,
    /// Emit an event to the application.
    EmitEvent(SyncEvent),
}

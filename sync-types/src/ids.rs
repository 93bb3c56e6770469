//! Identity types for dirsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned handle for one accepted connection.
///
/// Tokens are handed out from a monotonically increasing counter, so a
/// token is never reused within the lifetime of a server.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a ConnectionId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this ConnectionId.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// A per-exchange generation token.
///
/// Used to namespace files written during one reconciliation so that a
/// repeated sync never overwrites a file another exchange is still using.
/// UUID v4 format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(uuid::Uuid);

impl SessionToken {
    /// Create a new random token.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Prefix a file name with this token.
    pub fn prefix(&self, name: &str) -> String {
        format!("{}_{}", self.0.simple(), name)
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", &self.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_ordering() {
        let c1 = ConnectionId::new(1);
        let c2 = ConnectionId::new(2);
        assert!(c1 < c2);
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "client-7");
        assert_eq!(format!("{:?}", ConnectionId::new(7)), "ConnectionId(7)");
    }

    #[test]
    fn session_token_is_uuid_v4() {
        let token = SessionToken::new();
        assert_eq!(token.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn session_tokens_differ() {
        assert_ne!(SessionToken::new(), SessionToken::new());
    }

    #[test]
    fn session_token_prefixes_name() {
        let token = SessionToken::new();
        let prefixed = token.prefix("report.txt");
        assert!(prefixed.ends_with("_report.txt"));
        assert_eq!(prefixed.len(), 32 + 1 + "report.txt".len());
    }
}

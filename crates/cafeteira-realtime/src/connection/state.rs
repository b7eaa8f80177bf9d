//! Connection lifecycle states.

use std::fmt;

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket and no reconnect pending.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open; frames flow both ways.
    Open,
    /// Socket lost; a reconnect is scheduled.
    Reconnecting,
}

impl ConnectionState {
    /// Whether outbound frames can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a socket exists or is about to.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// A lifecycle transition, published by the connection task at the point
/// it happens.
///
/// The state watch only holds the latest value, so transitions that happen
/// back to back (a refused handshake goes Connecting then Reconnecting
/// within one poll) are only visible here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket opened.
    Opened,
    /// An open socket closed abnormally; a reconnect is scheduled.
    Lost,
    /// A connect attempt failed; a reconnect is scheduled.
    OpenFailed,
    /// The socket closed and no reconnect is pending.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Connection lifecycle states.

use serde::Serialize;

/// Where the connection manager currently is in its lifecycle.
///
/// `Idle → Connecting → Authenticating → Subscribing → Streaming`, with any
/// failure dropping to `Disconnected` and a stop passing through `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Closing,
    Disconnected,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 7] = [
        ConnectionState::Idle,
        ConnectionState::Connecting,
        ConnectionState::Authenticating,
        ConnectionState::Subscribing,
        ConnectionState::Streaming,
        ConnectionState::Closing,
        ConnectionState::Disconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Closing => "closing",
            ConnectionState::Disconnected => "disconnected",
        }
    }

    pub(crate) fn labels() -> [&'static str; 7] {
        Self::ALL.map(|s| s.as_str())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Error types for the trade-update stream.

use thiserror::Error;

/// Transport-level failures. Always recoverable: the connection manager
/// discards the connection and reconnects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("connection closed by remote: {0}")]
    Closed(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

/// Errors produced by the stream components.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server did not acknowledge the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Undecodable payload or missing required fields.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Rejected at registration time, before the loop sees the handler.
    #[error("invalid handler: {0}")]
    InvalidHandler(String),

    /// The connection loop has exited and can no longer take commands.
    #[error("connection loop is not running")]
    LoopClosed,
}

impl StreamError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::Transport(TransportError::Connect(_)) => "connect",
            StreamError::Transport(TransportError::Send(_)) => "send",
            StreamError::Transport(TransportError::Receive(_)) => "receive",
            StreamError::Transport(TransportError::Closed(_)) => "closed",
            StreamError::Transport(TransportError::Timeout(_)) => "timeout",
            StreamError::Authentication(_) => "authentication",
            StreamError::Malformed(_) => "malformed",
            StreamError::InvalidHandler(_) => "invalid_handler",
            StreamError::LoopClosed => "loop_closed",
        }
    }
}

use std::time::Duration;

use thiserror::Error;

/// Handshake invariant violations observed while establishing a
/// session.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("console requested login before assigning a session id")]
    MissingSession,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid console address '{0}'")]
    InvalidAddress(String),
    #[error("failed to open console socket: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("handshake did not complete within {0:?}")]
    Timeout(Duration),
    #[error("console rejected the login credentials")]
    LoginRejected,
    #[error("connection closed before the handshake completed")]
    ClosedDuringHandshake,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("client is already connected or connecting")]
    AlreadyConnected,
}

/// Caller-supplied arguments outside the ranges the console accepts.
/// Always checked before anything touches the socket.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("executor number must be 1 or greater, got {0}")]
    ExecutorNumber(u32),
    #[error("fader position {0} is outside 0.0..=1.0")]
    Position(f64),
    #[error("executor group start index must be 1 or greater")]
    GroupStartIndex,
    #[error("executor group count must be greater than zero")]
    GroupCount,
}

/// Send or receive failure on an established socket.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("console socket is closed")]
    Closed,
    #[error("websocket send failed: {0}")]
    Send(String),
}

/// Failure of an outbound set/command operation.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("no active console session")]
    NotConnected,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

use thiserror::Error;

/// An inbound text frame that could not be parsed as a console message.
/// Whether this is fatal is the session client's call; a single bad
/// frame usually is not.
#[derive(Debug, Error)]
#[error("malformed console frame: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

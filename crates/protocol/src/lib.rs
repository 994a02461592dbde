pub mod domain;
pub mod error;
pub mod wire;

pub use domain::{ExecutorGroup, ExecutorId, ExecutorKind, ExecutorSnapshot, SessionId};
pub use error::DecodeError;
pub use wire::{decode, encode, ClientMessage, ServerMessage};

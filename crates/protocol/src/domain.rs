use std::fmt;

use serde::{Deserialize, Serialize};

/// Console-facing executor number, 1-based. The wire protocol carries a
/// 0-based `iExec` instead; the two conversions live here so no other
/// module has to remember the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutorId(pub u32);

impl ExecutorId {
    pub fn from_wire(i_exec: u32) -> Self {
        Self(i_exec + 1)
    }

    pub fn to_wire(self) -> u32 {
        self.0.saturating_sub(1)
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    Fader,
    Button,
}

impl ExecutorKind {
    /// `itemsType` value used by the console for this kind.
    pub fn wire_type(self) -> u8 {
        match self {
            ExecutorKind::Fader => 2,
            ExecutorKind::Button => 3,
        }
    }

    pub fn from_wire_type(value: i64) -> Option<Self> {
        match value {
            2 => Some(ExecutorKind::Fader),
            3 => Some(ExecutorKind::Button),
            _ => None,
        }
    }
}

/// State of one executor as reported by a single playback response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorSnapshot {
    pub id: ExecutorId,
    pub kind: ExecutorKind,
    pub active: bool,
    /// Normalized to [0, 1]; meaningful for faders only, 0 for buttons.
    pub position: f64,
}

/// One page of executors polled on every playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorGroup {
    /// 1-based index of the first executor in the page.
    pub start_index: u32,
    pub count: u32,
    pub kind: ExecutorKind,
}

/// Server-assigned correlation token, required on every message after
/// the initial handshake. Consoles have been seen issuing both numbers
/// and strings, so the value is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub serde_json::Value);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_id_offsets_wire_ids_by_one() {
        assert_eq!(ExecutorId::from_wire(0), ExecutorId(1));
        assert_eq!(ExecutorId::from_wire(7), ExecutorId(8));
        assert_eq!(ExecutorId(1).to_wire(), 0);
    }

    #[test]
    fn executor_kind_wire_values() {
        assert_eq!(ExecutorKind::Fader.wire_type(), 2);
        assert_eq!(ExecutorKind::Button.wire_type(), 3);
        assert_eq!(ExecutorKind::from_wire_type(2), Some(ExecutorKind::Fader));
        assert_eq!(ExecutorKind::from_wire_type(3), Some(ExecutorKind::Button));
        assert_eq!(ExecutorKind::from_wire_type(4), None);
    }
}

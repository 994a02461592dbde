//! Last-known executor state and the diffing that turns raw playback
//! snapshots into discrete change events.

use std::collections::HashMap;

use dot2_protocol::{wire::ItemGroup, ExecutorId, ExecutorKind, ExecutorSnapshot};

/// A fader moved or switched between active and inactive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaderChange {
    pub id: ExecutorId,
    pub active: bool,
    pub position: f64,
}

/// A button switched between active and inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonChange {
    pub id: ExecutorId,
    pub active: bool,
}

/// Discrete state change derived from two consecutive playback
/// snapshots of the same executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutorChange {
    Fader(FaderChange),
    Button(ButtonChange),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FaderState {
    position: f64,
    active: bool,
}

/// Last emitted state per executor id. Faders and buttons live in
/// independent maps: the console numbers the two kinds separately, so
/// a fader and a button may share an id.
#[derive(Debug, Default)]
pub(crate) struct ExecutorStateStore {
    faders: HashMap<ExecutorId, FaderState>,
    buttons: HashMap<ExecutorId, bool>,
}

impl ExecutorStateStore {
    /// Diffs a full playback response against the stored state,
    /// returning one change per executor that differs. Groups of an
    /// unregistered `itemsType` and items without an `iExec` are
    /// skipped.
    pub fn apply_playbacks(&mut self, groups: &[ItemGroup]) -> Vec<ExecutorChange> {
        let mut changes = Vec::new();
        for group in groups {
            let Some(kind) = ExecutorKind::from_wire_type(group.items_type) else {
                continue;
            };
            for page in &group.items {
                for item in page {
                    let Some(i_exec) = item.i_exec else {
                        continue;
                    };
                    let snapshot = ExecutorSnapshot {
                        id: ExecutorId::from_wire(i_exec),
                        kind,
                        active: item.is_run == 1,
                        position: match kind {
                            ExecutorKind::Fader => item.fader_value(),
                            ExecutorKind::Button => 0.0,
                        },
                    };
                    if let Some(change) = self.apply_snapshot(&snapshot) {
                        changes.push(change);
                    }
                }
            }
        }
        changes
    }

    /// Faders compare the full (position, active) tuple; buttons only
    /// track `active`.
    fn apply_snapshot(&mut self, snapshot: &ExecutorSnapshot) -> Option<ExecutorChange> {
        match snapshot.kind {
            ExecutorKind::Fader => {
                let next = FaderState {
                    position: snapshot.position,
                    active: snapshot.active,
                };
                if self.faders.get(&snapshot.id) == Some(&next) {
                    return None;
                }
                self.faders.insert(snapshot.id, next);
                Some(ExecutorChange::Fader(FaderChange {
                    id: snapshot.id,
                    active: next.active,
                    position: next.position,
                }))
            }
            ExecutorKind::Button => {
                if self.buttons.get(&snapshot.id) == Some(&snapshot.active) {
                    return None;
                }
                self.buttons.insert(snapshot.id, snapshot.active);
                Some(ExecutorChange::Button(ButtonChange {
                    id: snapshot.id,
                    active: snapshot.active,
                }))
            }
        }
    }

    pub fn clear(&mut self) {
        self.faders.clear();
        self.buttons.clear();
    }
}

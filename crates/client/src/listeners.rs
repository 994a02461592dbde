use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use tracing::warn;

/// Token returned by listener registration. Closures cannot be
/// compared, so removal goes by handle instead of identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registered callbacks for one event kind, kept in registration
/// order.
pub(crate) struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> ListenerSet<T> {
    pub fn add(&mut self, callback: Callback<T>) -> ListenerHandle {
        self.next_id += 1;
        self.entries.push((self.next_id, callback));
        ListenerHandle(self.next_id)
    }

    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != handle.0);
        self.entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<Callback<T>> {
        self.entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }
}

/// Invokes every callback; a panicking listener is logged and skipped
/// so it cannot starve the ones registered after it.
pub(crate) fn notify<T>(callbacks: &[Callback<T>], event: &T) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            warn!("playback: executor listener panicked, continuing with remaining listeners");
        }
    }
}

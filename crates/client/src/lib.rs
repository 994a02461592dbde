//! Remote-control client for dot2 lighting consoles.
//!
//! [`Dot2Client`] speaks the console's JSON-over-websocket protocol and
//! exposes executors (faders and buttons) as a normalized abstraction:
//! inbound playback snapshots are diffed into discrete change events
//! delivered to registered listeners, and outbound set/command calls
//! are turned into console command strings.

use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::debug;

use dot2_protocol::ClientMessage;

pub mod error;
mod listeners;
mod session;
mod store;

pub use dot2_protocol::{
    self as protocol, ExecutorGroup, ExecutorId, ExecutorKind, ExecutorSnapshot, SessionId,
};
pub use error::{CommandError, ConnectError, ProtocolError, TransportError, ValidationError};
pub use listeners::ListenerHandle;
pub use session::ConnectionState;
pub use store::{ButtonChange, ExecutorChange, FaderChange};

use listeners::ListenerSet;
use session::{SessionState, TeardownSource, WsSink};
use store::ExecutorStateStore;

/// Tunables of one client instance. The defaults match observed console
/// behavior; tests shorten both.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Upper bound on the whole handshake, from socket open to a
    /// successful login response.
    pub handshake_timeout: Duration,
    /// Fixed interval between keep-alive frames while connected.
    pub keepalive_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: session::DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: session::DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) session: Mutex<SessionState>,
    pub(crate) sink: Mutex<Option<WsSink>>,
    pub(crate) store: Mutex<ExecutorStateStore>,
    pub(crate) groups: Mutex<Vec<ExecutorGroup>>,
    fader_listeners: Mutex<ListenerSet<FaderChange>>,
    button_listeners: Mutex<ListenerSet<ButtonChange>>,
}

impl ClientInner {
    pub(crate) async fn dispatch(&self, changes: &[ExecutorChange]) {
        if changes.is_empty() {
            return;
        }
        let faders = self.fader_listeners.lock().await.snapshot();
        let buttons = self.button_listeners.lock().await.snapshot();
        for change in changes {
            match change {
                ExecutorChange::Fader(event) => listeners::notify(&faders, event),
                ExecutorChange::Button(event) => listeners::notify(&buttons, event),
            }
        }
    }
}

/// Handle to one console connection. Cheap to clone via the inner
/// `Arc`; all operations take `&self`.
pub struct Dot2Client {
    inner: Arc<ClientInner>,
}

impl Dot2Client {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                session: Mutex::new(SessionState::default()),
                sink: Mutex::new(None),
                store: Mutex::new(ExecutorStateStore::default()),
                groups: Mutex::new(Vec::new()),
                fader_listeners: Mutex::new(ListenerSet::default()),
                button_listeners: Mutex::new(ListenerSet::default()),
            }),
        }
    }

    /// Connects to a console at `host[:port]` and completes the
    /// handshake/login sequence before returning. The password is
    /// hashed once and kept only as its digest.
    pub async fn connect(&self, address: &str, password: &str) -> Result<(), ConnectError> {
        self.inner.connect(address, password).await
    }

    /// Tears the connection down: cancels the background tasks, sends a
    /// best-effort close notification, closes the socket and clears all
    /// executor state. Safe to call any number of times.
    pub async fn disconnect(&self) {
        self.inner.teardown(TeardownSource::Caller).await;
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.session.lock().await.conn == ConnectionState::Connected
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.session.lock().await.session_id.clone()
    }

    /// Replaces the polling configuration atomically; takes effect on
    /// the next playback request.
    pub async fn set_executor_groups(
        &self,
        groups: Vec<ExecutorGroup>,
    ) -> Result<(), ValidationError> {
        for group in &groups {
            if group.start_index < 1 {
                return Err(ValidationError::GroupStartIndex);
            }
            if group.count == 0 {
                return Err(ValidationError::GroupCount);
            }
        }
        *self.inner.groups.lock().await = groups;
        Ok(())
    }

    /// Moves a fader to a normalized position in [0, 1].
    pub async fn set_fader(&self, executor: ExecutorId, position: f64) -> Result<(), CommandError> {
        if executor.0 < 1 {
            return Err(ValidationError::ExecutorNumber(executor.0).into());
        }
        if !(0.0..=1.0).contains(&position) {
            return Err(ValidationError::Position(position).into());
        }
        self.send_command(&format!("Executor {executor} At {}", position * 100.0))
            .await
    }

    pub async fn set_button(&self, executor: ExecutorId, active: bool) -> Result<(), CommandError> {
        if executor.0 < 1 {
            return Err(ValidationError::ExecutorNumber(executor.0).into());
        }
        let verb = if active { "On" } else { "Off" };
        self.send_command(&format!("{verb} Executor {executor}")).await
    }

    /// Sends a raw console command string under the active session.
    pub async fn send_command(&self, command: &str) -> Result<(), CommandError> {
        let session_id = {
            let session = self.inner.session.lock().await;
            if session.conn != ConnectionState::Connected {
                return Err(CommandError::NotConnected);
            }
            session.session_id.clone()
        };
        let Some(session_id) = session_id else {
            return Err(CommandError::NotConnected);
        };
        debug!(command, "command: sending");
        self.inner
            .send(&ClientMessage::command(command, session_id))
            .await?;
        Ok(())
    }

    pub async fn add_fader_listener(
        &self,
        listener: impl Fn(&FaderChange) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner
            .fader_listeners
            .lock()
            .await
            .add(Arc::new(listener))
    }

    pub async fn remove_fader_listener(&self, handle: ListenerHandle) -> bool {
        self.inner.fader_listeners.lock().await.remove(handle)
    }

    pub async fn add_button_listener(
        &self,
        listener: impl Fn(&ButtonChange) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.inner
            .button_listeners
            .lock()
            .await
            .add(Arc::new(listener))
    }

    pub async fn remove_button_listener(&self, handle: ListenerHandle) -> bool {
        self.inner.button_listeners.lock().await.remove(handle)
    }
}

impl Default for Dot2Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;

//! Socket ownership, the handshake/login state machine, keep-alive and
//! the server-driven playback cycle.
//!
//! Two background tasks run per connection: the message-receive task
//! (sole reader of the socket) and the keep-alive task. Outbound
//! writes from any task are serialized through the single sink mutex.

use std::{
    fmt::Write as _,
    ops::ControlFlow,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use md5::{Digest, Md5};
use tokio::{net::TcpStream, task::JoinHandle, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

use dot2_protocol::{wire, ClientMessage, ServerMessage, SessionId};

use crate::{
    error::{ConnectError, ProtocolError, TransportError},
    ClientInner,
};

pub(crate) type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Connection lifecycle of a client. At most one live socket exists per
/// client instance; the session id is only populated from `LoggingIn`
/// onward and cleared on every teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingHandshake,
    LoggingIn,
    Connected,
    Closing,
}

/// Which control flow initiated a teardown. A task driving its own
/// teardown returns right after, so it must not be aborted mid-cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TeardownSource {
    Caller,
    ReceiveTask,
    KeepAliveTask,
}

#[derive(Debug, Clone)]
pub(crate) enum HandshakeFailure {
    LoginRejected,
    Protocol(ProtocolError),
}

pub(crate) struct SessionState {
    pub(crate) conn: ConnectionState,
    pub(crate) session_id: Option<SessionId>,
    password_hash: Zeroizing<String>,
    handshake_failure: Option<HandshakeFailure>,
    recv_task: Option<JoinHandle<()>>,
    keepalive_task: Option<JoinHandle<()>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            conn: ConnectionState::Disconnected,
            session_id: None,
            password_hash: Zeroizing::new(String::new()),
            handshake_failure: None,
            recv_task: None,
            keepalive_task: None,
        }
    }
}

fn console_url(address: &str) -> Result<Url, ConnectError> {
    Url::parse(&format!("ws://{address}/?ma=1"))
        .map_err(|_| ConnectError::InvalidAddress(address.to_string()))
}

/// The console authenticates against the MD5 hex digest of the
/// password; the clear text is never retained.
fn md5_hex(password: &str) -> Zeroizing<String> {
    let digest = Md5::digest(password.as_bytes());
    let mut hex = Zeroizing::new(String::with_capacity(digest.len() * 2));
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

impl ClientInner {
    /// Opens the socket and drives the handshake to completion,
    /// bounded by the configured timeout. On any failure the client is
    /// left fully disconnected.
    pub(crate) async fn connect(
        self: &Arc<Self>,
        address: &str,
        password: &str,
    ) -> Result<(), ConnectError> {
        let url = console_url(address)?;
        {
            let mut session = self.session.lock().await;
            if session.conn != ConnectionState::Disconnected {
                return Err(ConnectError::AlreadyConnected);
            }
            session.conn = ConnectionState::Connecting;
            session.handshake_failure = None;
            session.password_hash = md5_hex(password);
        }

        info!(address, "session: connecting");
        let socket = match connect_async(url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(err) => {
                self.session.lock().await.conn = ConnectionState::Disconnected;
                return Err(ConnectError::Transport(err));
            }
        };

        let (mut ws_sink, ws_stream) = socket.split();
        {
            let mut session = self.session.lock().await;
            // a disconnect may have raced the dial; honor it instead of
            // resurrecting the session
            if session.conn != ConnectionState::Connecting {
                drop(session);
                let _ = ws_sink.close().await;
                return Err(ConnectError::ClosedDuringHandshake);
            }
            *self.sink.lock().await = Some(ws_sink);
            session.conn = ConnectionState::AwaitingHandshake;
            let client = Arc::clone(self);
            session.recv_task = Some(tokio::spawn(async move {
                client.receive_loop(ws_stream).await;
            }));
        }

        self.await_handshake().await
    }

    /// Waits for the receive task to reach `Connected`, polling at a
    /// fixed granularity.
    async fn await_handshake(&self) -> Result<(), ConnectError> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        loop {
            {
                let session = self.session.lock().await;
                match session.conn {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected | ConnectionState::Closing => {
                        return Err(match session.handshake_failure.clone() {
                            Some(HandshakeFailure::LoginRejected) => ConnectError::LoginRejected,
                            Some(HandshakeFailure::Protocol(err)) => ConnectError::Protocol(err),
                            None => ConnectError::ClosedDuringHandshake,
                        });
                    }
                    _ => {}
                }
            }
            if Instant::now() >= deadline {
                self.teardown(TeardownSource::Caller).await;
                return Err(ConnectError::Timeout(self.config.handshake_timeout));
            }
            sleep(HANDSHAKE_POLL_INTERVAL).await;
        }
    }

    /// Sole reader of the socket. Runs until the stream ends, a
    /// transport error surfaces, or a handshake step fails, then tears
    /// the connection down.
    async fn receive_loop(self: Arc<Self>, mut stream: WsStream) {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match wire::decode(&text) {
                    Ok(message) => {
                        if self.handle_message(message).await.is_break() {
                            break;
                        }
                    }
                    // one bad frame is not a transport symptom
                    Err(err) => warn!("session: ignoring malformed frame: {err}"),
                },
                Ok(Message::Close(_)) => {
                    debug!("session: console closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("session: receive failed: {err}");
                    break;
                }
            }
        }
        self.teardown(TeardownSource::ReceiveTask).await;
    }

    /// A single inbound frame may carry several recognized fields; each
    /// is handled independently, in protocol order.
    async fn handle_message(self: &Arc<Self>, message: ServerMessage) -> ControlFlow<()> {
        if message.status.is_some() && message.app_type.is_some() {
            debug!("session: console announced itself, requesting a session");
            if self.send(&ClientMessage::session_bootstrap()).await.is_err() {
                return ControlFlow::Break(());
            }
        }

        if let Some(session_id) = message.session.clone() {
            self.session.lock().await.session_id = Some(session_id);
        }

        if message.force_login == Some(true) {
            if self.login().await.is_break() {
                return ControlFlow::Break(());
            }
        }

        match message.response_type.as_deref() {
            Some(wire::RESPONSE_TYPE_LOGIN) => self.handle_login_response(message.result).await,
            Some(wire::RESPONSE_TYPE_PLAYBACKS) => self.handle_playback_response(&message).await,
            _ => ControlFlow::Continue(()),
        }
    }

    async fn login(&self) -> ControlFlow<()> {
        let (password_hash, session_id) = {
            let mut session = self.session.lock().await;
            let Some(session_id) = session.session_id.clone() else {
                warn!("session: login demanded before a session id was assigned");
                session.handshake_failure =
                    Some(HandshakeFailure::Protocol(ProtocolError::MissingSession));
                return ControlFlow::Break(());
            };
            session.conn = ConnectionState::LoggingIn;
            (session.password_hash.clone(), session_id)
        };

        info!("session: logging in");
        let message = ClientMessage::login(password_hash.as_str(), session_id);
        if self.send(&message).await.is_err() {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    async fn handle_login_response(self: &Arc<Self>, result: Option<bool>) -> ControlFlow<()> {
        if result != Some(true) {
            warn!("session: login rejected by console");
            self.session.lock().await.handshake_failure = Some(HandshakeFailure::LoginRejected);
            return ControlFlow::Break(());
        }

        {
            let mut session = self.session.lock().await;
            if session.conn == ConnectionState::Connected {
                return ControlFlow::Continue(());
            }
            session.conn = ConnectionState::Connected;
            let client = Arc::clone(self);
            session.keepalive_task = Some(tokio::spawn(async move {
                client.keepalive_loop().await;
            }));
        }
        info!("session: login accepted, connected");

        // entering Connected kicks off the playback cycle
        if self.request_playbacks().await.is_err() {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    async fn handle_playback_response(self: &Arc<Self>, message: &ServerMessage) -> ControlFlow<()> {
        let groups = message.item_groups.as_deref().unwrap_or(&[]);
        let changes = self.store.lock().await.apply_playbacks(groups);
        if !changes.is_empty() {
            debug!(changes = changes.len(), "playback: executor state changed");
        }
        self.dispatch(&changes).await;

        // server-driven cadence: one new request per processed response
        if self.request_playbacks().await.is_err() {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    async fn request_playbacks(&self) -> Result<(), TransportError> {
        let Some(session_id) = self.session.lock().await.session_id.clone() else {
            return Err(TransportError::Closed);
        };
        let groups = self.groups.lock().await.clone();
        self.send(&ClientMessage::playback_request(&groups, session_id))
            .await
    }

    /// Fixed-interval liveness signal; a failed send means the
    /// connection is gone.
    async fn keepalive_loop(self: Arc<Self>) {
        loop {
            sleep(self.config.keepalive_interval).await;
            let session_id = {
                let session = self.session.lock().await;
                if session.conn != ConnectionState::Connected {
                    return;
                }
                session.session_id.clone()
            };
            let Some(session_id) = session_id else {
                return;
            };
            if let Err(err) = self.send(&ClientMessage::keep_alive(session_id)).await {
                warn!("session: keep-alive send failed, dropping connection: {err}");
                self.teardown(TeardownSource::KeepAliveTask).await;
                return;
            }
            debug!("session: keep-alive sent");
        }
    }

    /// Single serialized write path; every outbound frame from any task
    /// goes through here.
    pub(crate) async fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let frame = wire::encode(message);
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(TransportError::Closed);
        };
        sink.send(Message::Text(frame))
            .await
            .map_err(|err| TransportError::Send(err.to_string()))
    }

    /// Idempotent teardown. The first caller moves the state to
    /// `Closing` and owns the cleanup; everyone else returns
    /// immediately, so racing disconnect paths produce exactly one
    /// close notification and one socket close.
    pub(crate) async fn teardown(&self, source: TeardownSource) {
        let (session_id, recv_task, keepalive_task) = {
            let mut session = self.session.lock().await;
            if matches!(
                session.conn,
                ConnectionState::Disconnected | ConnectionState::Closing
            ) {
                return;
            }
            session.conn = ConnectionState::Closing;
            (
                session.session_id.take(),
                session.recv_task.take(),
                session.keepalive_task.take(),
            )
        };

        // best-effort close notification; local teardown proceeds
        // regardless of the outcome
        if let Some(session_id) = session_id {
            let _ = self.send(&ClientMessage::close(session_id)).await;
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }

        if source != TeardownSource::ReceiveTask {
            if let Some(task) = recv_task {
                task.abort();
            }
        }
        if source != TeardownSource::KeepAliveTask {
            if let Some(task) = keepalive_task {
                task.abort();
            }
        }

        self.store.lock().await.clear();
        self.session.lock().await.conn = ConnectionState::Disconnected;
        info!("session: disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex_matches_known_vector() {
        assert_eq!(md5_hex("password").as_str(), "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(md5_hex("").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn console_url_includes_remote_marker() {
        let url = console_url("192.168.0.2:8080").expect("url");
        assert_eq!(url.as_str(), "ws://192.168.0.2:8080/?ma=1");
        assert!(console_url("not a host").is_err());
    }
}

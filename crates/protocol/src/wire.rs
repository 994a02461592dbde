//! Request/response envelope of the console protocol: compact JSON text
//! frames over a persistent websocket. Encoding is exact down to field
//! names; decoding is purely syntactic, semantic checks belong to the
//! session client.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ExecutorGroup, ExecutorId, SessionId},
    error::DecodeError,
};

pub const RESPONSE_TYPE_LOGIN: &str = "login";
pub const RESPONSE_TYPE_PLAYBACKS: &str = "playbacks";

const LOGIN_USERNAME: &str = "remote";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Login,
    Playbacks,
    Command,
    Close,
}

/// Outbound console message. Constructed through the associated
/// functions below so the fixed fields always carry the values the
/// console expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// The `{"session":0}` frame announcing readiness and requesting a
    /// session.
    SessionBootstrap { session: u8 },
    Login {
        #[serde(rename = "requestType")]
        request_type: RequestType,
        username: String,
        password: String,
        session: SessionId,
    },
    Playbacks {
        #[serde(rename = "requestType")]
        request_type: RequestType,
        #[serde(rename = "startIndex")]
        start_index: Vec<u32>,
        #[serde(rename = "itemsCount")]
        items_count: Vec<u32>,
        #[serde(rename = "itemsType")]
        items_type: Vec<u8>,
        #[serde(rename = "pageIndex")]
        page_index: u32,
        view: u32,
        #[serde(rename = "execButtonViewMode")]
        exec_button_view_mode: u32,
        #[serde(rename = "buttonsViewMode")]
        buttons_view_mode: u32,
        session: SessionId,
        #[serde(rename = "maxRequests")]
        max_requests: u32,
    },
    Command {
        #[serde(rename = "requestType")]
        request_type: RequestType,
        command: String,
        session: SessionId,
    },
    KeepAlive { session: SessionId },
    Close {
        #[serde(rename = "requestType")]
        request_type: RequestType,
        session: SessionId,
    },
}

impl ClientMessage {
    pub fn session_bootstrap() -> Self {
        Self::SessionBootstrap { session: 0 }
    }

    pub fn login(password_hash: impl Into<String>, session: SessionId) -> Self {
        Self::Login {
            request_type: RequestType::Login,
            username: LOGIN_USERNAME.to_string(),
            password: password_hash.into(),
            session,
        }
    }

    /// Builds the polling request for the configured executor pages.
    /// Public 1-based start indexes become 0-based on the wire; an
    /// empty group list yields empty arrays, which the console treats
    /// as a no-op poll.
    pub fn playback_request(groups: &[ExecutorGroup], session: SessionId) -> Self {
        let mut start_index = Vec::with_capacity(groups.len());
        let mut items_count = Vec::with_capacity(groups.len());
        let mut items_type = Vec::with_capacity(groups.len());
        for group in groups {
            start_index.push(ExecutorId(group.start_index).to_wire());
            items_count.push(group.count);
            items_type.push(group.kind.wire_type());
        }
        Self::Playbacks {
            request_type: RequestType::Playbacks,
            start_index,
            items_count,
            items_type,
            page_index: 0,
            view: 2,
            exec_button_view_mode: 1,
            buttons_view_mode: 0,
            session,
            max_requests: 1,
        }
    }

    pub fn command(command: impl Into<String>, session: SessionId) -> Self {
        Self::Command {
            request_type: RequestType::Command,
            command: command.into(),
            session,
        }
    }

    pub fn keep_alive(session: SessionId) -> Self {
        Self::KeepAlive { session }
    }

    pub fn close(session: SessionId) -> Self {
        Self::Close {
            request_type: RequestType::Close,
            session,
        }
    }
}

/// One inbound text frame. The console freely combines fields in a
/// single frame (a session id may ride along with `forceLogin`, for
/// example), so every recognized field is optional and the session
/// client evaluates each independently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerMessage {
    pub status: Option<serde_json::Value>,
    pub app_type: Option<serde_json::Value>,
    pub session: Option<SessionId>,
    pub force_login: Option<bool>,
    pub response_type: Option<String>,
    pub result: Option<bool>,
    pub item_groups: Option<Vec<ItemGroup>>,
}

/// One page of playback items, tagged with the executor kind it was
/// requested as.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemGroup {
    pub items_type: i64,
    pub items: Vec<Vec<PlaybackItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackItem {
    pub i_exec: Option<u32>,
    pub is_run: i64,
    pub executor_blocks: Vec<ExecutorBlock>,
}

impl PlaybackItem {
    /// Fader level from the first block carrying one, 0 when absent.
    pub fn fader_value(&self) -> f64 {
        self.executor_blocks
            .iter()
            .find_map(|block| block.fader.as_ref())
            .map(|fader| fader.v)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutorBlock {
    pub fader: Option<FaderBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FaderBlock {
    pub v: f64,
}

/// Compact encoding, no extraneous whitespace.
pub fn encode(message: &ClientMessage) -> String {
    // serde_json only fails on non-string map keys, which these shapes
    // cannot contain
    serde_json::to_string(message).expect("client messages always serialize")
}

pub fn decode(frame: &str) -> Result<ServerMessage, DecodeError> {
    Ok(serde_json::from_str(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutorKind;
    use serde_json::json;

    fn session(value: serde_json::Value) -> SessionId {
        SessionId(value)
    }

    #[test]
    fn session_bootstrap_is_compact() {
        assert_eq!(encode(&ClientMessage::session_bootstrap()), r#"{"session":0}"#);
    }

    #[test]
    fn login_matches_console_shape() {
        let message = ClientMessage::login("abc123", session(json!("S1")));
        assert_eq!(
            encode(&message),
            r#"{"requestType":"login","username":"remote","password":"abc123","session":"S1"}"#
        );
    }

    #[test]
    fn command_keep_alive_and_close_shapes() {
        let command = ClientMessage::command("Executor 5 At 100", session(json!(9)));
        assert_eq!(
            encode(&command),
            r#"{"requestType":"command","command":"Executor 5 At 100","session":9}"#
        );
        assert_eq!(
            encode(&ClientMessage::keep_alive(session(json!(9)))),
            r#"{"session":9}"#
        );
        assert_eq!(
            encode(&ClientMessage::close(session(json!(9)))),
            r#"{"requestType":"close","session":9}"#
        );
    }

    #[test]
    fn playback_request_uses_zero_based_parallel_arrays() {
        let groups = [
            ExecutorGroup {
                start_index: 1,
                count: 8,
                kind: ExecutorKind::Fader,
            },
            ExecutorGroup {
                start_index: 101,
                count: 6,
                kind: ExecutorKind::Button,
            },
        ];
        let message = ClientMessage::playback_request(&groups, session(json!("S1")));
        let ClientMessage::Playbacks {
            start_index,
            items_count,
            items_type,
            page_index,
            view,
            exec_button_view_mode,
            buttons_view_mode,
            max_requests,
            ..
        } = &message
        else {
            panic!("expected a playbacks request");
        };
        assert_eq!(*start_index, vec![0, 100]);
        assert_eq!(*items_count, vec![8, 6]);
        assert_eq!(*items_type, vec![2, 3]);
        assert_eq!((*page_index, *view), (0, 2));
        assert_eq!((*exec_button_view_mode, *buttons_view_mode), (1, 0));
        assert_eq!(*max_requests, 1);
    }

    #[test]
    fn playback_request_without_groups_has_empty_arrays() {
        let message = ClientMessage::playback_request(&[], session(json!(1)));
        let encoded = encode(&message);
        assert!(encoded.contains(r#""startIndex":[]"#), "{encoded}");
        assert!(encoded.contains(r#""itemsCount":[]"#), "{encoded}");
        assert!(encoded.contains(r#""itemsType":[]"#), "{encoded}");
    }

    #[test]
    fn decode_reads_combined_handshake_fields() {
        let message = decode(r#"{"status":1,"appType":1,"session":5,"forceLogin":true}"#)
            .expect("decode");
        assert!(message.status.is_some());
        assert!(message.app_type.is_some());
        assert_eq!(message.session, Some(session(json!(5))));
        assert_eq!(message.force_login, Some(true));
        assert_eq!(message.response_type, None);
    }

    #[test]
    fn decode_reads_playback_items() {
        let frame = json!({
            "responseType": "playbacks",
            "itemGroups": [{
                "itemsType": 2,
                "items": [[
                    {"iExec": 0, "isRun": 1, "executorBlocks": [{"fader": {"v": 0.5}}]},
                    {"isRun": 1},
                    {"iExec": 3, "isRun": 0}
                ]]
            }]
        })
        .to_string();
        let message = decode(&frame).expect("decode");
        assert_eq!(message.response_type.as_deref(), Some(RESPONSE_TYPE_PLAYBACKS));
        let groups = message.item_groups.expect("item groups");
        assert_eq!(groups[0].items_type, 2);
        let items = &groups[0].items[0];
        assert_eq!(items[0].i_exec, Some(0));
        assert_eq!(items[0].fader_value(), 0.5);
        assert_eq!(items[1].i_exec, None);
        assert_eq!(items[2].fader_value(), 0.0);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(decode("not json").is_err());
        assert!(decode("").is_err());
    }
}

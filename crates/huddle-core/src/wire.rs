//! Wire frames exchanged with browser clients.
//!
//! Inbound frames are `{"type": "...", "value": "..."}` where `value` is an
//! opaque string (often JSON itself) interpreted only by the matched handler.
//! Outbound frames add the acting user: `{"type", "value", "userId"}`.

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Member};
use crate::ids::UserId;

/// Event type of the arena snapshot sent to a newly admitted connection.
pub const INIT: &str = "init";
/// Event type broadcast when a user joins.
pub const USER_JOINED: &str = "user_joined";
/// Event type broadcast when a user leaves.
pub const USER_LEFT: &str = "user_left";
/// Event type telling a gated connection to submit the join code.
pub const JOIN_CODE_REQUIRED: &str = "join_code_required";
/// Event type telling a gated connection its join code was wrong.
pub const JOIN_CODE_INCORRECT: &str = "join_code_incorrect";

/// Inbound client frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Event type name.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Opaque event value.
    #[serde(default)]
    pub value: String,
}

impl InboundFrame {
    /// Decode a text frame.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Outbound event envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketEvent {
    /// Event type name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event value, usually JSON-encoded state.
    pub value: String,
    /// User the event concerns (empty when not user-specific).
    pub user_id: String,
}

impl SocketEvent {
    /// Build an event with an explicit string value.
    pub fn new(event_type: impl Into<String>, value: impl Into<String>, user_id: &str) -> Self {
        Self {
            event_type: event_type.into(),
            value: value.into(),
            user_id: user_id.to_owned(),
        }
    }

    /// Build an event whose value is `payload` encoded as JSON text.
    pub fn with_json<T: Serialize + ?Sized>(
        event_type: impl Into<String>,
        payload: &T,
        user_id: &str,
    ) -> Self {
        let value = serde_json::to_string(payload).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode event value");
            String::new()
        });
        Self::new(event_type, value, user_id)
    }

    /// Full arena snapshot for a newly admitted connection.
    pub fn init(arena: &Arena, user_id: &UserId) -> Self {
        Self::with_json(INIT, arena, user_id)
    }

    /// Refreshed membership list after `user_id` joined.
    pub fn user_joined(members: &[Member], user_id: &UserId) -> Self {
        Self::with_json(USER_JOINED, members, user_id)
    }

    /// Refreshed membership list after `user_id` left.
    pub fn user_left(members: &[Member], user_id: &UserId) -> Self {
        Self::with_json(USER_LEFT, members, user_id)
    }

    /// Prompt a gated connection for the join code.
    pub fn join_code_required(user_id: &UserId) -> Self {
        Self::new(JOIN_CODE_REQUIRED, "", user_id)
    }

    /// Reject a join code submission.
    pub fn join_code_incorrect(user_id: &UserId) -> Self {
        Self::new(JOIN_CODE_INCORRECT, "", user_id)
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKind;
    use serde_json::Value;

    #[test]
    fn decode_inbound_frame() {
        let frame = InboundFrame::decode(r#"{"type":"auth_storyboard","value":"ABCD"}"#).unwrap();
        assert_eq!(frame.event_type, "auth_storyboard");
        assert_eq!(frame.value, "ABCD");
    }

    #[test]
    fn missing_value_defaults_to_empty() {
        let frame = InboundFrame::decode(r#"{"type":"concede_storyboard"}"#).unwrap();
        assert_eq!(frame.value, "");
    }

    #[test]
    fn non_string_value_is_malformed() {
        assert!(InboundFrame::decode(r#"{"type":"vote","value":5}"#).is_err());
        assert!(InboundFrame::decode("not json").is_err());
        assert!(InboundFrame::decode("[1,2]").is_err());
    }

    #[test]
    fn outbound_envelope_shape() {
        let event = SocketEvent::new("goal_added", "[]", "u1");
        let json: Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "goal_added");
        assert_eq!(json["value"], "[]");
        assert_eq!(json["userId"], "u1");
    }

    #[test]
    fn user_joined_carries_member_list() {
        let members = vec![
            Member {
                id: "u1".into(),
                name: "Ada".into(),
                active: true,
            },
            Member {
                id: "u2".into(),
                name: "Grace".into(),
                active: true,
            },
        ];
        let event = SocketEvent::user_joined(&members, &"u2".into());
        assert_eq!(event.event_type, USER_JOINED);
        assert_eq!(event.user_id, "u2");
        let decoded: Vec<Member> = serde_json::from_str(&event.value).unwrap();
        assert_eq!(decoded, members);
    }

    #[test]
    fn init_carries_arena_snapshot() {
        let arena = Arena {
            id: "a1".into(),
            kind: ArenaKind::Poker,
            name: "Planning".into(),
            join_code: String::new(),
            facilitators: vec![],
            users: vec![],
            detail: serde_json::Map::new(),
        };
        let event = SocketEvent::init(&arena, &"u1".into());
        assert_eq!(event.event_type, INIT);
        let decoded: Arena = serde_json::from_str(&event.value).unwrap();
        assert_eq!(decoded.id.as_str(), "a1");
    }

    #[test]
    fn gate_notices_have_empty_value() {
        let required = SocketEvent::join_code_required(&"u1".into());
        assert_eq!(required.event_type, JOIN_CODE_REQUIRED);
        assert!(required.value.is_empty());
        let incorrect = SocketEvent::join_code_incorrect(&"u1".into());
        assert_eq!(incorrect.event_type, JOIN_CODE_INCORRECT);
    }
}

use crate::models::messages::MessageKind;
use crate::models::notifications::NotificationType;
use uuid::Uuid;

/// Server-to-client envelopes. `message` goes to a room's subscribers;
/// `ack`, `error` and `notification` go to a single user's private channel.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type")]
pub enum WebSocketMessage {
    #[serde(rename = "message")]
    Message {
        message_id: i64,
        chatroom_id: Uuid,
        sender_id: Uuid,
        message_type: MessageKind,
        content: String,
        created_at: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "ack")]
    Ack {
        client_message_id: String,
        message_id: i64,
        status: String,
        created_at: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename = "notification")]
    Notification {
        notification_id: i64,
        notification_type: NotificationType,
        sender_id: Uuid,
        chatroom_id: Option<Uuid>,
        message: String,
    },
    #[serde(rename = "error")]
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    #[serde(rename = "pong")]
    Pong,
}

/// Client-to-server frames.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "send_message")]
    SendMessage {
        chatroom_id: Uuid,
        content: String,
        client_message_id: String,
    },
    /// The client opened a view onto the room; gates chat notifications.
    #[serde(rename = "enter_room")]
    EnterRoom { chatroom_id: Uuid },
    #[serde(rename = "leave_room")]
    LeaveRoom { chatroom_id: Uuid },
    #[serde(rename = "mark_read")]
    MarkRead { chatroom_id: Uuid, message_id: i64 },
    #[serde(rename = "ping")]
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_envelope_wire_shape() {
        let ack = WebSocketMessage::Ack {
            client_message_id: "abc".to_string(),
            message_id: 42,
            status: "OK".to_string(),
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["type"], "ack");
        assert_eq!(json["client_message_id"], "abc");
        assert_eq!(json["message_id"], 42);
        assert_eq!(json["status"], "OK");
    }

    #[test]
    fn error_envelope_omits_empty_detail() {
        let err = WebSocketMessage::Error {
            code: "FORBIDDEN".to_string(),
            message: "room not writable".to_string(),
            detail: None,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "error");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn client_send_frame_parses() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"send_message","chatroom_id":"6a4e41e6-2f14-4ffa-bf4c-07b2eb40b53d","content":"hi","client_message_id":"abc"}"#,
        )
        .unwrap();
        match frame {
            ClientFrame::SendMessage {
                content,
                client_message_id,
                ..
            } => {
                assert_eq!(content, "hi");
                assert_eq!(client_message_id, "abc");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

//! Real-time [`Event`]s exchanged with connected clients.
//!
//! On the wire every event is a JSON object `{"event": <name>, "data": {..}}`
//! with `camelCase` payload fields.

use common::DateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{conversation, message, user, Message};
#[cfg(doc)]
use crate::domain::{Conversation, User};

/// Event sent by a client.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Inbound {
    /// Request to join a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    JoinConversation {
        /// ID of the [`Conversation`] to join.
        conversation_id: conversation::Id,
    },

    /// Request to leave a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    LeaveConversation {
        /// ID of the [`Conversation`] to leave.
        conversation_id: conversation::Id,
    },

    /// Request to send a new [`Message`].
    #[serde(rename_all = "camelCase")]
    SendMessage {
        /// ID of the [`Conversation`] to send the [`Message`] to.
        conversation_id: conversation::Id,

        /// Raw content of the [`Message`].
        content: String,

        /// [`message::Kind`] of the [`Message`].
        #[serde(
            default,
            rename = "type",
            deserialize_with = "as_str::deserialize_option"
        )]
        kind: Option<message::Kind>,

        /// ID of the [`Message`] being replied to.
        #[serde(default)]
        reply_to: Option<message::Id>,
    },

    /// Notification that the client started typing.
    #[serde(rename_all = "camelCase")]
    TypingStart {
        /// ID of the [`Conversation`] being typed in.
        conversation_id: conversation::Id,
    },

    /// Notification that the client stopped typing.
    #[serde(rename_all = "camelCase")]
    TypingStop {
        /// ID of the [`Conversation`] being typed in.
        conversation_id: conversation::Id,
    },

    /// Request to mark [`Message`]s as read.
    #[serde(rename_all = "camelCase")]
    MarkAsRead {
        /// ID of the [`Conversation`] to mark as read.
        conversation_id: conversation::Id,

        /// ID of the only [`Message`] to mark, if any.
        #[serde(default)]
        message_id: Option<message::Id>,
    },
}

/// Event delivered to a client.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// New [`Message`] was sent.
    #[serde(rename_all = "camelCase")]
    NewMessage {
        /// ID of the [`Conversation`] the [`Message`] was sent to.
        conversation_id: conversation::Id,

        /// Sent [`Message`].
        message: MessageView,
    },

    /// [`Message`] was edited.
    #[serde(rename_all = "camelCase")]
    MessageEdited {
        /// ID of the [`Conversation`] the [`Message`] belongs to.
        conversation_id: conversation::Id,

        /// Edited [`Message`].
        message: MessageView,
    },

    /// [`Message`] was deleted.
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        /// ID of the [`Conversation`] the [`Message`] belonged to.
        conversation_id: conversation::Id,

        /// ID of the deleted [`Message`].
        message_id: message::Id,
    },

    /// Connection has joined a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    JoinedConversation {
        /// ID of the joined [`Conversation`].
        conversation_id: conversation::Id,
    },

    /// Connection has left a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    LeftConversation {
        /// ID of the left [`Conversation`].
        conversation_id: conversation::Id,
    },

    /// Another [`User`] has joined a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    UserJoinedConversation {
        /// ID of the joined [`User`].
        user_id: user::Id,

        /// ID of the [`Conversation`].
        conversation_id: conversation::Id,
    },

    /// Another [`User`] has left a [`Conversation`] room.
    #[serde(rename_all = "camelCase")]
    UserLeftConversation {
        /// ID of the left [`User`].
        user_id: user::Id,

        /// ID of the [`Conversation`].
        conversation_id: conversation::Id,
    },

    /// [`User`] started typing.
    #[serde(rename_all = "camelCase")]
    UserTypingStart {
        /// ID of the typing [`User`].
        user_id: user::Id,

        /// ID of the [`Conversation`] being typed in.
        conversation_id: conversation::Id,
    },

    /// [`User`] stopped typing.
    #[serde(rename_all = "camelCase")]
    UserTypingStop {
        /// ID of the [`User`] stopped typing.
        user_id: user::Id,

        /// ID of the [`Conversation`] being typed in.
        conversation_id: conversation::Id,
    },

    /// [`User`] has read [`Message`]s.
    #[serde(rename_all = "camelCase")]
    MessagesRead {
        /// ID of the reading [`User`].
        user_id: user::Id,

        /// ID of the [`Conversation`].
        conversation_id: conversation::Id,

        /// ID of the only read [`Message`], if a single one was marked.
        message_id: Option<message::Id>,

        /// Number of [`Message`]s newly marked as read.
        count: u32,
    },

    /// Number of unread [`Message`]s in a [`Conversation`] has changed.
    #[serde(rename_all = "camelCase")]
    UnreadCountUpdated {
        /// ID of the [`Conversation`].
        conversation_id: conversation::Id,

        /// Current number of unread [`Message`]s.
        unread_count: u32,
    },

    /// Number of [`Conversation`]s having unread [`Message`]s.
    #[serde(rename_all = "camelCase")]
    UnreadConversationsCount {
        /// Number of [`Conversation`]s.
        count: u32,
    },

    /// [`User`] went online or offline.
    #[serde(rename_all = "camelCase")]
    UserStatusChange {
        /// ID of the [`User`].
        user_id: user::Id,

        /// Indicator whether the [`User`] is online now.
        is_online: bool,

        /// [`DateTime`] the [`User`] was seen last time, if offline.
        #[serde(with = "common::datetime::serde::rfc3339::option")]
        last_seen: Option<DateTime>,
    },

    /// Request failed.
    Error {
        /// Human-readable reason of the failure.
        message: String,
    },
}

impl Event {
    /// Creates a new [`Event::Error`] out of the provided `message`.
    #[must_use]
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

/// Client-facing representation of a [`Message`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// ID of the [`Message`].
    pub id: message::Id,

    /// ID of the [`Conversation`] the [`Message`] belongs to.
    pub conversation_id: conversation::Id,

    /// ID of the [`User`] who sent the [`Message`].
    pub sender_id: user::Id,

    /// ID of the [`User`] the [`Message`] is addressed to.
    pub recipient_id: Option<user::Id>,

    /// Content of the [`Message`].
    pub content: String,

    /// [`message::Kind`] of the [`Message`].
    #[serde(rename = "type", serialize_with = "as_str::serialize")]
    pub kind: message::Kind,

    /// [`message::Status`] of the [`Message`].
    #[serde(serialize_with = "as_str::serialize")]
    pub status: message::Status,

    /// ID of the [`Message`] replied to.
    pub reply_to: Option<message::Id>,

    /// [`DateTime`] when the [`Message`] was sent.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub created_at: DateTime,

    /// [`DateTime`] when the [`Message`] was edited.
    #[serde(with = "common::datetime::serde::rfc3339::option")]
    pub edited_at: Option<DateTime>,
}

impl From<&Message> for MessageView {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            conversation_id: msg.conversation_id,
            sender_id: msg.sender_id,
            recipient_id: msg.recipient_id,
            content: msg.content.to_string(),
            kind: msg.kind,
            status: msg.status,
            reply_to: msg.reply_to,
            created_at: msg.created_at.coerce(),
            edited_at: msg.edited_at.map(|at| at.coerce()),
        }
    }
}

mod as_str {
    //! (De)serialization of kinds through their string representation.

    use std::{fmt, str::FromStr};

    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    /// Serializes the provided `value` as a string.
    pub(super) fn serialize<T, S>(value: &T, ser: S) -> Result<S::Ok, S::Error>
    where
        T: fmt::Display,
        S: Serializer,
    {
        ser.collect_str(value)
    }

    /// Deserializes an optional string into a `T`.
    pub(super) fn deserialize_option<'de, T, D>(
        de: D,
    ) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: fmt::Display,
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(de)?
            .map(|s| s.parse().map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod spec {
    use serde_json::json;

    use crate::domain::{conversation, message, user};

    use super::{Event, Inbound};

    #[test]
    fn parses_inbound_events() {
        let id = conversation::Id::new();

        let event = serde_json::from_value::<Inbound>(json!({
            "event": "send_message",
            "data": {
                "conversationId": id.to_string(),
                "content": "hello",
                "type": "PROPERTY_SHARE",
            },
        }))
        .unwrap();
        assert_eq!(event, Inbound::SendMessage {
            conversation_id: id,
            content: "hello".into(),
            kind: Some(message::Kind::PropertyShare),
            reply_to: None,
        });

        let event = serde_json::from_value::<Inbound>(json!({
            "event": "mark_as_read",
            "data": {"conversationId": id.to_string()},
        }))
        .unwrap();
        assert_eq!(event, Inbound::MarkAsRead {
            conversation_id: id,
            message_id: None,
        });

        assert!(serde_json::from_value::<Inbound>(json!({
            "event": "send_message",
            "data": {
                "conversationId": id.to_string(),
                "content": "x",
                "type": "VIDEO",
            },
        }))
        .is_err());
    }

    #[test]
    fn renders_outbound_events() {
        let user_id = user::Id::new();

        let value = serde_json::to_value(Event::UserStatusChange {
            user_id,
            is_online: true,
            last_seen: None,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "event": "user_status_change",
                "data": {
                    "userId": user_id.to_string(),
                    "isOnline": true,
                    "lastSeen": null,
                },
            }),
        );

        let value = serde_json::to_value(Event::error("denied")).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"message": "denied"}}),
        );
    }
}

//! [`Command`] for sending a [`Message`] to a [`Conversation`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{conversation, message, user, Conversation, Message},
    infra::{database, notifier::Notification, Database},
    read,
    realtime::{Envelope, Event, MessageView, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for sending a [`Message`] to a [`Conversation`].
///
/// The [`Message`] is persisted first and fanned out afterwards, so delivery
/// failures never fail the sending.
#[derive(Clone, Debug)]
pub struct SendMessage {
    /// ID of the [`Conversation`] to send the [`Message`] to.
    pub conversation_id: conversation::Id,

    /// ID of the [`User`] sending the [`Message`].
    pub sender_id: user::Id,

    /// Raw content of the [`Message`].
    pub content: String,

    /// [`message::Kind`] of the [`Message`].
    pub kind: message::Kind,

    /// ID of the [`Message`] being replied to, if any.
    pub reply_to: Option<message::Id>,
}

impl SendMessage {
    /// Maximum number of characters in a [`Notification::NewMessage`]
    /// preview.
    pub const PREVIEW_LEN: usize = 100;
}

impl<Db, Pg, Kv> Command<SendMessage> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<read::message::UnreadCount, read::message::Unread>>,
            Ok = read::message::UnreadCount,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Conversation, conversation::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Conversation>, conversation::Id>>,
            Ok = Option<Conversation>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Message>, message::Id>>,
            Ok = Option<Message>,
            Err = Traced<database::Error>,
        > + Database<Insert<Message>, Err = Traced<database::Error>>
        + Database<Update<Conversation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Message;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SendMessage) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SendMessage {
            conversation_id,
            sender_id,
            content,
            kind,
            reply_to,
        } = cmd;

        let content = message::Content::new(&content)
            .ok_or(E::InvalidContent)
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Conversation, _>::new(conversation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let mut conversation = tx
            .execute(Select(By::<Option<Conversation>, _>::new(conversation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::ConversationNotExists(conversation_id))
            .map_err(tracerr::wrap!())?;
        if !conversation.is_participant(sender_id) {
            return Err(tracerr::new!(E::NotParticipant(sender_id)));
        }
        if conversation.is_deleted()
            || conversation.status == conversation::Status::Blocked
        {
            return Err(tracerr::new!(E::ConversationClosed(conversation_id)));
        }
        if let Some(id) = reply_to {
            tx.execute(Select(By::<Option<Message>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(|m| m.conversation_id == conversation_id)
                .ok_or_else(|| E::MessageNotExists(id))
                .map_err(tracerr::wrap!())
                .map(drop)?;
        }

        let message = Message {
            id: message::Id::new(),
            conversation_id,
            sender_id,
            recipient_id: conversation.participants.other(sender_id),
            content,
            kind,
            status: message::Status::Sent,
            reply_to,
            created_at: conversation.next_message_at(),
            edited_at: None,
            deleted_at: None,
            deleted_by: None,
        };
        conversation.record_message(&message);
        tx.execute(Insert(message.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Update(conversation.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.fan_out(&conversation, &message).await;

        Ok(message)
    }
}

impl<Db, Pg, Kv> Service<Db, Pg, Kv>
where
    Db: Database<
        Select<By<read::message::UnreadCount, read::message::Unread>>,
        Ok = read::message::UnreadCount,
        Err = Traced<database::Error>,
    >,
{
    /// Delivers the provided just sent [`Message`] to the participants of
    /// the provided [`Conversation`].
    ///
    /// Online participants receive real-time events, while the offline ones
    /// are notified via [`Notification::NewMessage`].
    async fn fan_out(&self, conversation: &Conversation, message: &Message) {
        let [a, b] = conversation.participants.as_array();
        self.publish(
            Envelope::to(
                Target::Conversation(conversation.id),
                Event::NewMessage {
                    conversation_id: conversation.id,
                    message: MessageView::from(message),
                },
            )
            .and(Target::User(a))
            .and(Target::User(b)),
        )
        .await;

        for user_id in conversation.participants.iter() {
            if self.registry().is_online(user_id).await {
                let unread =
                    read::message::Unread::all(conversation.id, user_id);
                match self.database().execute(Select(By::new(unread))).await {
                    Ok(count) => {
                        self.publish(Envelope::to(
                            Target::User(user_id),
                            Event::UnreadCountUpdated {
                                conversation_id: conversation.id,
                                unread_count: count.into(),
                            },
                        ))
                        .await;
                    }
                    Err(e) => log::warn!(
                        "failed to count unread messages of `User(id: \
                         {user_id})`: {e}",
                    ),
                }
            } else if user_id != message.sender_id {
                let preview = message
                    .content
                    .as_ref()
                    .chars()
                    .take(SendMessage::PREVIEW_LEN)
                    .collect();
                let notification = Notification::NewMessage {
                    user_id,
                    conversation_id: conversation.id,
                    message_id: message.id,
                    preview,
                };
                if let Err(e) = self.notifier().notify(notification).await {
                    log::warn!(
                        "failed to notify `User(id: {user_id})` about \
                         `Message(id: {})`: {e}",
                        message.id,
                    );
                }
            }
        }
    }
}

/// Error of [`SendMessage`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`message::Content`] is empty or too long.
    #[display(
        "`Message` content must be non-empty and at most {} characters",
        message::Content::MAX_LEN
    )]
    InvalidContent,

    /// [`Conversation`] with the provided ID does not exist.
    #[display("`Conversation(id: {_0})` does not exist")]
    ConversationNotExists(#[error(not(source))] conversation::Id),

    /// [`Conversation`] doesn't accept new [`Message`]s.
    #[display("`Conversation(id: {_0})` is closed")]
    ConversationClosed(#[error(not(source))] conversation::Id),

    /// [`User`] doesn't participate in the [`Conversation`].
    #[display("`User(id: {_0})` is not a participant")]
    NotParticipant(#[error(not(source))] user::Id),

    /// Replied [`Message`] doesn't exist in the [`Conversation`].
    #[display("`Message(id: {_0})` does not exist")]
    MessageNotExists(#[error(not(source))] message::Id),
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{
        command::{ArchiveConversation, Command as _},
        domain::{conversation, message, user},
        infra::notifier::Notification,
        realtime::{Event, Target},
        testing,
    };

    use super::{ExecutionError, SendMessage};

    fn text(
        conv: conversation::Id,
        sender_id: user::Id,
        content: &str,
    ) -> SendMessage {
        SendMessage {
            conversation_id: conv,
            sender_id,
            content: content.into(),
            kind: message::Kind::Text,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn persists_in_order_and_reactivates() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        drop(
            svc.execute(ArchiveConversation {
                conversation_id: conv.id,
                user_id: a.id,
            })
            .await
            .unwrap(),
        );

        let first = svc.execute(text(conv.id, a.id, "  hello ")).await.unwrap();
        let second = svc.execute(text(conv.id, b.id, "hi")).await.unwrap();

        assert_eq!(first.content.as_ref(), "hello");
        assert_eq!(first.recipient_id, Some(b.id));
        assert_eq!(first.status, message::Status::Sent);
        assert!(second.created_at > first.created_at);

        let stored = env.database.with(|s| s.conversations[&conv.id].clone());
        assert_eq!(stored.status, conversation::Status::Active);
        assert_eq!(stored.last_message_id, Some(second.id));
        assert_eq!(stored.cached_unread(a.id), 1);
        assert_eq!(stored.cached_unread(b.id), 1);
    }

    #[tokio::test]
    async fn rejects_blank_and_oversized_content() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;

        for content in ["   ".to_owned(), "x".repeat(5001)] {
            let err =
                svc.execute(text(conv.id, a.id, &content)).await.unwrap_err();
            assert!(matches!(err.as_ref(), ExecutionError::InvalidContent));
        }
        drop(
            svc.execute(text(conv.id, a.id, &"x".repeat(5000)))
                .await
                .unwrap(),
        );
    }

    #[tokio::test]
    async fn rejects_outsider_and_foreign_reply() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let c = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let other = testing::conversation(&env.database, a.id, c.id).await;
        let foreign = svc.execute(text(other.id, c.id, "psst")).await.unwrap();

        let err = svc.execute(text(conv.id, c.id, "hey")).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParticipant(_)));

        let err = svc
            .execute(SendMessage {
                reply_to: Some(foreign.id),
                ..text(conv.id, a.id, "re")
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::MessageNotExists(_)));
    }

    #[tokio::test]
    async fn rejects_blocked_conversation() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        env.database.with(|s| {
            s.conversations.get_mut(&conv.id).unwrap().status =
                conversation::Status::Blocked;
        });

        let err = svc.execute(text(conv.id, a.id, "hey")).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::ConversationClosed(_),
        ));
    }

    #[tokio::test]
    async fn fans_out_to_online_and_notifies_offline() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let _conn = svc.registry().register(a.id).await;

        let msg = svc.execute(text(conv.id, a.id, "hello")).await.unwrap();

        let envelope = env.events.next().await.unwrap();
        assert!(envelope.targets.contains(&Target::Conversation(conv.id)));
        assert!(envelope.targets.contains(&Target::User(b.id)));
        assert!(matches!(
            envelope.event,
            Event::NewMessage { message, .. } if message.id == msg.id,
        ));

        let envelope = env.events.next().await.unwrap();
        assert_eq!(envelope.targets, vec![Target::User(a.id)]);
        assert_eq!(envelope.event, Event::UnreadCountUpdated {
            conversation_id: conv.id,
            unread_count: 0,
        });

        assert_eq!(env.notifier.delivered(), vec![Notification::NewMessage {
            user_id: b.id,
            conversation_id: conv.id,
            message_id: msg.id,
            preview: "hello".into(),
        }]);
    }
}

//! [`Command`] for marking [`Message`]s of a [`Conversation`] as read.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{conversation, message, user, Conversation, Message},
    infra::{database, Database},
    read,
    realtime::{Envelope, Event, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for marking [`Message`]s of a [`Conversation`] as read by one
/// of its participants.
///
/// Repeating it changes nothing.
#[derive(Clone, Copy, Debug)]
pub struct MarkConversationRead {
    /// ID of the [`Conversation`] to mark.
    pub conversation_id: conversation::Id,

    /// ID of the reading [`User`].
    pub reader_id: user::Id,

    /// ID of the only [`Message`] to mark, if any.
    ///
    /// [`None`] marks all the unread [`Message`]s.
    pub message_id: Option<message::Id>,
}

/// Output of [`MarkConversationRead`] [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Output {
    /// Number of [`Message`]s newly marked as read.
    pub count: u32,

    /// Number of [`Message`]s still unread by the reader.
    pub unread_count: u32,
}

impl<Db, Pg, Kv> Command<MarkConversationRead> for Service<Db, Pg, Kv>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
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
        > + Database<
            Select<By<Vec<message::Id>, read::message::Unread>>,
            Ok = Vec<message::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::message::UnreadCount, read::message::Unread>>,
            Ok = read::message::UnreadCount,
            Err = Traced<database::Error>,
        > + Database<
            Insert<Vec<message::Receipt>>,
            Ok = Vec<message::Id>,
            Err = Traced<database::Error>,
        > + Database<Update<Conversation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: MarkConversationRead,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let MarkConversationRead {
            conversation_id,
            reader_id,
            message_id,
        } = cmd;

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
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| E::ConversationNotExists(conversation_id))
            .map_err(tracerr::wrap!())?;
        if !conversation.is_participant(reader_id) {
            return Err(tracerr::new!(E::NotParticipant(reader_id)));
        }
        if let Some(id) = message_id {
            tx.execute(Select(By::<Option<Message>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(|m| m.conversation_id == conversation_id)
                .ok_or_else(|| E::MessageNotExists(id))
                .map_err(tracerr::wrap!())
                .map(drop)?;
        }

        let unread = tx
            .execute(Select(By::<Vec<message::Id>, _>::new(
                read::message::Unread {
                    conversation_id,
                    reader_id,
                    message_id,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let read_at = message::ReadDateTime::now();
        let marked = tx
            .execute(Insert(
                unread
                    .into_iter()
                    .map(|message_id| message::Receipt {
                        message_id,
                        reader_id,
                        read_at,
                    })
                    .collect::<Vec<_>>(),
            ))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let unread_count: u32 = tx
            .execute(Select(By::<read::message::UnreadCount, _>::new(
                read::message::Unread::all(conversation_id, reader_id),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .into();
        if conversation.cached_unread(reader_id) != unread_count {
            conversation.reset_unread(reader_id, unread_count);
            tx.execute(Update(conversation))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let count = u32::try_from(marked.len()).unwrap_or(u32::MAX);
        if count > 0 {
            self.publish(Envelope::to(
                Target::Conversation(conversation_id),
                Event::MessagesRead {
                    user_id: reader_id,
                    conversation_id,
                    message_id,
                    count,
                },
            ))
            .await;
            self.publish(Envelope::to(
                Target::User(reader_id),
                Event::UnreadCountUpdated {
                    conversation_id,
                    unread_count,
                },
            ))
            .await;
        }

        Ok(Output {
            count,
            unread_count,
        })
    }
}

/// Error of [`MarkConversationRead`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Conversation`] with the provided ID does not exist.
    #[display("`Conversation(id: {_0})` does not exist")]
    ConversationNotExists(#[error(not(source))] conversation::Id),

    /// [`User`] doesn't participate in the [`Conversation`].
    #[display("`User(id: {_0})` is not a participant")]
    NotParticipant(#[error(not(source))] user::Id),

    /// [`Message`] doesn't exist in the [`Conversation`].
    #[display("`Message(id: {_0})` does not exist")]
    MessageNotExists(#[error(not(source))] message::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::{Command as _, SendMessage},
        domain::{conversation, message, user, Message},
        infra::Database as _,
        read,
        testing,
    };

    use super::{ExecutionError, MarkConversationRead, Output};

    async fn send(
        svc: &testing::TestService,
        conv: conversation::Id,
        sender_id: user::Id,
        content: &str,
    ) -> Message {
        svc.execute(SendMessage {
            conversation_id: conv,
            sender_id,
            content: content.into(),
            kind: message::Kind::Text,
            reply_to: None,
        })
        .await
        .unwrap()
    }

    async fn unread_count(
        env: &testing::Adapters,
        conv: conversation::Id,
        reader_id: user::Id,
    ) -> u32 {
        env.database
            .execute(Select(By::<read::message::UnreadCount, _>::new(
                read::message::Unread::all(conv, reader_id),
            )))
            .await
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn reads_for_reader_only() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let msg = send(&svc, conv.id, a.id, "hello").await;
        drop(send(&svc, conv.id, b.id, "hey").await);
        assert_eq!(unread_count(&env, conv.id, b.id).await, 1);

        let out = svc
            .execute(MarkConversationRead {
                conversation_id: conv.id,
                reader_id: b.id,
                message_id: None,
            })
            .await
            .unwrap();

        assert_eq!(out, Output {
            count: 1,
            unread_count: 0,
        });
        assert_eq!(unread_count(&env, conv.id, b.id).await, 0);
        assert_eq!(unread_count(&env, conv.id, a.id).await, 1);
        let stored = env.database.with(|s| s.messages[&msg.id].clone());
        assert_eq!(stored.status, message::Status::Read);
        let cached = env.database.with(|s| s.conversations[&conv.id].clone());
        assert_eq!(cached.cached_unread(b.id), 0);
    }

    #[tokio::test]
    async fn changes_nothing_on_repeat() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        drop(send(&svc, conv.id, a.id, "one").await);
        drop(send(&svc, conv.id, a.id, "two").await);
        let cmd = MarkConversationRead {
            conversation_id: conv.id,
            reader_id: b.id,
            message_id: None,
        };
        assert_eq!(svc.execute(cmd).await.unwrap().count, 2);
        let before = env.database.with(|s| {
            (s.receipts.len(), s.conversations[&conv.id].updated_at)
        });

        let out = svc.execute(cmd).await.unwrap();

        assert_eq!(out.count, 0);
        let after = env.database.with(|s| {
            (s.receipts.len(), s.conversations[&conv.id].updated_at)
        });
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn marks_single_message() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let first = send(&svc, conv.id, a.id, "one").await;
        drop(send(&svc, conv.id, a.id, "two").await);

        let out = svc
            .execute(MarkConversationRead {
                conversation_id: conv.id,
                reader_id: b.id,
                message_id: Some(first.id),
            })
            .await
            .unwrap();

        assert_eq!(out, Output {
            count: 1,
            unread_count: 1,
        });
    }

    #[tokio::test]
    async fn rejects_outsider() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;

        let err = svc
            .execute(MarkConversationRead {
                conversation_id: conv.id,
                reader_id: user::Id::new(),
                message_id: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotParticipant(_)));
    }
}

//! [`Command`] for joining a live connection to a [`Conversation`] room.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    command::{mark_conversation_read, MarkConversationRead},
    domain::{conversation, user, Conversation},
    infra::{database, Database},
    realtime::{ConnectionId, Envelope, Event, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::{Message, User};

use super::Command;

/// [`Command`] for joining a live connection to a [`Conversation`] room,
/// marking all its [`Message`]s as read by the connected [`User`].
#[derive(Clone, Copy, Debug)]
pub struct JoinConversation {
    /// ID of the joining connection.
    pub connection_id: ConnectionId,

    /// ID of the [`Conversation`] to join.
    pub conversation_id: conversation::Id,
}

impl<Db, Pg, Kv> Command<JoinConversation> for Service<Db, Pg, Kv>
where
    Db: Database<
        Select<By<Option<Conversation>, conversation::Id>>,
        Ok = Option<Conversation>,
        Err = Traced<database::Error>,
    >,
    Self: Command<
        MarkConversationRead,
        Ok = mark_conversation_read::Output,
        Err = Traced<mark_conversation_read::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: JoinConversation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let JoinConversation {
            connection_id,
            conversation_id,
        } = cmd;

        let user_id = self
            .registry()
            .user_of(connection_id)
            .await
            .ok_or(E::NotConnected(connection_id))
            .map_err(tracerr::wrap!())?;
        let conversation = self
            .database()
            .execute(Select(By::<Option<Conversation>, _>::new(conversation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|c| !c.is_deleted_for(user_id))
            .ok_or_else(|| E::ConversationNotExists(conversation_id))
            .map_err(tracerr::wrap!())?;
        if !conversation.is_participant(user_id) {
            return Err(tracerr::new!(E::NotParticipant(user_id)));
        }

        if !self.registry().join(connection_id, conversation_id).await {
            return Err(tracerr::new!(E::NotConnected(connection_id)));
        }
        self.publish(Envelope::to(
            Target::Connection(connection_id),
            Event::JoinedConversation { conversation_id },
        ))
        .await;
        self.publish(
            Envelope::to(
                Target::Conversation(conversation_id),
                Event::UserJoinedConversation {
                    user_id,
                    conversation_id,
                },
            )
            .except(connection_id),
        )
        .await;

        self.execute(MarkConversationRead {
            conversation_id,
            reader_id: user_id,
            message_id: None,
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)
    }
}

/// Error of [`JoinConversation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Marking the [`Conversation`] as read failed.
    #[display("Failed to mark `Conversation` as read: {_0}")]
    #[from]
    MarkAsRead(mark_conversation_read::ExecutionError),

    /// Connection is not registered.
    #[display("Connection `{_0}` is not registered")]
    NotConnected(#[error(not(source))] ConnectionId),

    /// [`Conversation`] with the provided ID does not exist.
    #[display("`Conversation(id: {_0})` does not exist")]
    ConversationNotExists(#[error(not(source))] conversation::Id),

    /// [`User`] doesn't participate in the [`Conversation`].
    #[display("`User(id: {_0})` is not a participant")]
    NotParticipant(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{
        command::{Command as _, SendMessage},
        domain::{message, user},
        realtime::{Event, Target},
        testing,
    };

    use super::{ExecutionError, JoinConversation};

    #[tokio::test]
    async fn joins_room_and_reads_conversation() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        drop(
            svc.execute(SendMessage {
                conversation_id: conv.id,
                sender_id: a.id,
                content: "hello".into(),
                kind: message::Kind::Text,
                reply_to: None,
            })
            .await
            .unwrap(),
        );
        drop(env.events.next().await);
        let conn = svc.registry().register(b.id).await;

        svc.execute(JoinConversation {
            connection_id: conn.id,
            conversation_id: conv.id,
        })
        .await
        .unwrap();

        assert!(svc.registry().is_joined(conn.id, conv.id).await);
        let joined = env.events.next().await.unwrap();
        assert_eq!(joined.targets, vec![Target::Connection(conn.id)]);
        let announced = env.events.next().await.unwrap();
        assert_eq!(announced.except, Some(conn.id));
        let read = env.events.next().await.unwrap();
        assert!(matches!(
            read.event,
            Event::MessagesRead { count: 1, .. },
        ));
        let cached = env.database.with(|s| s.conversations[&conv.id].clone());
        assert_eq!(cached.cached_unread(b.id), 0);
    }

    #[tokio::test]
    async fn rejects_outsider_and_unknown_connection() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let c = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let conn = svc.registry().register(c.id).await;

        let err = svc
            .execute(JoinConversation {
                connection_id: conn.id,
                conversation_id: conv.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParticipant(_)));
        assert!(!svc.registry().is_joined(conn.id, conv.id).await);

        drop(svc.registry().unregister(conn.id).await);
        let err = svc
            .execute(JoinConversation {
                connection_id: conn.id,
                conversation_id: conv.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotConnected(_)));
    }
}

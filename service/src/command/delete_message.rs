//! [`Command`] for deleting a [`Message`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{conversation, message, user, Conversation, Message},
    infra::{database, Database},
    realtime::{Envelope, Event, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for soft-deleting a [`Message`] by its sender within
/// [`Message::MODIFICATION_WINDOW`].
///
/// The content of a deleted [`Message`] is replaced with
/// [`message::Content::DELETED`].
#[derive(Clone, Copy, Debug)]
pub struct DeleteMessage {
    /// ID of the [`Message`] to delete.
    pub message_id: message::Id,

    /// ID of the [`User`] deleting the [`Message`].
    pub actor_id: user::Id,
}

impl<Db, Pg, Kv> Command<DeleteMessage> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<Option<Message>, message::Id>>,
            Ok = Option<Message>,
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
        > + Database<Update<Message>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Message;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: DeleteMessage) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeleteMessage {
            message_id,
            actor_id,
        } = cmd;

        let conversation_id = self
            .database()
            .execute(Select(By::<Option<Message>, _>::new(message_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::MessageNotExists(message_id))
            .map_err(tracerr::wrap!())?
            .conversation_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Conversation, _>::new(conversation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let conversation = tx
            .execute(Select(By::<Option<Conversation>, _>::new(conversation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::MessageNotExists(message_id))
            .map_err(tracerr::wrap!())?;
        let mut message = tx
            .execute(Select(By::<Option<Message>, _>::new(message_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::MessageNotExists(message_id))
            .map_err(tracerr::wrap!())?;
        message
            .delete(actor_id)
            .map_err(E::from)
            .map_err(tracerr::wrap!())?;
        tx.execute(Update(message.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!("`Message(id: {message_id})` is deleted by `{actor_id}`");

        let [a, b] = conversation.participants.as_array();
        self.publish(
            Envelope::to(
                Target::Conversation(conversation_id),
                Event::MessageDeleted {
                    conversation_id,
                    message_id,
                },
            )
            .and(Target::User(a))
            .and(Target::User(b)),
        )
        .await;

        Ok(message)
    }
}

/// Error of [`DeleteMessage`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Message`] with the provided ID does not exist.
    #[display("`Message(id: {_0})` does not exist")]
    MessageNotExists(#[error(not(source))] message::Id),

    /// [`User`] is not the sender of the [`Message`].
    #[display("`User(id: {_0})` cannot delete this `Message`")]
    Forbidden(#[error(not(source))] user::Id),

    /// [`Message::MODIFICATION_WINDOW`] has elapsed.
    #[display("`Message(id: {_0})` cannot be deleted anymore")]
    Expired(#[error(not(source))] message::Id),
}

impl From<message::ModificationError> for ExecutionError {
    fn from(e: message::ModificationError) -> Self {
        use message::ModificationError as M;

        match e {
            M::Deleted(id) => Self::MessageNotExists(id),
            M::NotSender(user_id) => Self::Forbidden(user_id),
            M::Expired(id) => Self::Expired(id),
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Select};

    use crate::{
        command::{Command as _, SendMessage},
        domain::{message, user, Message},
        infra::Database as _,
        read,
        testing,
    };

    use super::{DeleteMessage, ExecutionError};

    #[tokio::test]
    async fn replaces_content_and_stops_counting_unread() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let msg = svc
            .execute(SendMessage {
                conversation_id: conv.id,
                sender_id: a.id,
                content: "oops".into(),
                kind: message::Kind::Text,
                reply_to: None,
            })
            .await
            .unwrap();

        let deleted = svc
            .execute(DeleteMessage {
                message_id: msg.id,
                actor_id: a.id,
            })
            .await
            .unwrap();

        assert_eq!(deleted.content.to_string(), message::Content::DELETED);
        assert_eq!(deleted.deleted_by, Some(a.id));
        let unread: u32 = env
            .database
            .execute(Select(By::<read::message::UnreadCount, _>::new(
                read::message::Unread::all(conv.id, b.id),
            )))
            .await
            .unwrap()
            .into();
        assert_eq!(unread, 0);

        let err = svc
            .execute(DeleteMessage {
                message_id: msg.id,
                actor_id: a.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::MessageNotExists(_)));
    }

    #[tokio::test]
    async fn rejects_after_window() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        let msg = svc
            .execute(SendMessage {
                conversation_id: conv.id,
                sender_id: a.id,
                content: "old news".into(),
                kind: message::Kind::Text,
                reply_to: None,
            })
            .await
            .unwrap();
        env.database.with(|s| {
            let m = s.messages.get_mut(&msg.id).unwrap();
            m.created_at = m.created_at
                - Message::MODIFICATION_WINDOW
                - Duration::from_secs(1);
        });

        let err = svc
            .execute(DeleteMessage {
                message_id: msg.id,
                actor_id: a.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Expired(_)));

        let err = svc
            .execute(DeleteMessage {
                message_id: msg.id,
                actor_id: b.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Forbidden(_)));
    }
}

//! [`Command`] for editing a [`Message`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{conversation, message, user, Conversation, Message},
    infra::{database, Database},
    realtime::{Envelope, Event, MessageView, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for editing a [`Message`] by its sender within
/// [`Message::MODIFICATION_WINDOW`].
#[derive(Clone, Debug)]
pub struct EditMessage {
    /// ID of the [`Message`] to edit.
    pub message_id: message::Id,

    /// ID of the [`User`] editing the [`Message`].
    pub editor_id: user::Id,

    /// New raw content of the [`Message`].
    pub content: String,
}

impl<Db, Pg, Kv> Command<EditMessage> for Service<Db, Pg, Kv>
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

    async fn execute(&self, cmd: EditMessage) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let EditMessage {
            message_id,
            editor_id,
            content,
        } = cmd;

        let content = message::Content::new(content)
            .ok_or(E::InvalidContent)
            .map_err(tracerr::wrap!())?;
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
            .edit(content, editor_id)
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

        let [a, b] = conversation.participants.as_array();
        self.publish(
            Envelope::to(
                Target::Conversation(conversation_id),
                Event::MessageEdited {
                    conversation_id,
                    message: MessageView::from(&message),
                },
            )
            .and(Target::User(a))
            .and(Target::User(b)),
        )
        .await;

        Ok(message)
    }
}

/// Error of [`EditMessage`] [`Command`] execution.
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

    /// [`Message`] with the provided ID does not exist.
    #[display("`Message(id: {_0})` does not exist")]
    MessageNotExists(#[error(not(source))] message::Id),

    /// [`User`] is not the sender of the [`Message`].
    #[display("`User(id: {_0})` cannot edit this `Message`")]
    Forbidden(#[error(not(source))] user::Id),

    /// [`Message::MODIFICATION_WINDOW`] has elapsed.
    #[display("`Message(id: {_0})` cannot be edited anymore")]
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

    use futures::StreamExt as _;

    use crate::{
        command::{Command as _, SendMessage},
        domain::{message, user, Message},
        realtime::{Event, Target},
        testing,
    };

    use super::{EditMessage, ExecutionError};

    async fn sent(
        svc: &testing::TestService,
        env: &testing::Adapters,
        sender_id: user::Id,
    ) -> (Message, user::Id) {
        let other = testing::user(&env.database, user::Role::User).await;
        let conv =
            testing::conversation(&env.database, sender_id, other.id).await;
        let msg = svc
            .execute(SendMessage {
                conversation_id: conv.id,
                sender_id,
                content: "hello".into(),
                kind: message::Kind::Text,
                reply_to: None,
            })
            .await
            .unwrap();
        (msg, other.id)
    }

    fn age(env: &testing::Adapters, id: message::Id, by: Duration) {
        env.database.with(|s| {
            let msg = s.messages.get_mut(&id).unwrap();
            msg.created_at = msg.created_at - by;
        });
    }

    #[tokio::test]
    async fn edits_own_message_and_broadcasts() {
        let (svc, mut env) = testing::service();
        let sender = testing::user(&env.database, user::Role::User).await;
        let (msg, _) = sent(&svc, &env, sender.id).await;
        drop(env.events.next().await);

        let edited = svc
            .execute(EditMessage {
                message_id: msg.id,
                editor_id: sender.id,
                content: " fixed ".into(),
            })
            .await
            .unwrap();

        assert_eq!(edited.content.to_string(), "fixed");
        assert!(edited.edited_at.is_some());
        let envelope = env.events.next().await.unwrap();
        assert_eq!(
            envelope.targets[0],
            Target::Conversation(msg.conversation_id),
        );
        assert!(matches!(envelope.event, Event::MessageEdited { .. }));
    }

    #[tokio::test]
    async fn allows_edits_until_window_closes() {
        let (svc, env) = testing::service();
        let sender = testing::user(&env.database, user::Role::User).await;
        let (msg, _) = sent(&svc, &env, sender.id).await;
        age(
            &env,
            msg.id,
            Message::MODIFICATION_WINDOW - Duration::from_secs(60),
        );

        drop(
            svc.execute(EditMessage {
                message_id: msg.id,
                editor_id: sender.id,
                content: "late but fine".into(),
            })
            .await
            .unwrap(),
        );

        age(&env, msg.id, Duration::from_secs(61));
        let err = svc
            .execute(EditMessage {
                message_id: msg.id,
                editor_id: sender.id,
                content: "too late".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Expired(_)));
    }

    #[tokio::test]
    async fn forbids_other_participant() {
        let (svc, env) = testing::service();
        let sender = testing::user(&env.database, user::Role::User).await;
        let (msg, other) = sent(&svc, &env, sender.id).await;

        let err = svc
            .execute(EditMessage {
                message_id: msg.id,
                editor_id: other,
                content: "mine now".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Forbidden(_)));
    }

    #[tokio::test]
    async fn rejects_blank_content() {
        let (svc, env) = testing::service();
        let sender = testing::user(&env.database, user::Role::User).await;
        let (msg, _) = sent(&svc, &env, sender.id).await;

        let err = svc
            .execute(EditMessage {
                message_id: msg.id,
                editor_id: sender.id,
                content: "   ".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidContent));
    }
}

//! [`Command`] for archiving a [`Conversation`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Message, User};
use crate::{
    domain::{conversation, user, Conversation},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for archiving a [`Conversation`].
///
/// The next sent [`Message`] reactivates it.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveConversation {
    /// ID of the [`Conversation`] to archive.
    pub conversation_id: conversation::Id,

    /// ID of the participating [`User`] archiving the [`Conversation`].
    pub user_id: user::Id,
}

impl<Db, Pg, Kv> Command<ArchiveConversation> for Service<Db, Pg, Kv>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Conversation, conversation::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Conversation>, conversation::Id>>,
            Ok = Option<Conversation>,
            Err = Traced<database::Error>,
        > + Database<Update<Conversation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Conversation;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ArchiveConversation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ArchiveConversation {
            conversation_id,
            user_id,
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
            .filter(|c| !c.is_deleted_for(user_id))
            .ok_or_else(|| E::ConversationNotExists(conversation_id))
            .map_err(tracerr::wrap!())?;
        if !conversation.is_participant(user_id) {
            return Err(tracerr::new!(E::NotParticipant(user_id)));
        }

        conversation.archive();
        tx.execute(Update(conversation.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(conversation)
    }
}

/// Error of [`ArchiveConversation`] [`Command`] execution.
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
}

#[cfg(test)]
mod spec {
    use crate::{
        command::Command as _,
        domain::{conversation, user},
        testing,
    };

    use super::{ArchiveConversation, ExecutionError};

    #[tokio::test]
    async fn archives_for_participant() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;

        let archived = svc
            .execute(ArchiveConversation {
                conversation_id: conv.id,
                user_id: b.id,
            })
            .await
            .unwrap();

        assert_eq!(archived.status, conversation::Status::Archived);
    }

    #[tokio::test]
    async fn rejects_outsider() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;

        let err = svc
            .execute(ArchiveConversation {
                conversation_id: conv.id,
                user_id: user::Id::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotParticipant(_)));
    }
}

//! [`Command`] for resolving a [`Conversation`] between two [`User`]s.

use std::collections::HashMap;

use common::operations::{By, Commit, Insert, Lock, Select, Transact, Transacted};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{conversation, property, user, Conversation, Property, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for resolving a [`Conversation`] between two [`User`]s,
/// optionally about a [`Property`], creating it on the first contact.
#[derive(Clone, Debug)]
pub struct FindOrCreateConversation {
    /// IDs of the participating [`User`]s, in any order.
    pub participants: Vec<user::Id>,

    /// ID of the [`Property`] the [`Conversation`] is about, if any.
    pub property_id: Option<property::Id>,

    /// [`conversation::Kind`] of a new [`Conversation`].
    ///
    /// Defaults to [`conversation::Kind::PropertyInquiry`] for a
    /// [`Conversation`] about a [`Property`], or to
    /// [`conversation::Kind::General`] otherwise.
    pub kind: Option<conversation::Kind>,
}

/// Output of [`FindOrCreateConversation`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Resolved [`Conversation`].
    pub conversation: Conversation,

    /// Indicator whether the [`Conversation`] has been created.
    pub created: bool,
}

impl<Db, Pg, Kv> Command<FindOrCreateConversation> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<HashMap<user::Id, User>, [user::Id; 2]>>,
            Ok = HashMap<user::Id, User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Conversation>, conversation::Key>>,
            Ok = Option<Conversation>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Conversation, conversation::KeyHash>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Conversation>, conversation::Key>>,
            Ok = Option<Conversation>,
            Err = Traced<database::Error>,
        > + Database<Insert<Conversation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: FindOrCreateConversation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let FindOrCreateConversation {
            participants,
            property_id,
            kind,
        } = cmd;

        let participants = conversation::Participants::new(participants)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let key = conversation::Key {
            participants,
            property_id,
        };

        let existing = self
            .database()
            .execute(Select(By::<Option<Conversation>, _>::new(key)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(conversation) = existing {
            return Ok(Output {
                conversation,
                created: false,
            });
        }

        let users = self
            .database()
            .execute(Select(By::<HashMap<_, User>, _>::new(
                participants.as_array(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(missing) =
            participants.iter().find(|id| !users.contains_key(id))
        {
            return Err(tracerr::new!(E::UserNotExists(missing)));
        }
        if let Some(id) = property_id {
            self.database()
                .execute(Select(By::<Option<Property>, _>::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::PropertyNotExists(id))
                .map_err(tracerr::wrap!())
                .map(drop)?;
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Conversation, _>::new(key.hash())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let existing = tx
            .execute(Select(By::<Option<Conversation>, _>::new(key)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(conversation) = existing {
            return Ok(Output {
                conversation,
                created: false,
            });
        }

        let kind = kind.unwrap_or(if property_id.is_some() {
            conversation::Kind::PropertyInquiry
        } else {
            conversation::Kind::General
        });
        let conversation = Conversation::new(participants, property_id, kind);
        tx.execute(Insert(conversation.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!("`Conversation(id: {})` is started", conversation.id);

        Ok(Output {
            conversation,
            created: true,
        })
    }
}

/// Error of [`FindOrCreateConversation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Provided participants are invalid.
    #[display("Invalid participants: {_0}")]
    InvalidParticipants(conversation::ParticipantsError),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`Property`] with the provided ID does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),
}

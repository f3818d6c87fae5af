//! [`Command`] for relaying typing indicators.

use derive_more::{Display, Error};
use tracerr::Traced;

use crate::{
    domain::conversation,
    realtime::{ConnectionId, Envelope, Event, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::Conversation;

use super::Command;

/// [`Command`] for relaying a typing indicator to the other members of a
/// joined [`Conversation`] room.
#[derive(Clone, Copy, Debug)]
pub struct NotifyTyping {
    /// ID of the typing connection.
    pub connection_id: ConnectionId,

    /// ID of the [`Conversation`] being typed in.
    pub conversation_id: conversation::Id,

    /// Indicator whether typing has started or stopped.
    pub is_typing: bool,
}

impl<Db, Pg, Kv> Command<NotifyTyping> for Service<Db, Pg, Kv> {
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: NotifyTyping) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let NotifyTyping {
            connection_id,
            conversation_id,
            is_typing,
        } = cmd;

        let user_id = self
            .registry()
            .user_of(connection_id)
            .await
            .ok_or(E::NotConnected(connection_id))
            .map_err(tracerr::wrap!())?;
        if !self.registry().is_joined(connection_id, conversation_id).await {
            return Err(tracerr::new!(E::NotJoined(conversation_id)));
        }

        let event = if is_typing {
            Event::UserTypingStart {
                user_id,
                conversation_id,
            }
        } else {
            Event::UserTypingStop {
                user_id,
                conversation_id,
            }
        };
        self.publish(
            Envelope::to(Target::Conversation(conversation_id), event)
                .except(connection_id),
        )
        .await;

        Ok(())
    }
}

/// Error of [`NotifyTyping`] [`Command`] execution.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ExecutionError {
    /// Connection is not registered.
    #[display("Connection `{_0}` is not registered")]
    NotConnected(#[error(not(source))] ConnectionId),

    /// Connection hasn't joined the [`Conversation`] room.
    #[display("`Conversation(id: {_0})` is not joined")]
    NotJoined(#[error(not(source))] conversation::Id),
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{
        command::Command as _,
        domain::{conversation, user},
        realtime::{Envelope, Event, Target},
        testing,
    };

    use super::{ExecutionError, NotifyTyping};

    #[tokio::test]
    async fn relays_to_room_except_typist() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let conv = conversation::Id::new();
        let conn = svc.registry().register(a.id).await;
        assert!(svc.registry().join(conn.id, conv).await);

        svc.execute(NotifyTyping {
            connection_id: conn.id,
            conversation_id: conv,
            is_typing: true,
        })
        .await
        .unwrap();

        assert_eq!(
            env.events.next().await.unwrap(),
            Envelope::to(Target::Conversation(conv), Event::UserTypingStart {
                user_id: a.id,
                conversation_id: conv,
            })
            .except(conn.id),
        );
    }

    #[tokio::test]
    async fn requires_joined_room() {
        let (svc, env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let conn = svc.registry().register(a.id).await;

        let err = svc
            .execute(NotifyTyping {
                connection_id: conn.id,
                conversation_id: conversation::Id::new(),
                is_typing: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotJoined(_)));
    }
}

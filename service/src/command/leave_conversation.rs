//! [`Command`] for removing a live connection from a [`Conversation`] room.

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

/// [`Command`] for removing a live connection from a [`Conversation`] room.
#[derive(Clone, Copy, Debug)]
pub struct LeaveConversation {
    /// ID of the leaving connection.
    pub connection_id: ConnectionId,

    /// ID of the [`Conversation`] to leave.
    pub conversation_id: conversation::Id,
}

impl<Db, Pg, Kv> Command<LeaveConversation> for Service<Db, Pg, Kv> {
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: LeaveConversation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let LeaveConversation {
            connection_id,
            conversation_id,
        } = cmd;

        let user_id = self
            .registry()
            .user_of(connection_id)
            .await
            .ok_or(E::NotConnected(connection_id))
            .map_err(tracerr::wrap!())?;

        let left = self.registry().leave(connection_id, conversation_id).await;
        self.publish(Envelope::to(
            Target::Connection(connection_id),
            Event::LeftConversation { conversation_id },
        ))
        .await;
        if left {
            self.publish(Envelope::to(
                Target::Conversation(conversation_id),
                Event::UserLeftConversation {
                    user_id,
                    conversation_id,
                },
            ))
            .await;
        }

        Ok(())
    }
}

/// Error of [`LeaveConversation`] [`Command`] execution.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ExecutionError {
    /// Connection is not registered.
    #[display("Connection `{_0}` is not registered")]
    NotConnected(#[error(not(source))] ConnectionId),
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{
        command::Command as _,
        domain::{conversation, user},
        realtime::{Event, Target},
        testing,
    };

    use super::LeaveConversation;

    #[tokio::test]
    async fn leaves_joined_room() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let conv = conversation::Id::new();
        let conn = svc.registry().register(a.id).await;
        assert!(svc.registry().join(conn.id, conv).await);

        svc.execute(LeaveConversation {
            connection_id: conn.id,
            conversation_id: conv,
        })
        .await
        .unwrap();

        assert!(!svc.registry().is_joined(conn.id, conv).await);
        let left = env.events.next().await.unwrap();
        assert_eq!(left.targets, vec![Target::Connection(conn.id)]);
        let announced = env.events.next().await.unwrap();
        assert_eq!(announced.event, Event::UserLeftConversation {
            user_id: a.id,
            conversation_id: conv,
        });
    }
}

//! [`Command`] for unregistering a live connection.

use std::convert::Infallible;

use common::DateTime;

use crate::{
    realtime::{ConnectionId, Envelope, Event, Target, Unregistration},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for unregistering a live connection, leaving all its rooms.
///
/// The last connection of a [`User`] announces it offline to everyone.
#[derive(Clone, Copy, Debug)]
pub struct DisconnectUser {
    /// ID of the closed connection.
    pub connection_id: ConnectionId,
}

impl<Db, Pg, Kv> Command<DisconnectUser> for Service<Db, Pg, Kv> {
    type Ok = Option<Unregistration>;
    type Err = Infallible;

    async fn execute(
        &self,
        cmd: DisconnectUser,
    ) -> Result<Self::Ok, Self::Err> {
        let out = self.registry().unregister(cmd.connection_id).await;
        if let Some(Unregistration {
            user_id,
            is_last: true,
        }) = out
        {
            self.publish(Envelope::to(
                Target::Everyone,
                Event::UserStatusChange {
                    user_id,
                    is_online: false,
                    last_seen: Some(DateTime::now()),
                },
            ))
            .await;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{
        command::Command as _,
        domain::user,
        realtime::{ConnectionId, Event},
        testing,
    };

    use super::DisconnectUser;

    #[tokio::test]
    async fn announces_last_disconnection_only() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let first = svc.registry().register(a.id).await;
        let second = svc.registry().register(a.id).await;

        let out = svc
            .execute(DisconnectUser {
                connection_id: first.id,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(!out.is_last);
        assert!(svc.registry().is_online(a.id).await);

        let out = svc
            .execute(DisconnectUser {
                connection_id: second.id,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(out.is_last);
        assert!(!svc.registry().is_online(a.id).await);
        let status = env.events.next().await.unwrap();
        assert!(matches!(
            status.event,
            Event::UserStatusChange {
                is_online: false,
                last_seen: Some(_),
                ..
            },
        ));
    }

    #[tokio::test]
    async fn ignores_unknown_connection() {
        let (svc, _env) = testing::service();

        let out = svc
            .execute(DisconnectUser {
                connection_id: ConnectionId::new(),
            })
            .await
            .unwrap();

        assert!(out.is_none());
    }
}

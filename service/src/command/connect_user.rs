//! [`Command`] for registering a live connection of a [`User`].

use std::convert::Infallible;

use common::operations::{By, Select};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::user,
    infra::{database, Database},
    read,
    realtime::{Envelope, Event, Registration, Target},
    Service,
};
#[cfg(doc)]
use crate::domain::{Conversation, User};

use super::Command;

/// [`Command`] for registering a live connection of an authenticated
/// [`User`].
///
/// The first connection of a [`User`] announces it online to everyone.
#[derive(Clone, Copy, Debug)]
pub struct ConnectUser {
    /// ID of the connecting [`User`].
    pub user_id: user::Id,
}

impl<Db, Pg, Kv> Command<ConnectUser> for Service<Db, Pg, Kv>
where
    Db: Database<
        Select<By<read::conversation::Unread, user::Id>>,
        Ok = read::conversation::Unread,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Registration;
    type Err = Infallible;

    async fn execute(&self, cmd: ConnectUser) -> Result<Self::Ok, Self::Err> {
        let ConnectUser { user_id } = cmd;

        let registration = self.registry().register(user_id).await;
        if registration.is_first {
            self.publish(Envelope::to(
                Target::Everyone,
                Event::UserStatusChange {
                    user_id,
                    is_online: true,
                    last_seen: None,
                },
            ))
            .await;
        }

        match self.database().execute(Select(By::new(user_id))).await {
            Ok(count) => {
                self.publish(Envelope::to(
                    Target::Connection(registration.id),
                    Event::UnreadConversationsCount {
                        count: count.into(),
                    },
                ))
                .await;
            }
            Err(e) => log::warn!(
                "failed to count unread `Conversation`s of `User(id: \
                 {user_id})`: {e}",
            ),
        }

        Ok(registration)
    }
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

    use super::ConnectUser;

    #[tokio::test]
    async fn announces_first_connection_only() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;

        let first = svc.execute(ConnectUser { user_id: a.id }).await.unwrap();

        assert!(first.is_first);
        let status = env.events.next().await.unwrap();
        assert_eq!(status.targets, vec![Target::Everyone]);
        assert!(matches!(
            status.event,
            Event::UserStatusChange { is_online: true, .. },
        ));
        let count = env.events.next().await.unwrap();
        assert_eq!(count.targets, vec![Target::Connection(first.id)]);

        let second = svc.execute(ConnectUser { user_id: a.id }).await.unwrap();

        assert!(!second.is_first);
        let count = env.events.next().await.unwrap();
        assert_eq!(count.targets, vec![Target::Connection(second.id)]);
    }

    #[tokio::test]
    async fn reports_unread_conversations() {
        let (svc, mut env) = testing::service();
        let a = testing::user(&env.database, user::Role::User).await;
        let b = testing::user(&env.database, user::Role::User).await;
        let conv = testing::conversation(&env.database, a.id, b.id).await;
        for content in ["one", "two"] {
            drop(
                svc.execute(SendMessage {
                    conversation_id: conv.id,
                    sender_id: a.id,
                    content: content.into(),
                    kind: message::Kind::Text,
                    reply_to: None,
                })
                .await
                .unwrap(),
            );
            drop(env.events.next().await);
        }

        let conn = svc.execute(ConnectUser { user_id: b.id }).await.unwrap();

        drop(env.events.next().await);
        let count = env.events.next().await.unwrap();
        assert_eq!(count.targets, vec![Target::Connection(conn.id)]);
        assert_eq!(count.event, Event::UnreadConversationsCount { count: 1 });
    }
}

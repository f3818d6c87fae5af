//! [`RelayEvents`] [`Task`].

use std::convert::Infallible;

use common::operations::{By, Perform, Start};
use futures::StreamExt as _;
use tracing as log;

use crate::{realtime::Envelope, Service};
#[cfg(doc)]
use crate::realtime::{Bus, Registry};

use super::Task;

/// [`Task`] delivering the [`Envelope`]s published to the [`Bus`] to the
/// live connections of the local [`Registry`].
#[derive(Clone, Copy, Debug)]
pub struct RelayEvents<S> {
    /// [`Service`] instance.
    service: S,
}

impl<S> RelayEvents<S> {
    /// Creates a new [`RelayEvents`] [`Task`] on top of the provided
    /// [`Service`].
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<Db, Pg, Kv> Task<Start<By<RelayEvents<Self>, ()>>> for Service<Db, Pg, Kv>
where
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        _: Start<By<RelayEvents<Self>, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        let task = RelayEvents::new(self.clone());

        let mut envelopes = self.bus().subscribe();
        while let Some(envelope) = envelopes.next().await {
            _ = task.execute(Perform(envelope)).await?;
        }
        log::warn!("`task::RelayEvents` stopped: `Bus` is closed");
        Ok(())
    }
}

impl<Db, Pg, Kv> Task<Perform<Envelope>> for RelayEvents<Service<Db, Pg, Kv>> {
    type Ok = usize;
    type Err = Infallible;

    async fn execute(
        &self,
        Perform(envelope): Perform<Envelope>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.service.registry().deliver(envelope).await)
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Start};

    use crate::{
        domain::user,
        realtime::{Envelope, Event, Target},
        testing, Task as _,
    };

    use super::RelayEvents;

    #[tokio::test]
    async fn delivers_published_envelopes_to_connections() {
        let (svc, _env) = testing::service();
        let user_id = user::Id::new();
        let mut conn = svc.registry().register(user_id).await;
        let event = Event::UnreadConversationsCount { count: 3 };

        let relay = svc.execute(Start(By::<RelayEvents<_>, _>::new(())));
        tokio::pin!(relay);
        let received = tokio::select! {
            biased;
            _ = &mut relay => panic!("relay stopped"),
            ev = async {
                tokio::task::yield_now().await;
                svc.publish(Envelope::to(Target::User(user_id), event.clone()))
                    .await;
                conn.events.recv().await
            } => ev,
        };

        assert_eq!(received, Some(event));
    }
}

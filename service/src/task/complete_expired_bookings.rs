//! [`CompleteExpiredBookings`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{
        By, Commit, Lock, Perform, Select, Start, Transact, Transacted, Update,
    },
    DateTime,
};
use smart_default::SmartDefault;
use tokio::time::{interval_at, Instant};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, property, Booking, Property},
    infra::{database, Database},
    read, Service,
};

use super::Task;

/// Configuration for [`CompleteExpiredBookings`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between sweeps following the next UTC midnight.
    ///
    /// One more sweep is done right on start, catching up on the stays that
    /// ended while the [`Service`] was down.
    #[default(time::Duration::from_secs(24 * 60 * 60))]
    pub interval: time::Duration,
}

/// [`Task`] for completing [`booking::Status::Confirmed`] [`Booking`]s whose
/// stay is over.
#[derive(Clone, Copy, Debug)]
pub struct CompleteExpiredBookings<S> {
    /// [`Service`] instance.
    service: S,
}

impl<S> CompleteExpiredBookings<S> {
    /// Creates a new [`CompleteExpiredBookings`] [`Task`] on top of the
    /// provided [`Service`].
    #[must_use]
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<Db, Pg, Kv> Task<Start<By<CompleteExpiredBookings<Self>, Config>>>
    for Service<Db, Pg, Kv>
where
    CompleteExpiredBookings<Self>:
        Task<Perform<()>, Ok = usize, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CompleteExpiredBookings<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CompleteExpiredBookings::new(self.clone());

        let sweep = || async {
            match task.execute(Perform(())).await {
                Ok(n) => log::info!(
                    "`task::CompleteExpiredBookings` completed {n} bookings",
                ),
                Err(e) => log::error!(
                    "`task::CompleteExpiredBookings` failed: {e}",
                ),
            }
        };

        sweep().await;

        let now = DateTime::now();
        let first = Instant::now()
            + now.next_midnight().duration_since(now).unwrap_or_default();
        let mut interval = interval_at(first, config.interval);
        loop {
            _ = interval.tick().await;
            sweep().await;
        }
    }
}

impl<Db, Pg, Kv> Task<Perform<()>>
    for CompleteExpiredBookings<Service<Db, Pg, Kv>>
where
    Db: Database<
            Select<By<Vec<booking::Id>, read::booking::Expired>>,
            Ok = Vec<booking::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = usize;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let now = booking::CheckOutDateTime::now();
        let expired = self
            .service
            .database()
            .execute(Select(By::new(read::booking::Expired { at: now })))
            .await
            .map_err(tracerr::wrap!())?;

        let mut completed = 0;
        for id in expired {
            match self.complete(id, now).await {
                Ok(true) => {
                    completed += 1;
                    log::info!("`Booking(id: {id})` is completed");
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!("failed to complete `Booking(id: {id})`: {e}");
                }
            }
        }
        Ok(completed)
    }
}

impl<Db, Pg, Kv> CompleteExpiredBookings<Service<Db, Pg, Kv>>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    /// Completes the [`Booking`] with the provided ID in its own transaction.
    ///
    /// Returns `false` if the [`Booking`] has changed since it was selected
    /// and is not expired anymore.
    async fn complete(
        &self,
        id: booking::Id,
        now: booking::CheckOutDateTime,
    ) -> Result<bool, ExecutionError> {
        let db = self.service.database();
        let Some(booking) = db
            .execute(Select(By::<Option<Booking>, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(false);
        };

        let tx = db.execute(Transact).await.map_err(tracerr::wrap!())?;
        tx.execute(Lock(By::<Property, _>::new(booking.property_id)))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        let Some(mut booking) = tx
            .execute(Select(By::<Option<Booking>, _>::new(id)))
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(false);
        };
        if booking.complete(now).is_err() {
            return Ok(false);
        }
        tx.execute(Update(booking))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;
        Ok(true)
    }
}

/// Error of [`CompleteExpiredBookings`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Perform, Start};

    use crate::{
        domain::{booking, user, Booking},
        testing, Task as _,
    };

    use super::{CompleteExpiredBookings, Config};

    #[tokio::test]
    async fn completes_only_past_stays() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let p = testing::property(&env.database, landlord.id, "100NGN").await;
        let mut bookings = vec![];
        for (range, status) in [
            ((1, 3), booking::Status::Confirmed),
            ((5, 7), booking::Status::Confirmed),
            ((1, 3), booking::Status::Pending),
        ] {
            bookings.push(
                testing::booking(&env.database, &p, renter.id, range, status)
                    .await,
            );
        }
        let [past, future, pending] = [0, 1, 2].map(|i| bookings[i].id);
        let now = booking::CheckOutDateTime::now();
        env.database.with(|s| {
            for (id, out) in [
                (past, now - Booking::NIGHT),
                (future, now + Booking::NIGHT),
                (pending, now - Booking::NIGHT),
            ] {
                let b = s.bookings.get_mut(&id).unwrap();
                b.check_out = out;
                b.check_in = (out - Booking::NIGHT * 2).coerce();
            }
        });

        let task = CompleteExpiredBookings::new(svc.clone());
        assert_eq!(task.execute(Perform(())).await.unwrap(), 1);

        let status = |id| env.database.with(|s| s.bookings[&id].status);
        assert_eq!(status(past), booking::Status::Completed);
        assert_eq!(status(future), booking::Status::Confirmed);
        assert_eq!(status(pending), booking::Status::Pending);

        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_start() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let p = testing::property(&env.database, landlord.id, "100NGN").await;
        let past = testing::booking(
            &env.database,
            &p,
            renter.id,
            (1, 3),
            booking::Status::Confirmed,
        )
        .await
        .id;
        let now = booking::CheckOutDateTime::now();
        env.database.with(|s| {
            let b = s.bookings.get_mut(&past).unwrap();
            b.check_out = now - Booking::NIGHT;
            b.check_in = (now - Booking::NIGHT * 3).coerce();
        });

        let started = svc.execute(Start(By::<CompleteExpiredBookings<_>, _>::new(
            Config {
                interval: Duration::from_secs(60 * 60),
            },
        )));
        tokio::select! {
            _ = started => unreachable!("runs forever"),
            () = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        assert_eq!(
            env.database.with(|s| s.bookings[&past].status),
            booking::Status::Completed,
        );
    }
}

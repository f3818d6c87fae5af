//! [`Command`] for cancelling a [`Booking`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, property, user, Booking, Property, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Booking`], releasing its dates.
///
/// No refund is performed.
#[derive(Clone, Copy, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// ID of the [`User`] cancelling the [`Booking`].
    pub actor_id: user::Id,
}

impl CancelBooking {
    /// [`user::Role`]s allowed to cancel any [`Booking`].
    pub const ROLES: user::RoleSet = user::RoleSet::of(&[user::Role::Admin]);
}

impl<Db, Pg, Kv> Command<CancelBooking> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
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
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CancelBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
            booking_id,
            actor_id,
        } = cmd;

        let actor = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(actor_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(actor_id))
            .map_err(tracerr::wrap!())?;
        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.renter_id != actor.id && !actor.is_any_of(CancelBooking::ROLES)
        {
            return Err(tracerr::new!(E::Forbidden(actor_id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Property, _>::new(booking.property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        booking
            .cancel()
            .map_err(|e| E::InvalidState(e.from))
            .map_err(tracerr::wrap!())?;
        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!("`Booking(id: {booking_id})` is cancelled by `{actor_id}`");

        Ok(booking)
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`User`] is neither the renter nor an admin.
    #[display("`User(id: {_0})` cannot cancel this `Booking`")]
    Forbidden(#[error(not(source))] user::Id),

    /// [`Booking`] is cancelled or completed already.
    #[display("`{_0}` booking cannot be cancelled")]
    InvalidState(#[error(not(source))] booking::Status),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::Command as _,
        domain::{booking, user},
        testing,
    };

    use super::{CancelBooking, ExecutionError};

    #[tokio::test]
    async fn cancels_by_renter_or_admin() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let admin = testing::user(&env.database, user::Role::Admin).await;
        let property =
            testing::property(&env.database, landlord.id, "100NGN").await;

        for actor in [renter.id, admin.id] {
            let b = testing::booking(
                &env.database,
                &property,
                renter.id,
                (1, 4),
                booking::Status::Confirmed,
            )
            .await;
            let cancelled = svc
                .execute(CancelBooking {
                    booking_id: b.id,
                    actor_id: actor,
                })
                .await
                .unwrap();
            assert_eq!(cancelled.status, booking::Status::Cancelled);
        }
    }

    #[tokio::test]
    async fn forbids_landlord() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let property =
            testing::property(&env.database, landlord.id, "100NGN").await;
        let b = testing::booking(
            &env.database,
            &property,
            renter.id,
            (1, 4),
            booking::Status::Pending,
        )
        .await;

        let err = svc
            .execute(CancelBooking {
                booking_id: b.id,
                actor_id: landlord.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancels_once() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let property =
            testing::property(&env.database, landlord.id, "100NGN").await;
        let b = testing::booking(
            &env.database,
            &property,
            renter.id,
            (1, 4),
            booking::Status::Pending,
        )
        .await;
        let cmd = CancelBooking {
            booking_id: b.id,
            actor_id: renter.id,
        };
        drop(svc.execute(cmd).await.unwrap());

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidState(booking::Status::Cancelled),
        ));
    }
}

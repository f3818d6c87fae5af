//! [`Command`] for requesting a new [`Booking`] of a [`Property`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, payment, property, user, Booking, Property, User},
    infra::{
        database,
        payment::{self as gateway, Initialize},
        Database, PaymentGateway,
    },
    read, Service,
};

use super::Command;

/// [`Command`] for requesting a new [`Booking`] of a [`Property`].
///
/// The created [`Booking`] holds its dates until it's paid, cancelled or its
/// payment fails.
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the [`User`] renting the [`Property`].
    pub renter_id: user::Id,

    /// ID of the [`Property`] to book.
    pub property_id: property::Id,

    /// [`DateTime`] of checking in.
    pub check_in: booking::CheckInDateTime,

    /// [`DateTime`] of checking out.
    pub check_out: booking::CheckOutDateTime,

    /// Requested number of guests.
    pub guests: i32,
}

/// Output of [`CreateBooking`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Created [`Booking`].
    pub booking: Booking,

    /// URL of the hosted payment page to redirect the renter to.
    pub redirect_url: String,
}

impl<Db, Pg, Kv> Command<CreateBooking> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<Option<read::booking::Conflict>, read::booking::Availability>,
            >,
            Ok = Option<read::booking::Conflict>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Pg: PaymentGateway<
        Initialize,
        Ok = gateway::Session,
        Err = Traced<gateway::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            renter_id,
            property_id,
            check_in,
            check_out,
            guests,
        } = cmd;

        let nights = Booking::nights(check_in, check_out)
            .ok_or(E::InvalidRange)
            .map_err(tracerr::wrap!())?;
        let guests = booking::Guests::new(guests)
            .ok_or(E::InvalidGuests(guests))
            .map_err(tracerr::wrap!())?;

        let renter = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(renter_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(renter_id))
            .map_err(tracerr::wrap!())?;
        let property = self
            .database()
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(Property::is_bookable)
            .ok_or_else(|| E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;
        let total = property
            .rent
            .checked_mul(nights)
            .ok_or(E::InvalidRange)
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let booking = Booking {
            id: booking::Id::new(),
            renter_id,
            property_id,
            check_in,
            check_out,
            guests,
            total,
            status: booking::Status::Pending,
            payment_status: payment::Status::Pending,
            payment_reference: None,
            payment_id: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let conflict = tx
            .execute(Select(By::new(read::booking::Availability {
                property_id,
                check_in,
                check_out,
                scope: read::booking::Scope::Held,
                except: None,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(c) = conflict {
            return Err(tracerr::new!(E::Conflict(c.booking_id)));
        }
        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let session = self
            .payment_gateway()
            .execute(Initialize {
                email: renter.email,
                amount: total,
            })
            .await
            .map_err(|e| {
                log::warn!(
                    "failed to initialize payment of `Booking(id: {})`: {e}",
                    booking.id,
                );
                tracerr::map_from(e)
            })?;

        // The `Booking` may have been cancelled while the gateway was busy.
        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<Property, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or(booking);
        if booking.status != booking::Status::Pending {
            log::info!(
                "`Booking(id: {})` became `{}` before its payment was \
                 initialized",
                booking.id,
                booking.status,
            );
            return Err(tracerr::new!(E::InvalidState(booking.status)));
        }
        booking.payment_reference = Some(session.reference);
        booking.updated_at = DateTime::now().coerce();
        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Booking(id: {})` of `Property(id: {property_id})` is awaiting \
             payment",
            booking.id,
        );

        Ok(Output {
            booking,
            redirect_url: session.redirect_url,
        })
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`PaymentGateway`] error.
    #[display("`PaymentGateway` operation failed: {_0}")]
    PaymentGateway(gateway::Error),

    /// Check-out is not after check-in.
    #[display("Check-out must be at least one night after check-in")]
    InvalidRange,

    /// Number of guests is not positive.
    #[display("Invalid number of guests: {_0}")]
    #[from(ignore)]
    InvalidGuests(#[error(not(source))] i32),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`Property`] with the provided ID does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// Requested dates are held by another [`Booking`].
    #[display("Dates are already booked by `Booking(id: {_0})`")]
    #[from(ignore)]
    Conflict(#[error(not(source))] booking::Id),

    /// Created [`Booking`] left the pending state before its payment was
    /// initialized.
    #[display("`{_0}` booking cannot await payment")]
    #[from(ignore)]
    InvalidState(#[error(not(source))] booking::Status),
}

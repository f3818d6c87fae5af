//! [`Command`] for confirming a [`Booking`] by verifying its payment.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, payment, property, Booking, Payment, Property},
    infra::{
        database,
        payment::{self as gateway, Verify},
        Database, PaymentGateway,
    },
    read, Service,
};

use super::Command;

/// [`Command`] for confirming a [`Booking`] by verifying its payment in the
/// [`PaymentGateway`].
///
/// Replaying it for an already paid [`Booking`] returns the current state
/// without recording the [`Payment`] twice.
#[derive(Clone, Debug)]
pub struct ConfirmBookingPayment {
    /// [`payment::Reference`] returned by the [`PaymentGateway`].
    pub reference: payment::Reference,
}

/// Output of [`ConfirmBookingPayment`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Current state of the [`Booking`].
    pub booking: Booking,

    /// [`Payment`] of the [`Booking`], if it's paid.
    pub payment: Option<Payment>,

    /// [`Outcome`] of the verification.
    pub outcome: Outcome,
}

/// Outcome of a [`ConfirmBookingPayment`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// [`Booking`] has been paid and confirmed.
    Confirmed,

    /// [`Booking`] was paid before.
    AlreadyPaid,

    /// [`PaymentGateway`] reported the payment as not successful.
    Failed,
}

impl<Db, Pg, Kv> Command<ConfirmBookingPayment> for Service<Db, Pg, Kv>
where
    Db: for<'r> Database<
            Select<By<Option<Booking>, &'r payment::Reference>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<Option<read::booking::Conflict>, read::booking::Availability>,
            >,
            Ok = Option<read::booking::Conflict>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Pg: PaymentGateway<
        Verify,
        Ok = gateway::Transaction,
        Err = Traced<gateway::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ConfirmBookingPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmBookingPayment { reference } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(&reference)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::BookingNotExists(reference.clone()))
            .map_err(tracerr::wrap!())?;

        if booking.payment_status == payment::Status::Paid {
            let payment = match booking.payment_id {
                Some(id) => self
                    .database()
                    .execute(Select(By::<Option<Payment>, _>::new(id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?,
                None => None,
            };
            return Ok(Output {
                booking,
                payment,
                outcome: Outcome::AlreadyPaid,
            });
        }
        if matches!(
            booking.status,
            booking::Status::Cancelled | booking::Status::Completed,
        ) {
            return Err(tracerr::new!(E::InvalidState(booking.status)));
        }

        let transaction = self
            .payment_gateway()
            .execute(Verify(reference.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

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
            .execute(Select(By::<Option<Booking>, _>::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::BookingNotExists(reference.clone()))
            .map_err(tracerr::wrap!())?;

        if booking.payment_status == payment::Status::Paid {
            let payment = match booking.payment_id {
                Some(id) => tx
                    .execute(Select(By::<Option<Payment>, _>::new(id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?,
                None => None,
            };
            return Ok(Output {
                booking,
                payment,
                outcome: Outcome::AlreadyPaid,
            });
        }

        if !transaction.is_success() {
            booking
                .fail_payment()
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

            log::info!(
                "payment `{reference}` of `Booking(id: {})` failed with \
                 `{}` status",
                booking.id,
                transaction.status,
            );

            return Ok(Output {
                booking,
                payment: None,
                outcome: Outcome::Failed,
            });
        }

        let amount = transaction.amount(self.config().payment_currency);
        if amount != booking.total {
            log::warn!(
                "`Booking(id: {})` costs `{}`, but `{amount}` was paid",
                booking.id,
                booking.total,
            );
        }
        let payment = Payment {
            id: payment::Id::new(),
            user_id: booking.renter_id,
            booking_id: booking.id,
            amount,
            reference: reference.clone(),
            status: payment::Status::Paid,
            gateway: payment::Gateway::Paystack,
            channel: transaction.channel,
            paid_at: transaction.paid_at,
            created_at: payment::CreationDateTime::now(),
        };
        booking
            .record_payment(payment.id)
            .map_err(|e| E::InvalidState(e.from))
            .map_err(tracerr::wrap!())?;
        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let conflict = tx
            .execute(Select(By::new(read::booking::Availability {
                property_id: booking.property_id,
                check_in: booking.check_in,
                check_out: booking.check_out,
                scope: read::booking::Scope::Confirmed,
                except: Some(booking.id),
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(c) = conflict {
            tx.execute(Update(booking.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
            tx.execute(Commit)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            log::warn!(
                "`Booking(id: {})` is paid by `Payment(id: {})`, but its \
                 dates are taken by `Booking(id: {})`, refund is required",
                booking.id,
                payment.id,
                c.booking_id,
            );

            return Err(tracerr::new!(E::Conflict(c.booking_id)));
        }

        booking
            .confirm()
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

        log::info!(
            "`Booking(id: {})` is confirmed by `Payment(id: {})`",
            booking.id,
            payment.id,
        );

        Ok(Output {
            booking,
            payment: Some(payment),
            outcome: Outcome::Confirmed,
        })
    }
}

/// Error of [`ConfirmBookingPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`PaymentGateway`] error.
    #[display("`PaymentGateway` operation failed: {_0}")]
    PaymentGateway(gateway::Error),

    /// No [`Booking`] holds the provided [`payment::Reference`].
    #[display("No `Booking` with `{_0}` payment reference")]
    #[from(ignore)]
    BookingNotExists(#[error(not(source))] payment::Reference),

    /// [`Booking`] cannot be confirmed in its current [`booking::Status`].
    #[display("`{_0}` booking cannot be confirmed")]
    #[from(ignore)]
    InvalidState(#[error(not(source))] booking::Status),

    /// Dates of the paid [`Booking`] are confirmed for another one.
    #[display("Dates are already confirmed for `Booking(id: {_0})`")]
    #[from(ignore)]
    Conflict(#[error(not(source))] booking::Id),
}

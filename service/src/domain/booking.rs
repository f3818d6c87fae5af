//! [`Booking`] definitions.

use std::time::Duration;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{payment, property, user};
#[cfg(doc)]
use crate::domain::{Payment, Property, User};

/// Reservation of a [`Property`] by a renter for a range of nights.
///
/// The [`Booking`] lifecycle is modeled jointly by its [`Status`] and its
/// [`payment::Status`]:
/// - it's created as ([`Status::Pending`], [`payment::Status::Pending`]);
/// - it becomes [`Status::Confirmed`] only once its payment is
///   [`payment::Status::Paid`];
/// - it's never removed, [`Status::Cancelled`] is just another state.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the [`User`] renting the [`Property`].
    pub renter_id: user::Id,

    /// ID of the booked [`Property`].
    pub property_id: property::Id,

    /// [`DateTime`] of checking in.
    pub check_in: CheckInDateTime,

    /// [`DateTime`] of checking out.
    ///
    /// Always strictly after the [`Booking::check_in`].
    pub check_out: CheckOutDateTime,

    /// Number of [`Guests`].
    pub guests: Guests,

    /// Total amount to pay for this [`Booking`].
    pub total: Money,

    /// [`Status`] of this [`Booking`].
    pub status: Status,

    /// [`payment::Status`] of this [`Booking`].
    pub payment_status: payment::Status,

    /// [`payment::Reference`] issued by a payment gateway for this
    /// [`Booking`], if any.
    pub payment_reference: Option<payment::Reference>,

    /// ID of the [`Payment`] paying this [`Booking`], if any.
    pub payment_id: Option<payment::Id>,

    /// [`DateTime`] when this [`Booking`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was updated last time.
    pub updated_at: UpdateDateTime,
}

impl Booking {
    /// Length of a single night.
    pub const NIGHT: Duration = Duration::from_secs(24 * 60 * 60);

    /// Calculates the number of nights between the provided dates, rounding
    /// partial nights up.
    ///
    /// [`None`] is returned if the range is empty or reversed.
    #[must_use]
    pub fn nights(
        check_in: CheckInDateTime,
        check_out: CheckOutDateTime,
    ) -> Option<u32> {
        let stay = check_out.duration_since(check_in)?;
        let nights = stay.as_micros().div_ceil(Self::NIGHT.as_micros());
        u32::try_from(nights).ok().filter(|n| *n > 0)
    }

    /// Checks whether this [`Booking`] overlaps the provided half-open date
    /// range.
    #[must_use]
    pub fn overlaps(
        &self,
        check_in: CheckInDateTime,
        check_out: CheckOutDateTime,
    ) -> bool {
        self.check_in.coerce() < check_out && self.check_out.coerce() > check_in
    }

    /// Indicates whether this [`Booking`] holds its dates for new requests.
    ///
    /// A [`Booking`] is holding when it's [`Status::Confirmed`], or when it's
    /// [`Status::Pending`] and its payment has not failed.
    #[must_use]
    pub fn is_holding(&self) -> bool {
        match self.status {
            Status::Confirmed => true,
            Status::Pending => self.payment_status != payment::Status::Failed,
            Status::Cancelled | Status::Completed => false,
        }
    }

    /// Records the provided paid [`Payment`] for this [`Booking`].
    ///
    /// Doesn't confirm this [`Booking`] on its own.
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Pending`].
    pub fn record_payment(
        &mut self,
        payment_id: payment::Id,
    ) -> Result<(), InvalidTransition> {
        self.ensure(Status::Pending, Status::Confirmed)?;
        self.payment_status = payment::Status::Paid;
        self.payment_id = Some(payment_id);
        self.touch();
        Ok(())
    }

    /// Marks the payment of this [`Booking`] as [`payment::Status::Failed`].
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Pending`] or is paid already.
    pub fn fail_payment(&mut self) -> Result<(), InvalidTransition> {
        self.ensure(Status::Pending, Status::Pending)?;
        if self.payment_status == payment::Status::Paid {
            return Err(InvalidTransition {
                from: self.status,
                to: Status::Pending,
            });
        }
        self.payment_status = payment::Status::Failed;
        self.touch();
        Ok(())
    }

    /// Confirms this [`Booking`].
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Pending`] or is not paid yet.
    pub fn confirm(&mut self) -> Result<(), InvalidTransition> {
        self.ensure(Status::Pending, Status::Confirmed)?;
        if self.payment_status != payment::Status::Paid {
            return Err(InvalidTransition {
                from: self.status,
                to: Status::Confirmed,
            });
        }
        self.status = Status::Confirmed;
        self.touch();
        Ok(())
    }

    /// Cancels this [`Booking`].
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is [`Status::Cancelled`] or [`Status::Completed`]
    /// already.
    pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
        match self.status {
            Status::Pending | Status::Confirmed => {
                self.status = Status::Cancelled;
                self.touch();
                Ok(())
            }
            Status::Cancelled | Status::Completed => Err(InvalidTransition {
                from: self.status,
                to: Status::Cancelled,
            }),
        }
    }

    /// Completes this [`Booking`] if its stay is over at the provided moment.
    ///
    /// # Errors
    ///
    /// If this [`Booking`] is not [`Status::Confirmed`] or its stay is not
    /// over yet.
    pub fn complete(
        &mut self,
        now: CheckOutDateTime,
    ) -> Result<(), InvalidTransition> {
        self.ensure(Status::Confirmed, Status::Completed)?;
        if self.check_out >= now {
            return Err(InvalidTransition {
                from: self.status,
                to: Status::Completed,
            });
        }
        self.status = Status::Completed;
        self.touch();
        Ok(())
    }

    /// Ensures this [`Booking`] is in the `expected` [`Status`] before moving
    /// it to the `to` one.
    fn ensure(
        &self,
        expected: Status,
        to: Status,
    ) -> Result<(), InvalidTransition> {
        if self.status == expected {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    /// Bumps the [`Booking::updated_at`] of this [`Booking`].
    fn touch(&mut self) {
        self.updated_at = UpdateDateTime::now();
    }
}

/// ID of a [`Booking`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Number of guests of a [`Booking`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Into, Ord, PartialEq, PartialOrd)]
pub struct Guests(u16);

impl Guests {
    /// Creates new [`Guests`] if the given `count` is valid.
    #[must_use]
    pub fn new(count: impl TryInto<u16>) -> Option<Self> {
        count.try_into().ok().filter(|c| *c >= 1).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl<'a> FromSql<'a> for Guests {
    postgres_types::accepts!(INT2);

    fn from_sql(
        ty: &postgres_types::Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let count = i16::from_sql(ty, raw)?;
        Self::new(count).ok_or_else(|| {
            format!("invalid `Guests` count: {count}").into()
        })
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Guests {
    postgres_types::accepts!(INT2);
    postgres_types::to_sql_checked!();

    fn to_sql(
        &self,
        ty: &postgres_types::Type,
        w: &mut postgres_types::private::BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>>
    {
        i16::try_from(self.0)?.to_sql(ty, w)
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "[`Booking`] awaits its payment."]
        Pending = 1,

        #[doc = "[`Booking`] is paid and its dates are reserved."]
        Confirmed = 2,

        #[doc = "[`Booking`] was cancelled."]
        Cancelled = 3,

        #[doc = "Stay of the [`Booking`] is over."]
        Completed = 4,
    }
}

/// Error of an invalid [`Booking`] [`Status`] transition.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("`Booking` cannot transition from `{from}` to `{to}`")]
pub struct InvalidTransition {
    /// [`Status`] the transition was attempted from.
    #[error(not(source))]
    pub from: Status,

    /// [`Status`] the transition was attempted to.
    #[error(not(source))]
    pub to: Status,
}

/// Marker type describing a check-in.
#[derive(Clone, Copy, Debug)]
pub struct CheckIn;

/// Marker type describing a check-out.
#[derive(Clone, Copy, Debug)]
pub struct CheckOut;

/// [`DateTime`] of checking in.
pub type CheckInDateTime = DateTimeOf<(Booking, CheckIn)>;

/// [`DateTime`] of checking out.
pub type CheckOutDateTime = DateTimeOf<(Booking, CheckOut)>;

/// [`DateTime`] when a [`Booking`] was created.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] was updated.
pub type UpdateDateTime = DateTimeOf<(Booking, unit::Edition)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{DateTime, Money};

    use crate::domain::{payment, property, user};

    use super::{Booking, Guests, Id, Status};

    fn day(n: u64) -> DateTime {
        DateTime::from_rfc3339("2024-05-01T00:00:00Z").unwrap()
            + Booking::NIGHT * u32::try_from(n).unwrap()
    }

    fn booking(from: u64, to: u64) -> Booking {
        Booking {
            id: Id::new(),
            renter_id: user::Id::new(),
            property_id: property::Id::new(),
            check_in: day(from).coerce(),
            check_out: day(to).coerce(),
            guests: Guests::new(1).unwrap(),
            total: "300NGN".parse::<Money>().unwrap(),
            status: Status::Pending,
            payment_status: payment::Status::Pending,
            payment_reference: None,
            payment_id: None,
            created_at: DateTime::now().coerce(),
            updated_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn counts_nights() {
        assert_eq!(Booking::nights(day(1).coerce(), day(4).coerce()), Some(3));
        assert_eq!(
            Booking::nights(
                day(1).coerce(),
                (day(1) + Duration::from_secs(3600)).coerce(),
            ),
            Some(1),
        );
        assert_eq!(Booking::nights(day(1).coerce(), day(1).coerce()), None);
        assert_eq!(Booking::nights(day(4).coerce(), day(1).coerce()), None);
    }

    #[test]
    fn overlaps_half_open_ranges() {
        let b = booking(1, 4);

        assert!(b.overlaps(day(3).coerce(), day(6).coerce()));
        assert!(b.overlaps(day(0).coerce(), day(2).coerce()));
        assert!(b.overlaps(day(2).coerce(), day(3).coerce()));
        assert!(!b.overlaps(day(4).coerce(), day(6).coerce()));
        assert!(!b.overlaps(day(0).coerce(), day(1).coerce()));
    }

    #[test]
    fn requires_guests() {
        assert!(Guests::new(0).is_none());
        assert!(Guests::new(-1).is_none());
        assert_eq!(Guests::new(2).map(u16::from), Some(2));
    }

    #[test]
    fn confirms_only_when_paid() {
        let mut b = booking(1, 4);
        assert!(b.confirm().is_err());

        b.record_payment(payment::Id::new()).unwrap();
        assert_eq!(b.status, Status::Pending);
        b.confirm().unwrap();
        assert_eq!(b.status, Status::Confirmed);
        assert_eq!(b.payment_status, payment::Status::Paid);

        assert!(b.fail_payment().is_err());
        assert!(b.record_payment(payment::Id::new()).is_err());
    }

    #[test]
    fn fails_payment_without_confirming() {
        let mut b = booking(1, 4);
        assert!(b.is_holding());

        b.fail_payment().unwrap();
        assert_eq!(b.status, Status::Pending);
        assert_eq!(b.payment_status, payment::Status::Failed);
        assert!(!b.is_holding());
    }

    #[test]
    fn cancels_once() {
        let mut b = booking(1, 4);
        b.cancel().unwrap();
        assert_eq!(b.status, Status::Cancelled);
        assert!(b.cancel().is_err());

        let mut b = booking(1, 4);
        b.status = Status::Completed;
        assert!(b.cancel().is_err());
    }

    #[test]
    fn completes_only_after_checkout() {
        let mut b = booking(1, 4);
        b.status = Status::Confirmed;

        assert!(b.complete(day(3).coerce()).is_err());
        assert!(b.complete(day(4).coerce()).is_err());
        b.complete(day(5).coerce()).unwrap();
        assert_eq!(b.status, Status::Completed);
    }
}

//! [`Payment`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{booking, user};
#[cfg(doc)]
use crate::domain::{Booking, User};

/// Verified payment of a [`Booking`].
///
/// Created once per successfully verified [`Reference`] and never changed
/// afterwards, except its [`Status`].
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`User`] who paid.
    pub user_id: user::Id,

    /// ID of the paid [`Booking`].
    pub booking_id: booking::Id,

    /// Paid amount, as reported by the [`Gateway`].
    pub amount: Money,

    /// [`Reference`] of this [`Payment`] in the [`Gateway`].
    pub reference: Reference,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`Gateway`] processed this [`Payment`].
    pub gateway: Gateway,

    /// [`Channel`] this [`Payment`] was made through, if known.
    pub channel: Option<Channel>,

    /// [`DateTime`] when this [`Payment`] was paid, if known.
    pub paid_at: Option<PaidDateTime>,

    /// [`DateTime`] when this [`Payment`] was recorded.
    pub created_at: CreationDateTime,
}

/// ID of a [`Payment`].
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
    PartialEq,
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

/// Reference of a payment transaction issued by a [`Gateway`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Maximum length of a [`Reference`].
    pub const MAX_LEN: usize = 100;

    /// Creates a new [`Reference`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reference` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Creates a new [`Reference`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        Self::check(&reference).then_some(Self(reference))
    }

    /// Checks whether the given `reference` is a valid [`Reference`].
    fn check(reference: &str) -> bool {
        !reference.is_empty()
            && reference.len() <= Self::MAX_LEN
            && reference.bytes().all(|b| b.is_ascii_graphic())
    }
}

impl FromStr for Reference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reference`")
    }
}

/// Channel (card, bank transfer, USSD, etc) a [`Payment`] was made through.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Channel(String);

impl Channel {
    /// Creates a new [`Channel`] if the given `channel` is not blank.
    #[must_use]
    pub fn new(channel: impl AsRef<str>) -> Option<Self> {
        let channel = channel.as_ref().trim();
        (!channel.is_empty() && channel.len() <= 64)
            .then(|| Self(channel.to_owned()))
    }
}

define_kind! {
    #[doc = "Status of a payment."]
    enum Status {
        #[doc = "Payment is not verified yet."]
        Pending = 1,

        #[doc = "Payment is verified as successful."]
        Paid = 2,

        #[doc = "Payment verification failed."]
        Failed = 3,
    }
}

define_kind! {
    #[doc = "Payment gateway processing a [`Payment`]."]
    enum Gateway {
        #[doc = "[Paystack](https://paystack.com) gateway."]
        Paystack = 1,
    }
}

/// [`DateTime`] when a [`Payment`] was paid.
pub type PaidDateTime = DateTimeOf<(Payment, Paid)>;

/// Marker type describing a payment settlement.
#[derive(Clone, Copy, Debug)]
pub struct Paid;

/// [`DateTime`] when a [`Payment`] was recorded.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::Reference;

    #[test]
    fn checks_reference() {
        assert!(Reference::new("T123-abc_456").is_some());
        assert!(Reference::new("").is_none());
        assert!(Reference::new("with space").is_none());
        assert!(Reference::new("ключ").is_none());
        assert!(Reference::new("x".repeat(101)).is_none());
        assert!(Reference::new("x".repeat(100)).is_some());
    }
}

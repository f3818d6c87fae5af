//! [`Property`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;
#[cfg(doc)]
use crate::domain::User;

/// Property listed for rent by a landlord.
#[derive(Clone, Debug)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: Id,

    /// ID of the [`User`] owning this [`Property`].
    pub landlord_id: user::Id,

    /// [`Title`] of this [`Property`].
    pub title: Title,

    /// [`Location`] of this [`Property`].
    pub location: Location,

    /// [`Description`] of this [`Property`], if any.
    pub description: Option<Description>,

    /// Nightly rent of this [`Property`].
    pub rent: Money,

    /// [`DateTime`] when this [`Property`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Property`] was deleted, if it was.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Property {
    /// Indicates whether this [`Property`] may be booked.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// ID of a [`Property`].
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

/// Title of a [`Property`] listing.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `title` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    /// Creates a new [`Title`] if the given `title` is valid.
    ///
    /// Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(title: impl AsRef<str>) -> Option<Self> {
        let title = title.as_ref().trim();
        Self::check(title).then(|| Self(title.to_owned()))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: &str) -> bool {
        !title.is_empty() && title.chars().count() <= 512
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Location (address, area or city) of a [`Property`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Location(String);

impl Location {
    /// Creates a new [`Location`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `location` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Creates a new [`Location`] if the given `location` is valid.
    ///
    /// Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(location: impl AsRef<str>) -> Option<Self> {
        let location = location.as_ref().trim();
        Self::check(location).then(|| Self(location.to_owned()))
    }

    /// Checks whether the given `location` is a valid [`Location`].
    fn check(location: &str) -> bool {
        !location.is_empty() && location.chars().count() <= 512
    }
}

impl FromStr for Location {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Location`")
    }
}

/// Free-form description of a [`Property`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Description(String);

impl Description {
    /// Maximum number of characters in a [`Description`].
    pub const MAX_LEN: usize = 10_000;

    /// Creates a new [`Description`] if the given `text` is valid.
    ///
    /// Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Option<Self> {
        let text = text.as_ref().trim();
        (!text.is_empty() && text.chars().count() <= Self::MAX_LEN)
            .then(|| Self(text.to_owned()))
    }
}

impl FromStr for Description {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Description`")
    }
}

/// [`DateTime`] when a [`Property`] was created.
pub type CreationDateTime = DateTimeOf<(Property, unit::Creation)>;

/// [`DateTime`] when a [`Property`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Property, unit::Deletion)>;

#[cfg(test)]
mod spec {
    use super::{Description, Location, Title};

    #[test]
    fn trims_texts() {
        assert_eq!(Title::new("  Loft ").unwrap().to_string(), "Loft");
        assert_eq!(Location::new("\tLagos\n").unwrap().to_string(), "Lagos");

        assert!(Title::new("  ").is_none());
        assert!(Location::new("").is_none());
        assert!(Description::new(" ").is_none());
        assert!(Title::new("x".repeat(513)).is_none());
    }
}

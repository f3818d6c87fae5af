//! [`Booking`]-related read definitions.

use crate::domain::{booking, property, Booking};
#[cfg(doc)]
use crate::domain::{payment, Property};

/// Set of [`Booking`]s occupying their dates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    /// Only [`booking::Status::Confirmed`] [`Booking`]s.
    Confirmed,

    /// [`booking::Status::Confirmed`] [`Booking`]s along with the
    /// [`booking::Status::Pending`] ones whose payment hasn't
    /// [`payment::Status::Failed`].
    Held,
}

/// Availability check of a [`Property`] for a half-open date range.
#[derive(Clone, Copy, Debug)]
pub struct Availability {
    /// ID of the checked [`Property`].
    pub property_id: property::Id,

    /// Start of the checked range (inclusive).
    pub check_in: booking::CheckInDateTime,

    /// End of the checked range (exclusive).
    pub check_out: booking::CheckOutDateTime,

    /// [`Scope`] of the [`Booking`]s to check against.
    pub scope: Scope,

    /// ID of the [`Booking`] to ignore, if any.
    pub except: Option<booking::Id>,
}

impl Availability {
    /// Checks whether the provided [`Booking`] conflicts with this
    /// [`Availability`] check.
    #[must_use]
    pub fn is_conflicting(&self, other: &Booking) -> bool {
        other.property_id == self.property_id
            && Some(other.id) != self.except
            && match self.scope {
                Scope::Confirmed => other.status == booking::Status::Confirmed,
                Scope::Held => other.is_holding(),
            }
            && other.overlaps(self.check_in, self.check_out)
    }
}

/// [`Booking`] conflicting with an [`Availability`] check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Conflict {
    /// ID of the conflicting [`Booking`].
    pub booking_id: booking::Id,
}

/// Selector of [`booking::Status::Confirmed`] [`Booking`]s whose stay is over.
#[derive(Clone, Copy, Debug)]
pub struct Expired {
    /// Moment the stays should be over at.
    pub at: booking::CheckOutDateTime,
}

pub mod list {
    //! [`Booking`] list definitions.

    use common::define_pagination;
    use derive_more::{From, Into};

    use crate::domain::{booking, user};
    #[cfg(doc)]
    use crate::domain::{Booking, User};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = booking::Id;

    /// Cursor pointing to a specific [`Booking`] in a list.
    pub type Cursor = booking::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// ID of the [`User`] renting the listed [`Booking`]s.
        ///
        /// [`None`] means all the [`Booking`]s.
        pub renter_id: Option<user::Id>,

        /// [`booking::Status`] of the listed [`Booking`]s.
        pub status: Option<booking::Status>,
    }

    /// Total count of [`Booking`] list items.
    #[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
    pub struct TotalCount(i32);
}

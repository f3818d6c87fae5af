//! [`Property`]-related read definitions.

#[cfg(doc)]
use crate::domain::Property;

pub mod list {
    //! [`Property`] list definitions.

    use common::define_pagination;
    use derive_more::{From, Into};

    use crate::domain::{property, user};
    #[cfg(doc)]
    use crate::domain::{Property, User};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = property::Id;

    /// Cursor pointing to a specific [`Property`] in a list.
    pub type Cursor = property::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Debug, Default)]
    pub struct Filter {
        /// ID of the [`User`] owning the listed [`Property`]s.
        pub landlord_id: Option<user::Id>,

        /// Text to fuzzy search for in [`property::Title`]s and
        /// [`property::Location`]s.
        pub search: Option<property::Title>,
    }

    /// Total count of [`Property`] list items.
    #[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
    pub struct TotalCount(i32);
}

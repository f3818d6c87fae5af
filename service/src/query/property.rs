//! [`Query`] collection related to a single [`Property`].

use common::operations::By;

use crate::{
    domain::{property, Property},
    read,
};
#[cfg(doc)]
use crate::{domain::Booking, Query};

use super::DatabaseQuery;

/// Queries a [`Property`] by its [`property::Id`].
pub type ById = DatabaseQuery<By<Option<Property>, property::Id>>;

/// Queries a [`Booking`] conflicting with the provided
/// [`read::booking::Availability`] check, if any.
pub type Availability = DatabaseQuery<
    By<Option<read::booking::Conflict>, read::booking::Availability>,
>;

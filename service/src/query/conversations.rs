//! [`Query`] collection related to the multiple [`Conversation`]s.

use common::operations::By;

use crate::{
    domain::{user, Conversation},
    read,
};
#[cfg(doc)]
use crate::{
    domain::{Message, User},
    Query,
};

use super::DatabaseQuery;

/// Queries a list of [`Conversation`]s of a [`User`].
pub type List =
    DatabaseQuery<By<Vec<Conversation>, read::conversation::List>>;

/// Queries number of [`Conversation`]s having [`Message`]s unread by a
/// [`User`].
pub type Unread = DatabaseQuery<By<read::conversation::Unread, user::Id>>;

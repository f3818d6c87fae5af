//! [`Query`] collection related to the multiple [`Message`]s.

use std::collections::HashMap;

use common::operations::By;

use crate::{
    domain::{message, Message},
    read,
};
#[cfg(doc)]
use crate::{
    domain::{Conversation, User},
    Query,
};

use super::DatabaseQuery;

/// Queries multiple [`Message`]s by their [`message::Id`]s.
pub type ByIds =
    DatabaseQuery<By<HashMap<message::Id, Message>, Vec<message::Id>>>;

/// Queries a list of non-deleted [`Message`]s of a [`Conversation`].
pub type List =
    DatabaseQuery<By<read::message::list::Page, read::message::list::Selector>>;

/// Queries number of [`Message`]s in a [`Conversation`] unread by a
/// [`User`].
///
/// Derived from the [`message::Receipt`]s, never cached.
pub type UnreadCount =
    DatabaseQuery<By<read::message::UnreadCount, read::message::Unread>>;

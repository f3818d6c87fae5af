//! [`Conversation`]-related read definitions.

use derive_more::{From, Into};

use crate::domain::{conversation, user};
#[cfg(doc)]
use crate::domain::{Conversation, Message, User};

/// Selector of the [`Conversation`]s of a [`User`], most recently active
/// first.
///
/// [`Conversation`]s deleted by the [`User`] are omitted.
#[derive(Clone, Copy, Debug)]
pub struct List {
    /// ID of the participating [`User`].
    pub user_id: user::Id,

    /// [`conversation::Status`] to filter by, if any.
    pub status: Option<conversation::Status>,

    /// [`conversation::Kind`] to filter by, if any.
    pub kind: Option<conversation::Kind>,

    /// Maximum number of [`Conversation`]s to select.
    pub limit: usize,
}

/// Number of [`Conversation`]s having unread [`Message`]s for a [`User`].
#[derive(Clone, Copy, Debug, Default, Eq, From, Hash, Into, PartialEq)]
pub struct Unread(u32);

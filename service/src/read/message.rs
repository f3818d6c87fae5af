//! [`Message`]-related read definitions.

use derive_more::{From, Into};

use crate::domain::{conversation, message, user};
#[cfg(doc)]
use crate::domain::{Conversation, Message, User};

/// Selector of non-deleted [`Message`]s in a [`Conversation`] not read by a
/// [`User`] yet (excluding the ones sent by the [`User`]).
#[derive(Clone, Copy, Debug)]
pub struct Unread {
    /// ID of the [`Conversation`] the [`Message`]s belong to.
    pub conversation_id: conversation::Id,

    /// ID of the reading [`User`].
    pub reader_id: user::Id,

    /// ID of the only [`Message`] to consider, if any.
    pub message_id: Option<message::Id>,
}

impl Unread {
    /// Creates a new [`Unread`] selector of all the [`Message`]s in the
    /// provided [`Conversation`].
    #[must_use]
    pub fn all(conversation_id: conversation::Id, reader_id: user::Id) -> Self {
        Self {
            conversation_id,
            reader_id,
            message_id: None,
        }
    }
}

/// Number of [`Message`]s selected by an [`Unread`] selector.
#[derive(Clone, Copy, Debug, Default, Eq, From, Hash, Into, PartialEq)]
pub struct UnreadCount(u32);

pub mod list {
    //! [`Message`] list definitions.

    use common::define_pagination;

    use crate::domain::{conversation, message};
    #[cfg(doc)]
    use crate::domain::{Conversation, Message};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = message::Id;

    /// Cursor pointing to a specific [`Message`] in a list.
    ///
    /// Unique within a [`Conversation`].
    pub type Cursor = message::CreationDateTime;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug)]
    pub struct Filter {
        /// ID of the [`Conversation`] the listed [`Message`]s belong to.
        pub conversation_id: conversation::Id,
    }
}

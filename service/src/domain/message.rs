//! [`Message`] definitions.

use std::time::Duration;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{conversation, user};
#[cfg(doc)]
use crate::domain::{Conversation, User};

/// Chat message in a [`Conversation`].
#[derive(Clone, Debug)]
pub struct Message {
    /// ID of this [`Message`].
    pub id: Id,

    /// ID of the [`Conversation`] this [`Message`] belongs to.
    pub conversation_id: conversation::Id,

    /// ID of the [`User`] who sent this [`Message`].
    pub sender_id: user::Id,

    /// ID of the [`User`] this [`Message`] is addressed to, if any.
    pub recipient_id: Option<user::Id>,

    /// [`Content`] of this [`Message`].
    pub content: Content,

    /// [`Kind`] of this [`Message`].
    pub kind: Kind,

    /// [`Status`] of this [`Message`].
    pub status: Status,

    /// ID of the [`Message`] this one replies to, if any.
    pub reply_to: Option<Id>,

    /// [`DateTime`] when this [`Message`] was sent.
    ///
    /// Strictly increases within a [`Conversation`].
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Message`] was edited last time, if it was.
    pub edited_at: Option<EditionDateTime>,

    /// [`DateTime`] when this [`Message`] was deleted, if it was.
    pub deleted_at: Option<DeletionDateTime>,

    /// ID of the [`User`] who deleted this [`Message`], if any.
    pub deleted_by: Option<user::Id>,
}

impl Message {
    /// Period after sending a [`Message`] during which its sender may edit or
    /// delete it.
    pub const MODIFICATION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

    /// Indicates whether this [`Message`] is deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Checks whether the provided [`User`] may modify this [`Message`] at
    /// the provided moment.
    ///
    /// The [`Message::MODIFICATION_WINDOW`] is inclusive.
    ///
    /// # Errors
    ///
    /// - [`ModificationError::Deleted`] if this [`Message`] is deleted;
    /// - [`ModificationError::NotSender`] if the [`User`] is not its sender;
    /// - [`ModificationError::Expired`] if the window has elapsed.
    pub fn ensure_modifiable(
        &self,
        by: user::Id,
        at: CreationDateTime,
    ) -> Result<(), ModificationError> {
        if self.is_deleted() {
            return Err(ModificationError::Deleted(self.id));
        }
        if self.sender_id != by {
            return Err(ModificationError::NotSender(by));
        }
        let age = at.duration_since(self.created_at).unwrap_or_default();
        if age > Self::MODIFICATION_WINDOW {
            return Err(ModificationError::Expired(self.id));
        }
        Ok(())
    }

    /// Edits this [`Message`] by the provided [`User`].
    ///
    /// # Errors
    ///
    /// See [`Message::ensure_modifiable()`].
    pub fn edit(
        &mut self,
        content: Content,
        by: user::Id,
    ) -> Result<(), ModificationError> {
        let now = EditionDateTime::now();
        self.ensure_modifiable(by, now.coerce())?;
        self.content = content;
        self.edited_at = Some(now);
        Ok(())
    }

    /// Deletes this [`Message`] by the provided [`User`], replacing its
    /// [`Content`] with the [`Content::deleted()`] placeholder.
    ///
    /// # Errors
    ///
    /// See [`Message::ensure_modifiable()`].
    pub fn delete(&mut self, by: user::Id) -> Result<(), ModificationError> {
        let now = DeletionDateTime::now();
        self.ensure_modifiable(by, now.coerce())?;
        self.content = Content::deleted();
        self.deleted_at = Some(now);
        self.deleted_by = Some(by);
        Ok(())
    }
}

/// Error of modifying a [`Message`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ModificationError {
    /// [`Message`] is deleted already.
    #[display("`Message(id: {_0})` is deleted")]
    Deleted(#[error(not(source))] Id),

    /// [`User`] is not the sender of the [`Message`].
    #[display("`User(id: {_0})` is not the `Message` sender")]
    NotSender(#[error(not(source))] user::Id),

    /// [`Message::MODIFICATION_WINDOW`] has elapsed.
    #[display("`Message(id: {_0})` cannot be modified anymore")]
    Expired(#[error(not(source))] Id),
}

/// ID of a [`Message`].
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

/// Content of a [`Message`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Content(String);

impl Content {
    /// Maximum number of characters in a [`Content`].
    pub const MAX_LEN: usize = 5000;

    /// Placeholder replacing the [`Content`] of a deleted [`Message`].
    pub const DELETED: &'static str = "This message was deleted";

    /// Creates a new [`Content`] if the given `text` is valid.
    ///
    /// Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Option<Self> {
        let text = text.as_ref().trim();
        (!text.is_empty() && text.chars().count() <= Self::MAX_LEN)
            .then(|| Self(text.to_owned()))
    }

    /// Returns the [`Content`] of a deleted [`Message`].
    #[must_use]
    pub fn deleted() -> Self {
        Self(Self::DELETED.to_owned())
    }
}

impl FromStr for Content {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Content`")
    }
}

define_kind! {
    #[doc = "Kind of a [`Message`]."]
    enum Kind {
        #[doc = "Plain text."]
        Text = 1,

        #[doc = "Image link."]
        Image = 2,

        #[doc = "File link."]
        File = 3,

        #[doc = "Message generated by the platform."]
        System = 4,

        #[doc = "Shared property listing."]
        PropertyShare = 5,
    }
}

impl Default for Kind {
    fn default() -> Self {
        Self::Text
    }
}

define_kind! {
    #[doc = "Delivery status of a [`Message`]."]
    enum Status {
        #[doc = "[`Message`] is persisted."]
        Sent = 1,

        #[doc = "[`Message`] is delivered to its recipient."]
        Delivered = 2,

        #[doc = "[`Message`] is read by its recipient."]
        Read = 3,
    }
}

/// Read receipt of a [`Message`].
///
/// There is at most one [`Receipt`] per reader of a [`Message`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Receipt {
    /// ID of the read [`Message`].
    pub message_id: Id,

    /// ID of the [`User`] who read the [`Message`].
    pub reader_id: user::Id,

    /// [`DateTime`] when the [`Message`] was read.
    pub read_at: ReadDateTime,
}

/// Marker type describing a reading.
#[derive(Clone, Copy, Debug)]
pub struct Reading;

/// [`DateTime`] when a [`Message`] was created.
pub type CreationDateTime = DateTimeOf<(Message, unit::Creation)>;

/// [`DateTime`] when a [`Message`] was edited.
pub type EditionDateTime = DateTimeOf<(Message, unit::Edition)>;

/// [`DateTime`] when a [`Message`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Message, unit::Deletion)>;

/// [`DateTime`] when a [`Message`] was read.
pub type ReadDateTime = DateTimeOf<(Message, Reading)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use crate::domain::{conversation, user};

    use super::{
        Content, CreationDateTime, Id, Kind, Message, ModificationError,
        Status,
    };

    fn message(sender_id: user::Id, age: Duration) -> Message {
        Message {
            id: Id::new(),
            conversation_id: conversation::Id::new(),
            sender_id,
            recipient_id: None,
            content: Content::new("hello").unwrap(),
            kind: Kind::Text,
            status: Status::Sent,
            reply_to: None,
            created_at: CreationDateTime::now() - age,
            edited_at: None,
            deleted_at: None,
            deleted_by: None,
        }
    }

    #[test]
    fn validates_content() {
        assert_eq!(Content::new("  hi  ").unwrap().to_string(), "hi");
        assert!(Content::new(" \n ").is_none());
        assert!(Content::new("x".repeat(5000)).is_some());
        assert!(Content::new("x".repeat(5001)).is_none());
    }

    #[test]
    fn enforces_modification_window_boundary() {
        let sender = user::Id::new();
        let day = Message::MODIFICATION_WINDOW;

        let msg = message(sender, Duration::ZERO);
        let at = msg.created_at;
        assert!(msg.ensure_modifiable(sender, at + day).is_ok());
        assert!(msg
            .ensure_modifiable(sender, at + day - Duration::from_secs(1))
            .is_ok());
        assert!(matches!(
            msg.ensure_modifiable(sender, at + day + Duration::from_secs(1)),
            Err(ModificationError::Expired(_)),
        ));
    }

    #[test]
    fn allows_sender_only() {
        let sender = user::Id::new();
        let mut msg = message(sender, Duration::from_secs(60));

        assert!(matches!(
            msg.edit(Content::new("hacked").unwrap(), user::Id::new()),
            Err(ModificationError::NotSender(_)),
        ));

        msg.edit(Content::new("fixed").unwrap(), sender).unwrap();
        assert_eq!(msg.content.to_string(), "fixed");
        assert!(msg.edited_at.is_some());
    }

    #[test]
    fn deletes_with_placeholder() {
        let sender = user::Id::new();
        let mut msg = message(sender, Duration::from_secs(60));

        msg.delete(sender).unwrap();
        assert_eq!(msg.content.to_string(), Content::DELETED);
        assert_eq!(msg.deleted_by, Some(sender));

        assert!(matches!(
            msg.delete(sender),
            Err(ModificationError::Deleted(_)),
        ));
        assert!(matches!(
            msg.edit(Content::new("again").unwrap(), sender),
            Err(ModificationError::Deleted(_)),
        ));
    }

    #[test]
    fn rejects_stale_modification() {
        let sender = user::Id::new();
        let mut msg =
            message(sender, Message::MODIFICATION_WINDOW + Duration::from_secs(1));

        assert!(matches!(
            msg.delete(sender),
            Err(ModificationError::Expired(_)),
        ));
    }
}

//! [`Conversation`] definitions.

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

use crate::domain::{message, property, user, Message};
#[cfg(doc)]
use crate::domain::{Property, User};

/// Pairwise conversation between two [`User`]s, optionally about a
/// [`Property`].
#[derive(Clone, Debug)]
pub struct Conversation {
    /// ID of this [`Conversation`].
    pub id: Id,

    /// [`Participants`] of this [`Conversation`].
    pub participants: Participants,

    /// ID of the [`Property`] this [`Conversation`] is about, if any.
    pub property_id: Option<property::Id>,

    /// [`Kind`] of this [`Conversation`].
    pub kind: Kind,

    /// [`Status`] of this [`Conversation`].
    pub status: Status,

    /// [`Title`] of this [`Conversation`].
    pub title: Title,

    /// ID of the last [`Message`] sent to this [`Conversation`].
    pub last_message_id: Option<message::Id>,

    /// [`DateTime`] when the last [`Message`] was sent to this
    /// [`Conversation`].
    pub last_message_at: Option<message::CreationDateTime>,

    /// Cached numbers of unread [`Message`]s per participant.
    ///
    /// Never authoritative: the number derived from read receipts is.
    pub unread: HashMap<user::Id, u32>,

    /// Participants who have deleted this [`Conversation`] on their side.
    pub deleted_by: HashMap<user::Id, DeletionDateTime>,

    /// [`DateTime`] when this [`Conversation`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Conversation`] was updated last time.
    pub updated_at: UpdateDateTime,

    /// [`DateTime`] when this [`Conversation`] was deleted by all its
    /// participants.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Conversation {
    /// Creates a new [`Status::Active`] [`Conversation`].
    #[must_use]
    pub fn new(
        participants: Participants,
        property_id: Option<property::Id>,
        kind: Kind,
    ) -> Self {
        let now = CreationDateTime::now();
        Self {
            id: Id::new(),
            participants,
            property_id,
            kind,
            status: Status::Active,
            title: Title::generate(property_id.is_some()),
            last_message_id: None,
            last_message_at: None,
            unread: HashMap::new(),
            deleted_by: HashMap::new(),
            created_at: now,
            updated_at: now.coerce(),
            deleted_at: None,
        }
    }

    /// Returns [`Key`] of this [`Conversation`].
    #[must_use]
    pub fn key(&self) -> Key {
        Key {
            participants: self.participants,
            property_id: self.property_id,
        }
    }

    /// Checks whether the provided [`User`] participates in this
    /// [`Conversation`].
    #[must_use]
    pub fn is_participant(&self, user_id: user::Id) -> bool {
        self.participants.contains(user_id)
    }

    /// Indicates whether this [`Conversation`] is deleted by all its
    /// participants.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Indicates whether the provided [`User`] has deleted this
    /// [`Conversation`] on its side.
    #[must_use]
    pub fn is_deleted_for(&self, user_id: user::Id) -> bool {
        self.is_deleted() || self.deleted_by.contains_key(&user_id)
    }

    /// Returns the cached number of unread [`Message`]s of the provided
    /// [`User`].
    #[must_use]
    pub fn cached_unread(&self, user_id: user::Id) -> u32 {
        self.unread.get(&user_id).copied().unwrap_or_default()
    }

    /// Returns the [`DateTime`] to be assigned to the next [`Message`] of this
    /// [`Conversation`].
    ///
    /// The returned [`DateTime`] is always strictly after the last
    /// [`Message`] one, so ordering by it matches the sending order.
    #[must_use]
    pub fn next_message_at(&self) -> message::CreationDateTime {
        let now = message::CreationDateTime::now();
        match self.last_message_at {
            Some(last) if now <= last => last + Duration::from_micros(1),
            Some(_) | None => now,
        }
    }

    /// Records the provided sent [`Message`] in this [`Conversation`].
    ///
    /// Reactivates an [`Status::Archived`] [`Conversation`], increments the
    /// cached unread counters of the other participants and restores this
    /// [`Conversation`] for the participants who have deleted it.
    pub fn record_message(&mut self, msg: &Message) {
        self.last_message_id = Some(msg.id);
        self.last_message_at = Some(msg.created_at);
        if self.status == Status::Archived {
            self.status = Status::Active;
        }
        for user_id in self.participants.iter() {
            if user_id != msg.sender_id {
                *self.unread.entry(user_id).or_default() += 1;
            }
        }
        self.deleted_by.clear();
        self.touch();
    }

    /// Resets the cached unread counter of the provided [`User`] to the
    /// provided (derived) `count`.
    pub fn reset_unread(&mut self, user_id: user::Id, count: u32) {
        _ = self.unread.insert(user_id, count);
        self.touch();
    }

    /// Archives this [`Conversation`].
    pub fn archive(&mut self) {
        if self.status == Status::Active {
            self.status = Status::Archived;
        }
        self.touch();
    }

    /// Deletes this [`Conversation`] on the side of the provided [`User`].
    ///
    /// Once all the participants have deleted it, the whole [`Conversation`]
    /// becomes deleted.
    pub fn delete_for(&mut self, user_id: user::Id) {
        let now = DeletionDateTime::now();
        _ = self.deleted_by.entry(user_id).or_insert(now);
        if self.participants.iter().all(|p| self.deleted_by.contains_key(&p)) {
            self.deleted_at = Some(now);
        }
        self.touch();
    }

    /// Bumps the [`Conversation::updated_at`] of this [`Conversation`].
    fn touch(&mut self) {
        self.updated_at = UpdateDateTime::now();
    }
}

/// ID of a [`Conversation`].
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

/// Canonical (sorted in ascending order) pair of distinct [`Conversation`]
/// participants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Participants([user::Id; 2]);

impl Participants {
    /// Creates new [`Participants`] out of the provided [`User`]s, ignoring
    /// duplicates and order.
    ///
    /// # Errors
    ///
    /// If there are not exactly two distinct [`User`]s provided.
    pub fn new(
        ids: impl IntoIterator<Item = user::Id>,
    ) -> Result<Self, ParticipantsError> {
        let ids = ids.into_iter().collect::<BTreeSet<_>>();
        let mut iter = ids.iter().copied();
        match (iter.next(), iter.next(), iter.next()) {
            (Some(a), Some(b), None) => Ok(Self([a, b])),
            (_, _, Some(_)) => Err(ParticipantsError::TooMany),
            _ => Err(ParticipantsError::TooFew),
        }
    }

    /// Creates new [`Participants`] out of the provided canonical pair.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ids` are distinct and sorted in ascending
    /// order.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(ids: [user::Id; 2]) -> Self {
        Self(ids)
    }

    /// Checks whether the provided [`User`] is one of these [`Participants`].
    #[must_use]
    pub fn contains(&self, user_id: user::Id) -> bool {
        self.0.contains(&user_id)
    }

    /// Returns the participant other than the provided one.
    ///
    /// [`None`] is returned if the provided [`User`] doesn't participate.
    #[must_use]
    pub fn other(&self, user_id: user::Id) -> Option<user::Id> {
        match self.0 {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }

    /// Iterates over these [`Participants`] in their canonical order.
    pub fn iter(&self) -> impl Iterator<Item = user::Id> {
        self.0.into_iter()
    }

    /// Returns these [`Participants`] as a canonical array.
    #[must_use]
    pub const fn as_array(&self) -> [user::Id; 2] {
        self.0
    }
}

/// Error of creating [`Participants`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ParticipantsError {
    /// Less than two distinct participants.
    #[display("`Conversation` needs two distinct participants")]
    TooFew,

    /// More than two distinct participants.
    #[display("`Conversation` may have two participants at most")]
    TooMany,
}

/// Key uniquely identifying a non-deleted [`Conversation`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    /// [`Participants`] of a [`Conversation`].
    pub participants: Participants,

    /// ID of the [`Property`] a [`Conversation`] is about, if any.
    pub property_id: Option<property::Id>,
}

impl Key {
    /// Calculates [`KeyHash`] of this [`Key`].
    #[must_use]
    pub fn hash(&self) -> KeyHash {
        use std::hash::Hash as _;

        // WARNING: Avoid changing the order of the fields in the hasher,
        //          because stored hashes would stop matching.
        let mut hasher = xxh3::Xxh3Builder::new().build();
        self.participants.as_array().hash(&mut hasher);
        self.property_id.hash(&mut hasher);

        KeyHash(Uuid::from_u128(hasher.digest128()))
    }
}

/// Hash of a [`Key`] used for locking a [`Conversation`] creation.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct KeyHash(Uuid);

define_kind! {
    #[doc = "Kind of a [`Conversation`]."]
    enum Kind {
        #[doc = "Inquiry about a [`Property`]."]
        PropertyInquiry = 1,

        #[doc = "General chat."]
        General = 2,

        #[doc = "Chat with the platform support."]
        Support = 3,
    }
}

define_kind! {
    #[doc = "Status of a [`Conversation`]."]
    enum Status {
        #[doc = "[`Conversation`] is in use."]
        Active = 1,

        #[doc = "[`Conversation`] is archived until the next [`Message`]."]
        Archived = 2,

        #[doc = "[`Conversation`] doesn't accept new [`Message`]s."]
        Blocked = 3,
    }
}

/// Title of a [`Conversation`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Title(String);

impl Title {
    /// Generates a [`Title`] for a new [`Conversation`].
    #[must_use]
    pub fn generate(is_about_property: bool) -> Self {
        Self(
            if is_about_property {
                "Property Inquiry"
            } else {
                "General Chat"
            }
            .to_owned(),
        )
    }
}

/// [`DateTime`] when a [`Conversation`] was created.
pub type CreationDateTime = DateTimeOf<(Conversation, unit::Creation)>;

/// [`DateTime`] when a [`Conversation`] was updated.
pub type UpdateDateTime = DateTimeOf<(Conversation, unit::Edition)>;

/// [`DateTime`] when a [`Conversation`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Conversation, unit::Deletion)>;

#[cfg(test)]
mod spec {
    use crate::domain::{property, user};

    use super::{Conversation, Key, Kind, Participants, Status};

    #[test]
    fn canonicalizes_participants() {
        let (a, b) = (user::Id::new(), user::Id::new());

        let ab = Participants::new([a, b]).unwrap();
        let ba = Participants::new([b, a, b]).unwrap();
        assert_eq!(ab, ba);
        assert!(ab.as_array()[0] < ab.as_array()[1]);
        assert_eq!(ab.other(a), Some(b));
        assert_eq!(ab.other(user::Id::new()), None);

        assert!(Participants::new([a, a]).is_err());
        assert!(Participants::new([]).is_err());
        assert!(Participants::new([a, b, user::Id::new()]).is_err());
    }

    #[test]
    fn hashes_keys_deterministically() {
        let (a, b) = (user::Id::new(), user::Id::new());
        let property_id = Some(property::Id::new());
        let key = |ids: [user::Id; 2], property_id| Key {
            participants: Participants::new(ids).unwrap(),
            property_id,
        };

        assert_eq!(
            key([a, b], property_id).hash(),
            key([b, a], property_id).hash(),
        );
        assert_ne!(key([a, b], property_id).hash(), key([a, b], None).hash());
    }

    #[test]
    fn generates_title() {
        let ps = Participants::new([user::Id::new(), user::Id::new()]).unwrap();

        let general = Conversation::new(ps, None, Kind::General);
        assert_eq!(general.title.to_string(), "General Chat");
        assert_eq!(general.status, Status::Active);

        let inquiry = Conversation::new(
            ps,
            Some(property::Id::new()),
            Kind::PropertyInquiry,
        );
        assert_eq!(inquiry.title.to_string(), "Property Inquiry");
    }

    #[test]
    fn deletes_when_all_participants_did() {
        let (a, b) = (user::Id::new(), user::Id::new());
        let mut c = Conversation::new(
            Participants::new([a, b]).unwrap(),
            None,
            Kind::General,
        );

        c.delete_for(a);
        assert!(c.is_deleted_for(a));
        assert!(!c.is_deleted_for(b));
        assert!(!c.is_deleted());

        c.delete_for(b);
        assert!(c.is_deleted());
    }

    #[test]
    fn assigns_increasing_message_times() {
        let ps = Participants::new([user::Id::new(), user::Id::new()]).unwrap();
        let mut c = Conversation::new(ps, None, Kind::General);

        let far = c.next_message_at() + std::time::Duration::from_secs(3600);
        c.last_message_at = Some(far);

        assert!(c.next_message_at() > far);
    }
}

//! In-memory [`Database`] implementation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Update},
    pagination,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        booking, conversation, message, payment, property, user, Booking,
        Conversation, Message, Payment, Property, User,
    },
    infra::{database, Database},
    read,
};

/// In-memory [`Database`].
///
/// Transactions are serialized through a single lock, held from [`Transact`]
/// till [`Commit`] (or till the transacted [`Memory`] is dropped).
///
/// Writes are applied to the shared [`State`] immediately, even inside a
/// transaction, and are not rolled back once the transacted [`Memory`] is
/// dropped without [`Commit`]. So, unlike PostgreSQL, a command failing after
/// a transacted write leaves that write visible. Tests of such error paths
/// must check the command's result rather than the absence of the write.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored [`State`].
    state: Arc<Mutex<State>>,

    /// Lock serializing transactions.
    tx_lock: Arc<AsyncMutex<()>>,

    /// Guard of the [`Memory::tx_lock`] held by this transacted [`Memory`].
    tx: Option<Arc<Mutex<Option<OwnedMutexGuard<()>>>>>,
}

/// Data stored in a [`Memory`] database.
#[derive(Debug, Default)]
pub struct State {
    /// Stored [`User`]s.
    pub users: HashMap<user::Id, User>,

    /// Stored [`Property`]s.
    pub properties: HashMap<property::Id, Property>,

    /// Stored [`Booking`]s.
    pub bookings: HashMap<booking::Id, Booking>,

    /// Stored [`Payment`]s.
    pub payments: HashMap<payment::Id, Payment>,

    /// Stored [`Conversation`]s.
    pub conversations: HashMap<conversation::Id, Conversation>,

    /// Stored [`Message`]s.
    pub messages: HashMap<message::Id, Message>,

    /// Stored [`message::Receipt`]s.
    pub receipts: HashMap<(message::Id, user::Id), message::Receipt>,
}

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the provided function on the [`State`] of this [`Memory`]
    /// database.
    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks whether this [`Error`] is a violation of the provided unique
    /// constraint (or of any one, if [`None`] is provided).
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
        }
    }
}

/// Returns a [`Traced`] unique violation of the provided `constraint`.
fn unique_violation(constraint: &'static str) -> Traced<database::Error> {
    tracerr::new!(database::Error::from(Error::UniqueViolation(constraint)))
}

/// Builds a [`pagination::Page`] out of the provided unordered items.
fn paginate<C: Clone + Ord, I>(
    args: &pagination::Arguments<C>,
    mut items: Vec<(C, I)>,
) -> pagination::Page<C, I> {
    items.sort_by(|(a, _), (b, _)| a.cmp(b));
    let kind = args.kind();
    if let Some(cursor) = args.cursor() {
        items.retain(|(c, _)| {
            if kind.is_forward() {
                c > cursor
            } else {
                c < cursor
            }
        });
    }
    if kind.is_backward() {
        items.reverse();
    }
    pagination::Page::from_fetched(args, items)
}

impl Database<Transact> for Memory {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        if self.tx.is_some() {
            return Ok(self.clone());
        }
        let guard = Arc::clone(&self.tx_lock).lock_owned().await;
        Ok(Self {
            state: Arc::clone(&self.state),
            tx_lock: Arc::clone(&self.tx_lock),
            tx: Some(Arc::new(Mutex::new(Some(guard)))),
        })
    }
}

impl Database<Commit> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        if let Some(tx) = &self.tx {
            drop(tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        }
        Ok(())
    }
}

impl<W> Database<Lock<By<W, user::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<W, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<W> Database<Lock<By<W, property::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<W, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<W> Database<Lock<By<W, conversation::Id>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<W, conversation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<W> Database<Lock<By<W, conversation::KeyHash>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<W, conversation::KeyHash>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl<IDs> Database<Select<By<HashMap<user::Id, User>, IDs>>> for Memory
where
    IDs: AsRef<[user::Id]>,
{
    type Ok = HashMap<user::Id, User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<user::Id, User>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self.with(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.users.get(id))
                .filter(|u| u.deleted_at.is_none())
                .map(|u| (u.id, u.clone()))
                .collect()
        }))
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| {
            s.users.get(&id).filter(|u| u.deleted_at.is_none()).cloned()
        }))
    }
}

impl<'l> Database<Select<By<Option<User>, &'l user::Email>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'l user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        Ok(self.with(|s| {
            s.users
                .values()
                .find(|u| u.deleted_at.is_none() && &u.email == email)
                .cloned()
        }))
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(user)).await.map_err(tracerr::wrap!())
    }
}

impl Database<Update<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            let taken = user.deleted_at.is_none()
                && s.users.values().any(|u| {
                    u.id != user.id
                        && u.deleted_at.is_none()
                        && u.email == user.email
                });
            if taken {
                return Err(unique_violation("users_email_uidx"));
            }
            _ = s.users.insert(user.id, user);
            Ok(())
        })
    }
}

impl<IDs> Database<Select<By<HashMap<property::Id, Property>, IDs>>>
    for Memory
where
    IDs: AsRef<[property::Id]>,
{
    type Ok = HashMap<property::Id, Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<property::Id, Property>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self.with(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.properties.get(id))
                .filter(|p| p.deleted_at.is_none())
                .map(|p| (p.id, p.clone()))
                .collect()
        }))
    }
}

impl Database<Select<By<Option<Property>, property::Id>>> for Memory {
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| {
            s.properties
                .get(&id)
                .filter(|p| p.deleted_at.is_none())
                .cloned()
        }))
    }
}

impl Database<Insert<Property>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(property))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Database<Update<Property>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            _ = s.properties.insert(property.id, property);
        });
        Ok(())
    }
}

/// Checks whether the provided [`Property`] matches the provided
/// [`read::property::list::Filter`].
fn matches_property(
    p: &Property,
    filter: &read::property::list::Filter,
) -> bool {
    let search = filter.search.as_ref().map(|s| s.to_string().to_lowercase());
    p.deleted_at.is_none()
        && filter.landlord_id.map_or(true, |id| p.landlord_id == id)
        && search.map_or(true, |s| {
            p.title.to_string().to_lowercase().contains(&s)
                || p.location.to_string().to_lowercase().contains(&s)
        })
}

impl
    Database<
        Select<
            By<read::property::list::Page, read::property::list::Selector>,
        >,
    > for Memory
{
    type Ok = read::property::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::property::list::Page, read::property::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::property::list::Selector { arguments, filter } =
            by.into_inner();
        let items = self.with(|s| {
            s.properties
                .values()
                .filter(|p| matches_property(p, &filter))
                .map(|p| (p.id, p.id))
                .collect()
        });
        Ok(paginate(&arguments, items))
    }
}

impl
    Database<
        Select<
            By<read::property::list::TotalCount, read::property::list::Filter>,
        >,
    > for Memory
{
    type Ok = read::property::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::property::list::TotalCount, read::property::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let filter = by.into_inner();
        let count = self.with(|s| {
            s.properties
                .values()
                .filter(|p| matches_property(p, &filter))
                .count()
        });
        Ok(i32::try_from(count).unwrap_or(i32::MAX).into())
    }
}

impl<IDs> Database<Select<By<HashMap<booking::Id, Booking>, IDs>>> for Memory
where
    IDs: AsRef<[booking::Id]>,
{
    type Ok = HashMap<booking::Id, Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<booking::Id, Booking>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self.with(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.bookings.get(id))
                .map(|b| (b.id, b.clone()))
                .collect()
        }))
    }
}

impl Database<Select<By<Option<Booking>, booking::Id>>> for Memory {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.bookings.get(&id).cloned()))
    }
}

impl<'r> Database<Select<By<Option<Booking>, &'r payment::Reference>>>
    for Memory
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, &'r payment::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();
        Ok(self.with(|s| {
            s.bookings
                .values()
                .find(|b| b.payment_reference.as_ref() == Some(reference))
                .cloned()
        }))
    }
}

impl Database<Insert<Booking>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(booking))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Database<Update<Booking>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            let taken = booking.payment_reference.as_ref().is_some_and(|r| {
                s.bookings.values().any(|b| {
                    b.id != booking.id && b.payment_reference.as_ref() == Some(r)
                })
            });
            if taken {
                return Err(unique_violation("bookings_payment_reference_uidx"));
            }
            _ = s.bookings.insert(booking.id, booking);
            Ok(())
        })
    }
}

impl
    Database<
        Select<By<Option<read::booking::Conflict>, read::booking::Availability>>,
    > for Memory
{
    type Ok = Option<read::booking::Conflict>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<read::booking::Conflict>, read::booking::Availability>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let availability = by.into_inner();
        Ok(self.with(|s| {
            s.bookings
                .values()
                .find(|b| availability.is_conflicting(b))
                .map(|b| read::booking::Conflict { booking_id: b.id })
        }))
    }
}

impl Database<Select<By<Vec<booking::Id>, read::booking::Expired>>> for Memory {
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::Expired>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Expired { at } = by.into_inner();
        Ok(self.with(|s| {
            let mut expired = s
                .bookings
                .values()
                .filter(|b| {
                    b.status == booking::Status::Confirmed && b.check_out < at
                })
                .map(|b| (b.check_out, b.id))
                .collect::<Vec<_>>();
            expired.sort();
            expired.into_iter().map(|(_, id)| id).collect()
        }))
    }
}

/// Checks whether the provided [`Booking`] matches the provided
/// [`read::booking::list::Filter`].
fn matches_booking(b: &Booking, filter: read::booking::list::Filter) -> bool {
    filter.renter_id.map_or(true, |id| b.renter_id == id)
        && filter.status.map_or(true, |st| b.status == st)
}

impl
    Database<
        Select<By<read::booking::list::Page, read::booking::list::Selector>>,
    > for Memory
{
    type Ok = read::booking::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::Page, read::booking::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Selector { arguments, filter } =
            by.into_inner();
        let items = self.with(|s| {
            s.bookings
                .values()
                .filter(|b| matches_booking(b, filter))
                .map(|b| (b.id, b.id))
                .collect()
        });
        Ok(paginate(&arguments, items))
    }
}

impl
    Database<
        Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    > for Memory
{
    type Ok = read::booking::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let filter = by.into_inner();
        let count = self.with(|s| {
            s.bookings
                .values()
                .filter(|b| matches_booking(b, filter))
                .count()
        });
        Ok(i32::try_from(count).unwrap_or(i32::MAX).into())
    }
}

impl Database<Select<By<Option<Payment>, payment::Id>>> for Memory {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.payments.get(&id).cloned()))
    }
}

impl<'r> Database<Select<By<Option<Payment>, &'r payment::Reference>>>
    for Memory
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, &'r payment::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();
        Ok(self.with(|s| {
            s.payments
                .values()
                .find(|p| &p.reference == reference)
                .cloned()
        }))
    }
}

impl Database<Insert<Payment>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            if s.payments.values().any(|p| p.reference == payment.reference) {
                return Err(unique_violation("payments_reference_uidx"));
            }
            _ = s.payments.insert(payment.id, payment);
            Ok(())
        })
    }
}

impl Database<Select<By<Option<Conversation>, conversation::Id>>> for Memory {
    type Ok = Option<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Conversation>, conversation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.conversations.get(&id).cloned()))
    }
}

impl Database<Select<By<Option<Conversation>, conversation::Key>>> for Memory {
    type Ok = Option<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Conversation>, conversation::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        Ok(self.with(|s| {
            s.conversations
                .values()
                .find(|c| !c.is_deleted() && c.key() == key)
                .cloned()
        }))
    }
}

impl Database<Insert<Conversation>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(conversation): Insert<Conversation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(conversation))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Database<Update<Conversation>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(conversation): Update<Conversation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            let key = conversation.key();
            let taken = !conversation.is_deleted()
                && s.conversations.values().any(|c| {
                    c.id != conversation.id && !c.is_deleted() && c.key() == key
                });
            if taken {
                return Err(unique_violation("conversations_key_uidx"));
            }
            _ = s.conversations.insert(conversation.id, conversation);
            Ok(())
        })
    }
}

impl Database<Select<By<Vec<Conversation>, read::conversation::List>>>
    for Memory
{
    type Ok = Vec<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Conversation>, read::conversation::List>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::conversation::List {
            user_id,
            status,
            kind,
            limit,
        } = by.into_inner();
        Ok(self.with(|s| {
            let mut convs = s
                .conversations
                .values()
                .filter(|c| {
                    c.is_participant(user_id)
                        && !c.is_deleted_for(user_id)
                        && status.map_or(true, |st| c.status == st)
                        && kind.map_or(true, |k| c.kind == k)
                })
                .cloned()
                .collect::<Vec<_>>();
            convs.sort_by(|a, b| {
                let active = |c: &Conversation| -> message::CreationDateTime {
                    c.last_message_at.unwrap_or_else(|| c.created_at.coerce())
                };
                active(b).cmp(&active(a)).then(a.id.cmp(&b.id))
            });
            convs.truncate(limit);
            convs
        }))
    }
}

/// Checks whether the provided [`Message`] is unread by the reader of the
/// provided [`read::message::Unread`] selector.
fn is_unread(
    m: &Message,
    unread: read::message::Unread,
    receipts: &HashMap<(message::Id, user::Id), message::Receipt>,
) -> bool {
    m.conversation_id == unread.conversation_id
        && m.sender_id != unread.reader_id
        && !m.is_deleted()
        && unread.message_id.map_or(true, |id| m.id == id)
        && !receipts.contains_key(&(m.id, unread.reader_id))
}

impl Database<Select<By<read::conversation::Unread, user::Id>>> for Memory {
    type Ok = read::conversation::Unread;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::conversation::Unread, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();
        let count = self.with(|s| {
            s.conversations
                .values()
                .filter(|c| {
                    c.is_participant(user_id) && !c.is_deleted_for(user_id)
                })
                .filter(|c| {
                    let unread = read::message::Unread::all(c.id, user_id);
                    s.messages
                        .values()
                        .any(|m| is_unread(m, unread, &s.receipts))
                })
                .count()
        });
        Ok(u32::try_from(count).unwrap_or(u32::MAX).into())
    }
}

impl<IDs> Database<Select<By<HashMap<message::Id, Message>, IDs>>> for Memory
where
    IDs: AsRef<[message::Id]>,
{
    type Ok = HashMap<message::Id, Message>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<message::Id, Message>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        Ok(self.with(|s| {
            ids.as_ref()
                .iter()
                .filter_map(|id| s.messages.get(id))
                .map(|m| (m.id, m.clone()))
                .collect()
        }))
    }
}

impl Database<Select<By<Option<Message>, message::Id>>> for Memory {
    type Ok = Option<Message>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Message>, message::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.messages.get(&id).cloned()))
    }
}

impl Database<Insert<Message>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(message): Insert<Message>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(message))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Database<Update<Message>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(message): Update<Message>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| {
            let taken = s.messages.values().any(|m| {
                m.id != message.id
                    && m.conversation_id == message.conversation_id
                    && m.created_at == message.created_at
            });
            if taken {
                return Err(unique_violation(
                    "messages_conversation_created_at_uidx",
                ));
            }
            _ = s.messages.insert(message.id, message);
            Ok(())
        })
    }
}

impl
    Database<
        Select<By<read::message::list::Page, read::message::list::Selector>>,
    > for Memory
{
    type Ok = read::message::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::message::list::Page, read::message::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::message::list::Selector {
            arguments,
            filter: read::message::list::Filter { conversation_id },
        } = by.into_inner();
        let items = self.with(|s| {
            s.messages
                .values()
                .filter(|m| {
                    m.conversation_id == conversation_id && !m.is_deleted()
                })
                .map(|m| (m.created_at, m.id))
                .collect()
        });
        Ok(paginate(&arguments, items))
    }
}

impl Database<Select<By<Vec<message::Id>, read::message::Unread>>> for Memory {
    type Ok = Vec<message::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<message::Id>, read::message::Unread>>,
    ) -> Result<Self::Ok, Self::Err> {
        let unread = by.into_inner();
        Ok(self.with(|s| {
            let mut ids = s
                .messages
                .values()
                .filter(|m| is_unread(m, unread, &s.receipts))
                .map(|m| (m.created_at, m.id))
                .collect::<Vec<_>>();
            ids.sort_by_key(|(at, _)| *at);
            ids.into_iter().map(|(_, id)| id).collect()
        }))
    }
}

impl Database<Select<By<read::message::UnreadCount, read::message::Unread>>>
    for Memory
{
    type Ok = read::message::UnreadCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::message::UnreadCount, read::message::Unread>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let unread = by.into_inner();
        let count = self.with(|s| {
            s.messages
                .values()
                .filter(|m| is_unread(m, unread, &s.receipts))
                .count()
        });
        Ok(u32::try_from(count).unwrap_or(u32::MAX).into())
    }
}

impl Database<Insert<Vec<message::Receipt>>> for Memory {
    type Ok = Vec<message::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(receipts): Insert<Vec<message::Receipt>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.with(|s| {
            let mut read = vec![];
            for r in receipts {
                let key = (r.message_id, r.reader_id);
                if s.receipts.contains_key(&key) {
                    continue;
                }
                let Some(msg) = s.messages.get_mut(&r.message_id) else {
                    continue;
                };
                msg.status = message::Status::Read;
                _ = s.receipts.insert(key, r);
                read.push(r.message_id);
            }
            read
        }))
    }
}

impl Database<Select<By<Vec<message::Receipt>, message::Id>>> for Memory {
    type Ok = Vec<message::Receipt>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<message::Receipt>, message::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| {
            let mut receipts = s
                .receipts
                .values()
                .filter(|r| r.message_id == id)
                .copied()
                .collect::<Vec<_>>();
            receipts.sort_by_key(|r| r.read_at);
            receipts
        }))
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{Commit, Transact, Update};
    use tokio::time;

    use crate::{
        domain::{booking, user},
        infra::Database as _,
        testing,
    };

    use super::{Error, Memory};

    #[test]
    fn checks_unique_violation() {
        let err = Error::UniqueViolation("payments_reference_uidx");

        assert!(err.is_unique_violation(None));
        assert!(err.is_unique_violation(Some("payments_reference_uidx")));
        assert!(!err.is_unique_violation(Some("users_email_uidx")));
    }

    #[tokio::test]
    async fn serializes_transactions() {
        let db = Memory::new();

        let tx = db.execute(Transact).await.unwrap();
        let nested = tx.execute(Transact).await.unwrap();
        drop(nested);

        let waiting = time::timeout(
            Duration::from_millis(50),
            db.execute(Transact),
        )
        .await;
        assert!(waiting.is_err(), "second transaction must wait");

        tx.execute(Commit).await.unwrap();
        let next = time::timeout(Duration::from_secs(1), db.execute(Transact))
            .await
            .expect("transaction is released on commit")
            .unwrap();
        next.execute(Commit).await.unwrap();
    }

    #[tokio::test]
    async fn keeps_uncommitted_writes() {
        let db = Memory::new();
        let landlord = testing::user(&db, user::Role::Landlord).await;
        let renter = testing::user(&db, user::Role::User).await;
        let p = testing::property(&db, landlord.id, "100NGN").await;
        let mut booking = testing::booking(
            &db,
            &p,
            renter.id,
            (1, 3),
            booking::Status::Pending,
        )
        .await;

        let tx = db.execute(Transact).await.unwrap();
        booking.status = booking::Status::Cancelled;
        tx.execute(Update(booking.clone())).await.unwrap();
        drop(tx);

        assert_eq!(
            db.with(|s| s.bookings[&booking.id].status),
            booking::Status::Cancelled,
        );
        let next = time::timeout(Duration::from_secs(1), db.execute(Transact))
            .await
            .expect("transaction is released on drop")
            .unwrap();
        next.execute(Commit).await.unwrap();
    }
}

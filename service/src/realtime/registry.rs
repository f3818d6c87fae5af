//! [`Registry`] of live connections.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use derive_more::Display;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use tracing as log;
use uuid::Uuid;

use crate::domain::{conversation, user};
#[cfg(doc)]
use crate::domain::{Conversation, User};

use super::{Envelope, Event, Target};

/// ID of a live connection.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random [`ConnectionId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Newly registered connection.
#[derive(Debug)]
pub struct Registration {
    /// ID of the registered connection.
    pub id: ConnectionId,

    /// Receiver of the [`Event`]s delivered to the connection.
    pub events: UnboundedReceiver<Event>,

    /// Indicator whether it's the first connection of its [`User`].
    pub is_first: bool,
}

/// Removed connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Unregistration {
    /// ID of the [`User`] the connection belonged to.
    pub user_id: user::Id,

    /// Indicator whether it was the last connection of its [`User`].
    pub is_last: bool,
}

/// Live connection.
#[derive(Debug)]
struct Connection {
    /// ID of the [`User`] this [`Connection`] is authenticated as.
    user_id: user::Id,

    /// Sender of the [`Event`]s to this [`Connection`].
    sender: UnboundedSender<Event>,

    /// [`Conversation`] rooms this [`Connection`] has joined.
    rooms: HashSet<conversation::Id>,
}

/// State of a [`Registry`].
#[derive(Debug, Default)]
struct State {
    /// All the live [`Connection`]s.
    connections: HashMap<ConnectionId, Connection>,

    /// Live connections of every online [`User`].
    users: HashMap<user::Id, HashSet<ConnectionId>>,

    /// Connections joined to every [`Conversation`] room.
    rooms: HashMap<conversation::Id, HashSet<ConnectionId>>,
}

impl State {
    /// Removes the provided connection from all the maps.
    fn remove(&mut self, id: ConnectionId) -> Option<Unregistration> {
        let conn = self.connections.remove(&id)?;
        for room in conn.rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                _ = members.remove(&id);
                if members.is_empty() {
                    _ = self.rooms.remove(&room);
                }
            }
        }

        let mut is_last = true;
        if let Some(conns) = self.users.get_mut(&conn.user_id) {
            _ = conns.remove(&id);
            is_last = conns.is_empty();
            if is_last {
                _ = self.users.remove(&conn.user_id);
            }
        }

        Some(Unregistration {
            user_id: conn.user_id,
            is_last,
        })
    }

    /// Resolves the distinct connections addressed by the provided
    /// [`Target`]s.
    fn resolve(&self, targets: &[Target]) -> HashSet<ConnectionId> {
        let mut out = HashSet::new();
        for target in targets {
            match *target {
                Target::Conversation(id) => {
                    out.extend(self.rooms.get(&id).into_iter().flatten());
                }
                Target::User(id) => {
                    out.extend(self.users.get(&id).into_iter().flatten());
                }
                Target::Connection(id) => {
                    if self.connections.contains_key(&id) {
                        _ = out.insert(id);
                    }
                }
                Target::Everyone => out.extend(self.connections.keys()),
            }
        }
        out
    }
}

/// In-process registry of live connections and the [`Conversation`] rooms
/// they have joined.
///
/// Never persisted: rebuilt from nothing on restart.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    /// Shared [`State`] of this [`Registry`].
    inner: Arc<RwLock<State>>,
}

impl Registry {
    /// Creates a new empty [`Registry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection of the provided [`User`].
    pub async fn register(&self, user_id: user::Id) -> Registration {
        let (sender, events) = unbounded_channel();
        let id = ConnectionId::new();

        let mut state = self.inner.write().await;
        _ = state.connections.insert(id, Connection {
            user_id,
            sender,
            rooms: HashSet::new(),
        });
        let conns = state.users.entry(user_id).or_default();
        _ = conns.insert(id);
        let is_first = conns.len() == 1;

        log::debug!(
            %user_id,
            connection = %id,
            total = conns.len(),
            "connection registered",
        );

        Registration {
            id,
            events,
            is_first,
        }
    }

    /// Unregisters the provided connection, leaving all its rooms.
    ///
    /// [`None`] is returned if the connection is not registered.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Unregistration> {
        let out = self.inner.write().await.remove(id);
        if let Some(Unregistration { user_id, is_last }) = out {
            log::debug!(
                %user_id,
                connection = %id,
                is_last,
                "connection unregistered",
            );
        }
        out
    }

    /// Returns the ID of the [`User`] the provided connection belongs to.
    pub async fn user_of(&self, id: ConnectionId) -> Option<user::Id> {
        self.inner
            .read()
            .await
            .connections
            .get(&id)
            .map(|c| c.user_id)
    }

    /// Joins the provided connection to the [`Conversation`] room.
    ///
    /// Returns `false` if the connection is not registered.
    pub async fn join(
        &self,
        id: ConnectionId,
        conversation_id: conversation::Id,
    ) -> bool {
        let mut state = self.inner.write().await;
        let Some(conn) = state.connections.get_mut(&id) else {
            return false;
        };
        _ = conn.rooms.insert(conversation_id);
        _ = state.rooms.entry(conversation_id).or_default().insert(id);

        log::debug!(
            connection = %id,
            %conversation_id,
            "connection joined room",
        );
        true
    }

    /// Removes the provided connection from the [`Conversation`] room.
    ///
    /// Returns `false` if the connection hasn't joined the room.
    pub async fn leave(
        &self,
        id: ConnectionId,
        conversation_id: conversation::Id,
    ) -> bool {
        let mut state = self.inner.write().await;
        let left = state
            .connections
            .get_mut(&id)
            .is_some_and(|c| c.rooms.remove(&conversation_id));
        if let Some(members) = state.rooms.get_mut(&conversation_id) {
            _ = members.remove(&id);
            if members.is_empty() {
                _ = state.rooms.remove(&conversation_id);
            }
        }
        left
    }

    /// Checks whether the provided connection has joined the
    /// [`Conversation`] room.
    pub async fn is_joined(
        &self,
        id: ConnectionId,
        conversation_id: conversation::Id,
    ) -> bool {
        self.inner
            .read()
            .await
            .connections
            .get(&id)
            .is_some_and(|c| c.rooms.contains(&conversation_id))
    }

    /// Checks whether the provided [`User`] has any live connection.
    pub async fn is_online(&self, user_id: user::Id) -> bool {
        self.inner.read().await.users.contains_key(&user_id)
    }

    /// Delivers the provided [`Envelope`] to the live connections it
    /// addresses, pruning the ones whose receiving side is gone.
    ///
    /// Returns the number of connections the [`Event`] was delivered to.
    pub async fn deliver(&self, envelope: Envelope) -> usize {
        let Envelope {
            targets,
            except,
            event,
        } = envelope;

        let mut dead = vec![];
        let mut delivered = 0;
        {
            let state = self.inner.read().await;
            for id in state.resolve(&targets) {
                if Some(id) == except {
                    continue;
                }
                let Some(conn) = state.connections.get(&id) else {
                    continue;
                };
                if conn.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut state = self.inner.write().await;
            for id in &dead {
                _ = state.remove(*id);
            }
            log::debug!(
                ?targets,
                pruned = dead.len(),
                "dead connections pruned on delivery",
            );
        }

        delivered
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{conversation, user},
        realtime::{Envelope, Event, Target},
    };

    use super::{Registry, Unregistration};

    #[tokio::test]
    async fn tracks_presence() {
        let registry = Registry::new();
        let user_id = user::Id::new();

        let first = registry.register(user_id).await;
        let second = registry.register(user_id).await;
        assert!(first.is_first);
        assert!(!second.is_first);
        assert!(registry.is_online(user_id).await);

        assert_eq!(
            registry.unregister(first.id).await,
            Some(Unregistration {
                user_id,
                is_last: false,
            }),
        );
        assert!(registry.is_online(user_id).await);

        assert_eq!(
            registry.unregister(second.id).await,
            Some(Unregistration {
                user_id,
                is_last: true,
            }),
        );
        assert!(!registry.is_online(user_id).await);
        assert_eq!(registry.unregister(second.id).await, None);
    }

    #[tokio::test]
    async fn fans_out_to_room_members() {
        let registry = Registry::new();
        let room = conversation::Id::new();

        let mut alice = registry.register(user::Id::new()).await;
        let mut bob = registry.register(user::Id::new()).await;
        let mut carol = registry.register(user::Id::new()).await;
        assert!(registry.join(alice.id, room).await);
        assert!(registry.join(bob.id, room).await);

        let event = Event::error("hi");
        let delivered = registry
            .deliver(
                Envelope::to(Target::Conversation(room), event.clone())
                    .except(alice.id),
            )
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(bob.events.try_recv().ok(), Some(event));
        assert!(alice.events.try_recv().is_err());
        assert!(carol.events.try_recv().is_err());

        assert!(registry.leave(bob.id, room).await);
        assert!(!registry.leave(bob.id, room).await);
        assert!(!registry.is_joined(bob.id, room).await);
        assert!(registry.is_joined(alice.id, room).await);
    }

    #[tokio::test]
    async fn delivers_once_per_connection() {
        let registry = Registry::new();
        let room = conversation::Id::new();
        let user_id = user::Id::new();

        let mut conn = registry.register(user_id).await;
        assert!(registry.join(conn.id, room).await);

        let delivered = registry
            .deliver(
                Envelope::to(Target::Conversation(room), Event::error("x"))
                    .and(Target::User(user_id))
                    .and(Target::Everyone),
            )
            .await;

        assert_eq!(delivered, 1);
        assert!(conn.events.try_recv().is_ok());
        assert!(conn.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn prunes_dead_connections() {
        let registry = Registry::new();
        let user_id = user::Id::new();

        let gone = registry.register(user_id).await;
        let gone_id = gone.id;
        drop(gone);

        let delivered = registry
            .deliver(Envelope::to(Target::User(user_id), Event::error("x")))
            .await;

        assert_eq!(delivered, 0);
        assert!(!registry.is_online(user_id).await);
        assert_eq!(registry.user_of(gone_id).await, None);
    }
}

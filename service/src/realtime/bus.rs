//! [`Bus`] carrying [`Envelope`]s between [`Event`] producers and the
//! [`Registry`] delivering them.
//!
//! [`Registry`]: super::Registry

use std::fmt;

use async_trait::async_trait;
use derive_more::{Display, Error as StdError};
use futures::stream::{self, BoxStream, StreamExt as _};
use smart_default::SmartDefault;
use tokio::sync::broadcast;
use tracerr::Traced;
use tracing as log;

use crate::domain::{conversation, user};
#[cfg(doc)]
use crate::domain::{Conversation, User};

use super::{registry::ConnectionId, Event};

/// Recipients of an [`Envelope`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    /// Every connection joined to a [`Conversation`] room.
    Conversation(conversation::Id),

    /// Every connection of a [`User`].
    User(user::Id),

    /// A single connection.
    Connection(ConnectionId),

    /// Every connection.
    Everyone,
}

/// [`Event`] addressed to its [`Target`]s.
///
/// A connection addressed by several [`Target`]s receives the [`Event`] once.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// [`Target`]s of this [`Envelope`].
    pub targets: Vec<Target>,

    /// Connection to be skipped, if any.
    pub except: Option<ConnectionId>,

    /// Delivered [`Event`].
    pub event: Event,
}

impl Envelope {
    /// Creates a new [`Envelope`] delivering the provided [`Event`] to the
    /// provided [`Target`].
    #[must_use]
    pub fn to(target: Target, event: Event) -> Self {
        Self {
            targets: vec![target],
            except: None,
            event,
        }
    }

    /// Adds the provided [`Target`] to the recipients of this [`Envelope`].
    #[must_use]
    pub fn and(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    /// Excludes the provided connection from the recipients of this
    /// [`Envelope`].
    #[must_use]
    pub fn except(mut self, connection: ConnectionId) -> Self {
        self.except = Some(connection);
        self
    }
}

/// [`Bus`] error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// [`Bus`] cannot accept [`Envelope`]s.
    #[display("`Bus` is unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
}

/// Publish/subscribe channel of [`Envelope`]s.
#[async_trait]
pub trait Bus: fmt::Debug + Send + Sync {
    /// Publishes the provided [`Envelope`] to all the subscribers.
    ///
    /// # Errors
    ///
    /// If the [`Envelope`] cannot be published.
    async fn publish(&self, envelope: Envelope) -> Result<(), Traced<Error>>;

    /// Subscribes to all the [`Envelope`]s published after this call.
    fn subscribe(&self) -> BoxStream<'static, Envelope>;
}

/// Configuration of a [`Local`] [`Bus`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Number of [`Envelope`]s a lagging subscriber may fall behind by.
    #[default(1024)]
    pub capacity: usize,
}

/// In-process [`Bus`] backed by a [`broadcast`] channel.
#[derive(Clone, Debug)]
pub struct Local {
    /// Sending half of the [`broadcast`] channel.
    sender: broadcast::Sender<Envelope>,
}

impl Local {
    /// Creates a new [`Local`] [`Bus`] with the provided [`Config`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self { sender }
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[async_trait]
impl Bus for Local {
    async fn publish(&self, envelope: Envelope) -> Result<(), Traced<Error>> {
        // No subscribers is not an error: nobody is connected yet.
        _ = self.sender.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, Envelope> {
        stream::unfold(self.sender.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => return Some((envelope, rx)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("`Bus` subscriber skipped {n} envelopes");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod spec {
    use futures::StreamExt as _;

    use crate::{domain::user, realtime::Event};

    use super::{Bus as _, Envelope, Local, Target};

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = Local::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let envelope = Envelope::to(
            Target::User(user::Id::new()),
            Event::UnreadConversationsCount { count: 2 },
        );
        bus.publish(envelope.clone()).await.unwrap();

        assert_eq!(first.next().await, Some(envelope.clone()));
        assert_eq!(second.next().await, Some(envelope));
    }

    #[tokio::test]
    async fn publishes_without_subscribers() {
        let bus = Local::default();

        bus.publish(Envelope::to(Target::Everyone, Event::error("nobody")))
            .await
            .unwrap();
    }
}

//! [`KeyValue`] store with expiring entries.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use common::operations::{By, Delete, Insert, Select};
use derive_more::{Display, Error as StdError};
use tokio::time::Instant;
use tracerr::Traced;

/// Key-value store operation.
pub use common::Handler as KeyValue;

/// Entry to be [`Insert`]ed into a [`KeyValue`] store.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Key of this [`Entry`].
    pub key: String,

    /// Value of this [`Entry`].
    pub value: String,

    /// Period after which this [`Entry`] disappears.
    pub ttl: Duration,
}

/// [`KeyValue`] error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Store cannot be reached.
    #[display("Key-value store is unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
}

/// In-process [`KeyValue`] store.
///
/// Expired entries are evicted lazily, whenever they are touched.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored values along with their expiration deadlines.
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl Memory {
    /// Creates a new empty [`Memory`] store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the provided function over the entries of this [`Memory`] store.
    fn with<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, (String, Instant)>) -> R,
    ) -> R {
        let mut entries =
            self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, (_, deadline)| *deadline > now);
        f(&mut entries)
    }
}

impl KeyValue<Insert<Entry>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<Entry>,
    ) -> Result<Self::Ok, Self::Err> {
        let Entry { key, value, ttl } = entry;
        self.with(|entries| {
            _ = entries.insert(key, (value, Instant::now() + ttl));
        });
        Ok(())
    }
}

impl<'k> KeyValue<Select<By<Option<String>, &'k str>>> for Memory {
    type Ok = Option<String>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<String>, &'k str>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        Ok(self.with(|entries| entries.get(key).map(|(v, _)| v.clone())))
    }
}

impl<'k> KeyValue<Delete<&'k str>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Delete(key): Delete<&'k str>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|entries| drop(entries.remove(key)));
        Ok(())
    }
}

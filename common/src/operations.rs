//! Abstract operations.
//!
//! Operations are plain wrappers describing an intent, while the actual
//! behaviour is provided by a [`Handler`] implementation for the operation.

use std::marker::PhantomData;

use crate::Handler;

/// Defines unit-like or single-field operation wrappers.
macro_rules! define_operations {
    ($(
        #[doc = $doc:literal]
        $name:ident$(<$t:ident>)?
    ),* $(,)?) => {$(
        #[doc = $doc]
        #[derive(Clone, Copy, Debug)]
        pub struct $name$(<$t>(pub $t))?;
    )*};
}

define_operations! {
    #[doc = "Operation to insert a value."]
    Insert<T>,

    #[doc = "Operation to update a value."]
    Update<T>,

    #[doc = "Operation to delete a value."]
    Delete<T>,

    #[doc = "Operation to select a value."]
    Select<T>,

    #[doc = "Operation to lock a value till the end of a transaction."]
    Lock<T>,

    #[doc = "Operation to start a long-running value (a loop, a server)."]
    Start<T>,

    #[doc = "Operation to perform a single iteration of a value."]
    Perform<T>,

    #[doc = "Operation to start a transaction."]
    Transact,

    #[doc = "Operation to commit a transaction."]
    Commit,
}

/// [`Transact`]ed value.
pub type Transacted<T> = <T as Handler<Transact>>::Ok;

/// Selector of `W` by `B`.
#[derive(Clone, Copy, Debug)]
pub struct By<W, B> {
    /// Type of the value to select.
    _what: PhantomData<W>,

    /// Value to select by.
    by: B,
}

impl<W, B> By<W, B> {
    /// Creates a new [`By`] with the given value.
    #[must_use]
    pub fn new(by: B) -> Self {
        Self {
            _what: PhantomData,
            by,
        }
    }

    /// Returns a reference to the inner value.
    #[must_use]
    pub fn as_inner(&self) -> &B {
        &self.by
    }

    /// Consumes this [`By`] and returns the inner value.
    #[must_use]
    pub fn into_inner(self) -> B {
        self.by
    }
}

#[cfg(test)]
mod spec {
    use super::{By, Insert, Select};

    #[test]
    fn wraps_values() {
        let Insert(v) = Insert(5);
        assert_eq!(v, 5);

        let Select(by) = Select(By::<Option<String>, _>::new(7_u8));
        assert_eq!(*by.as_inner(), 7);
        assert_eq!(by.into_inner(), 7);
    }
}

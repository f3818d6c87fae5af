//! [`Query`] collection related to a single [`Conversation`].

use common::operations::By;

use crate::domain::{conversation, Conversation};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Conversation`] by its [`conversation::Id`].
///
/// Soft-deleted [`Conversation`]s are returned too.
pub type ById = DatabaseQuery<By<Option<Conversation>, conversation::Id>>;

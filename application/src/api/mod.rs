//! GraphQL API definitions.

pub mod booking;
pub mod conversation;
pub mod message;
mod mutation;
pub mod payment;
pub mod property;
mod query;
pub mod scalar;
mod subscription;
pub mod user;

use crate::define_error;

pub use self::{
    booking::Booking, conversation::Conversation, message::Message,
    mutation::Mutation, payment::Payment, property::Property, query::Query,
    subscription::Subscription, user::User,
};

/// GraphQL schema.
pub type Schema = juniper::RootNode<'static, Query, Mutation, Subscription>;

define_error! {
    enum PrivilegeError {
        #[code = "FORBIDDEN"]
        #[status = FORBIDDEN]
        #[message = "Authenticated `User` is not allowed to do this"]
        Forbidden,
    }
}

define_error! {
    enum PaginationError {
        #[code = "AMBIGUOUS_PAGINATION_ARGUMENTS"]
        #[status = BAD_REQUEST]
        #[message = "Ambiguous pagination arguments"]
        Ambiguous,
    }
}

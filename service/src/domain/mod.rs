//! Domain definitions.

pub mod booking;
pub mod conversation;
pub mod message;
pub mod payment;
pub mod property;
pub mod user;

pub use self::{
    booking::Booking, conversation::Conversation, message::Message,
    payment::Payment, property::Property, user::User,
};

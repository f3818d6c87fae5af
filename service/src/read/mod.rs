//! Read entities definitions.

pub mod booking;
pub mod conversation;
pub mod message;
pub mod property;

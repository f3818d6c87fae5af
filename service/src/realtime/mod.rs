//! Real-time delivery of [`Event`]s to connected clients.

pub mod bus;
pub mod event;
pub mod registry;

pub use self::{
    bus::{Bus, Envelope, Target},
    event::{Event, Inbound, MessageView},
    registry::{ConnectionId, Registration, Registry, Unregistration},
};

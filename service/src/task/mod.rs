//! Background [`Task`]s definitions.

mod background;
pub mod complete_expired_bookings;
pub mod relay_events;

pub use common::Handler as Task;

pub use self::{
    background::Background, complete_expired_bookings::CompleteExpiredBookings,
    relay_events::RelayEvents,
};

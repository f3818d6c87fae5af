//! Infrastructure layer.

pub mod database;
pub mod kv;
pub mod notifier;
pub mod payment;

pub use self::{
    database::Database, kv::KeyValue, notifier::Notifier,
    payment::PaymentGateway,
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};

//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod realtime;
pub mod task;
#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use common::{
    money::Currency,
    operations::{By, Start},
};
use derive_more::{Debug, Error};
use tracing as log;

#[cfg(doc)]
use infra::{Database, KeyValue, PaymentGateway};
use infra::Notifier;
use realtime::{Bus, Envelope, Registry};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] encoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,

    /// [JWT] decoding key.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// Period a one-time code stays redeemable for.
    pub one_time_code_ttl: Duration,

    /// [`Currency`] of the payments whose [`PaymentGateway`] doesn't report
    /// one.
    pub payment_currency: Currency,

    /// [`task::CompleteExpiredBookings`] configuration.
    pub complete_expired_bookings: task::complete_expired_bookings::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Pg, Kv> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`PaymentGateway`] of this [`Service`].
    payment_gateway: Pg,

    /// [`KeyValue`] store of this [`Service`].
    key_value: Kv,

    /// [`Registry`] of the live connections served by this [`Service`].
    registry: Registry,

    /// [`Bus`] carrying real-time events.
    bus: Arc<dyn Bus>,

    /// [`Notifier`] of this [`Service`].
    notifier: Arc<dyn Notifier>,
}

impl<Db, Pg, Kv> Service<Db, Pg, Kv> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        payment_gateway: Pg,
        key_value: Kv,
        bus: Arc<dyn Bus>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::CompleteExpiredBookings<Self>,
                        task::complete_expired_bookings::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<By<task::RelayEvents<Self>, ()>>,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            payment_gateway,
            key_value,
            registry: Registry::new(),
            bus,
            notifier,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("complete_expired_bookings", async move {
            svc.execute(Start(By::new(svc.config().complete_expired_bookings)))
                .await
        });
        let svc = this.clone();
        bg.spawn("relay_events", async move {
            svc.execute(Start(By::<task::RelayEvents<_>, _>::new(()))).await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`PaymentGateway`] of this [`Service`].
    #[must_use]
    pub fn payment_gateway(&self) -> &Pg {
        &self.payment_gateway
    }

    /// Returns [`KeyValue`] store of this [`Service`].
    #[must_use]
    pub fn key_value(&self) -> &Kv {
        &self.key_value
    }

    /// Returns [`Registry`] of the live connections.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns [`Bus`] carrying real-time events.
    #[must_use]
    pub fn bus(&self) -> &dyn Bus {
        &*self.bus
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        &*self.notifier
    }

    /// Publishes the provided [`Envelope`] to the [`Bus`].
    ///
    /// Failures are logged and never propagated.
    pub(crate) async fn publish(&self, envelope: Envelope) {
        if let Err(e) = self.bus.publish(envelope).await {
            log::warn!("failed to publish real-time event: {e}");
        }
    }
}

//! Fixtures of [`Service`]-level tests.

use std::{sync::Arc, time::Duration};

use common::{
    money::Currency,
    operations::{Insert, Update},
    DateTime, Money,
};
use futures::stream::BoxStream;

use crate::{
    domain::{
        booking, conversation, payment, property, user, Booking,
        Conversation, Property, User,
    },
    infra::{database, kv, notifier, payment::Scripted, Database as _},
    realtime::{bus, Bus as _, Envelope},
    task, Config, Service,
};

/// [`Service`] backed by the in-memory adapters.
pub(crate) type TestService = Service<database::Memory, Scripted, kv::Memory>;

/// Adapters of a [`TestService`] observable by tests.
pub(crate) struct Adapters {
    /// In-memory database.
    pub(crate) database: database::Memory,

    /// Scripted payment gateway.
    pub(crate) gateway: Scripted,

    /// Recording notifier.
    pub(crate) notifier: notifier::Recording,

    /// Stream of all the published [`Envelope`]s.
    pub(crate) events: BoxStream<'static, Envelope>,
}

/// Creates a new [`TestService`] along with its [`Adapters`].
///
/// Background tasks are not started.
pub(crate) fn service() -> (TestService, Adapters) {
    let database = database::Memory::new();
    let gateway = Scripted::default();
    let notifier = notifier::Recording::default();
    let bus = bus::Local::default();
    let events = bus.subscribe();

    let config = Config {
        jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(b"secret"),
        jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(b"secret"),
        one_time_code_ttl: Duration::from_secs(10 * 60),
        payment_currency: Currency::Ngn,
        complete_expired_bookings: task::complete_expired_bookings::Config {
            interval: Duration::from_secs(24 * 60 * 60),
        },
    };
    let (svc, _) = Service::new(
        config,
        database.clone(),
        gateway.clone(),
        kv::Memory::new(),
        Arc::new(bus),
        Arc::new(notifier.clone()),
    );

    (
        svc,
        Adapters {
            database,
            gateway,
            notifier,
            events,
        },
    )
}

/// Returns the [`DateTime`] of the provided day since a fixed far future
/// origin.
pub(crate) fn day(n: u32) -> DateTime {
    DateTime::from_rfc3339("2100-05-01T00:00:00Z").unwrap() + Booking::NIGHT * n
}

/// Stores a new [`User`] with the provided [`user::Role`].
pub(crate) async fn user(db: &database::Memory, role: user::Role) -> User {
    let id = user::Id::new();
    let user = User {
        id,
        name: user::Name::new("Tester").unwrap(),
        email: user::Email::new(format!("{id}@example.com")).unwrap(),
        password_hash: user::PasswordHash::new(
            &user::Password::new("correct horse").unwrap(),
        ),
        phone: None,
        role,
        verified_at: None,
        created_at: DateTime::now().coerce(),
        deleted_at: None,
    };
    db.execute(Insert(user.clone())).await.unwrap();
    user
}

/// Stores a new [`Property`] of the provided landlord with the provided
/// nightly `rent`.
pub(crate) async fn property(
    db: &database::Memory,
    landlord_id: user::Id,
    rent: &str,
) -> Property {
    let property = Property {
        id: property::Id::new(),
        landlord_id,
        title: property::Title::new("Cozy flat").unwrap(),
        location: property::Location::new("Lagos").unwrap(),
        description: None,
        rent: rent.parse::<Money>().unwrap(),
        created_at: DateTime::now().coerce(),
        deleted_at: None,
    };
    db.execute(Insert(property.clone())).await.unwrap();
    property
}

/// Stores a new [`Booking`] in the provided state.
pub(crate) async fn booking(
    db: &database::Memory,
    property: &Property,
    renter_id: user::Id,
    (from, to): (u32, u32),
    status: booking::Status,
) -> Booking {
    let nights = to - from;
    let booking = Booking {
        id: booking::Id::new(),
        renter_id,
        property_id: property.id,
        check_in: day(from).coerce(),
        check_out: day(to).coerce(),
        guests: booking::Guests::new(1).unwrap(),
        total: property.rent.checked_mul(nights).unwrap(),
        status,
        payment_status: if status == booking::Status::Pending {
            payment::Status::Pending
        } else {
            payment::Status::Paid
        },
        payment_reference: None,
        payment_id: None,
        created_at: DateTime::now().coerce(),
        updated_at: DateTime::now().coerce(),
    };
    db.execute(Insert(booking.clone())).await.unwrap();
    booking
}

/// Stores a new [`Conversation`] between the provided [`User`]s.
pub(crate) async fn conversation(
    db: &database::Memory,
    a: user::Id,
    b: user::Id,
) -> Conversation {
    let conv = Conversation::new(
        conversation::Participants::new([a, b]).unwrap(),
        None,
        conversation::Kind::General,
    );
    db.execute(Insert(conv.clone())).await.unwrap();
    conv
}

/// Overwrites the provided [`Booking`] in the database.
pub(crate) async fn save_booking(db: &database::Memory, booking: Booking) {
    db.execute(Update(booking)).await.unwrap();
}

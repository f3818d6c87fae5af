//! [`Query`] definition.

pub mod booking;
pub mod bookings;
pub mod conversation;
pub mod conversations;
pub mod message;
pub mod messages;
pub mod payment;
pub mod properties;
pub mod property;
pub mod user;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    Service,
};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, Pg, Kv, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db, Pg, Kv>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{booking, user},
        read,
        testing, Query as _,
    };

    use super::{bookings, property};

    #[tokio::test]
    async fn checks_availability_against_confirmed_bookings() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let p = testing::property(&env.database, landlord.id, "100NGN").await;
        let confirmed = testing::booking(
            &env.database,
            &p,
            renter.id,
            (1, 4),
            booking::Status::Confirmed,
        )
        .await;
        drop(
            testing::booking(
                &env.database,
                &p,
                renter.id,
                (10, 12),
                booking::Status::Pending,
            )
            .await,
        );
        let check = |from, to| read::booking::Availability {
            property_id: p.id,
            check_in: testing::day(from).coerce(),
            check_out: testing::day(to).coerce(),
            scope: read::booking::Scope::Confirmed,
            except: None,
        };

        let conflict = svc
            .execute(property::Availability::by(check(3, 5)))
            .await
            .unwrap();
        assert_eq!(
            conflict,
            Some(read::booking::Conflict {
                booking_id: confirmed.id,
            }),
        );

        for (from, to) in [(4, 6), (0, 1), (10, 11)] {
            let conflict = svc
                .execute(property::Availability::by(check(from, to)))
                .await
                .unwrap();
            assert_eq!(conflict, None, "range {from}..{to}");
        }
    }

    #[tokio::test]
    async fn lists_bookings_by_status() {
        let (svc, env) = testing::service();
        let landlord =
            testing::user(&env.database, user::Role::Landlord).await;
        let renter = testing::user(&env.database, user::Role::User).await;
        let p = testing::property(&env.database, landlord.id, "100NGN").await;
        for (range, status) in [
            ((1, 2), booking::Status::Confirmed),
            ((2, 3), booking::Status::Confirmed),
            ((3, 4), booking::Status::Cancelled),
        ] {
            drop(
                testing::booking(&env.database, &p, renter.id, range, status)
                    .await,
            );
        }
        let filter = read::booking::list::Filter {
            renter_id: Some(renter.id),
            status: Some(booking::Status::Confirmed),
        };

        let total: i32 = svc
            .execute(bookings::TotalCount::by(filter))
            .await
            .unwrap()
            .into();
        let page = svc
            .execute(bookings::List::by(read::booking::list::Selector {
                arguments: read::booking::list::Arguments::new(
                    Some(10),
                    None,
                    None,
                    None,
                    10,
                )
                .unwrap(),
                filter,
            }))
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert_eq!(page.edges.len(), 2);
    }
}

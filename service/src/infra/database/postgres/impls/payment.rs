//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of a [`Payment`] row.
const COLUMNS: &str = "\
    id, user_id, booking_id, amount, currency, reference, \
    status, gateway, channel, paid_at, created_at";

/// Builds a [`Payment`] out of the provided [`Row`].
fn from_row(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        booking_id: row.get("booking_id"),
        amount: Money {
            amount: row.get("amount"),
            currency: row.get("currency"),
        },
        reference: row.get("reference"),
        status: row.get("status"),
        gateway: row.get("gateway"),
        channel: row.get("channel"),
        paid_at: row.get("paid_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = $1::UUID");
        Ok(self
            .query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<'r, C> Database<Select<By<Option<Payment>, &'r payment::Reference>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, &'r payment::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE reference = $1::VARCHAR",
        );
        Ok(self
            .query_opt(&sql, &[&reference])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            user_id,
            booking_id,
            amount,
            reference,
            status,
            gateway,
            channel,
            paid_at,
            created_at,
        } = payment;

        // Unique `reference` violation is propagated to detect duplicates.
        const SQL: &str = "\
            INSERT INTO payments (\
                id, user_id, booking_id, amount, currency, reference, \
                status, gateway, channel, paid_at, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::NUMERIC, $5::INT2, \
                $6::VARCHAR, $7::INT2, $8::INT2, $9::VARCHAR, \
                $10::TIMESTAMPTZ, $11::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &user_id,
                &booking_id,
                &amount.amount,
                &amount.currency,
                &reference,
                &status,
                &gateway,
                &channel,
                &paid_at,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

//! [`Booking`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, payment, Booking},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Booking`] row.
const COLUMNS: &str = "\
    id, renter_id, property_id, check_in, check_out, guests, \
    total, total_currency, status, \
    payment_status, payment_reference, payment_id, \
    created_at, updated_at";

/// Builds a [`Booking`] out of the provided [`Row`].
fn from_row(row: &Row) -> Booking {
    Booking {
        id: row.get("id"),
        renter_id: row.get("renter_id"),
        property_id: row.get("property_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guests: row.get("guests"),
        total: Money {
            amount: row.get("total"),
            currency: row.get("total_currency"),
        },
        status: row.get("status"),
        payment_status: row.get("payment_status"),
        payment_reference: row.get("payment_reference"),
        payment_id: row.get("payment_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<booking::Id, Booking>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[booking::Id]>,
{
    type Ok = HashMap<booking::Id, Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<booking::Id, Booking>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[booking::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE id = ANY($1::UUID[])",
        );
        Ok(self
            .query(&sql, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .map(|b| (b.id, b))
            .collect())
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<booking::Id, Booking>, [booking::Id; 1]>>,
        Ok = HashMap<booking::Id, Booking>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<'r, C> Database<Select<By<Option<Booking>, &'r payment::Reference>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, &'r payment::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE payment_reference = $1::VARCHAR \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&reference])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Booking>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(booking))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            renter_id,
            property_id,
            check_in,
            check_out,
            guests,
            total,
            status,
            payment_status,
            payment_reference,
            payment_id,
            created_at,
            updated_at,
        } = booking;

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, renter_id, property_id, check_in, check_out, guests, \
                total, total_currency, status, \
                payment_status, payment_reference, payment_id, \
                created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::TIMESTAMPTZ, $5::TIMESTAMPTZ, $6::INT2, \
                $7::NUMERIC, $8::INT2, $9::INT2, \
                $10::INT2, $11::VARCHAR, $12::UUID, \
                $13::TIMESTAMPTZ, $14::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                payment_status = EXCLUDED.payment_status, \
                payment_reference = EXCLUDED.payment_reference, \
                payment_id = EXCLUDED.payment_id, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &renter_id,
                &property_id,
                &check_in,
                &check_out,
                &guests,
                &total.amount,
                &total.currency,
                &status,
                &payment_status,
                &payment_reference,
                &payment_id,
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C>
    Database<
        Select<By<Option<read::booking::Conflict>, read::booking::Availability>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<read::booking::Conflict>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<read::booking::Conflict>, read::booking::Availability>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Availability {
            property_id,
            check_in,
            check_out,
            scope,
            except,
        } = by.into_inner();

        let scope_filtering = match scope {
            read::booking::Scope::Confirmed => "status = $5::INT2",
            read::booking::Scope::Held => {
                "(status = $5::INT2 \
                  OR (status = $6::INT2 AND payment_status <> $7::INT2))"
            }
        };
        let sql = format!(
            "SELECT id \
             FROM bookings \
             WHERE property_id = $1::UUID \
               AND check_in < $3::TIMESTAMPTZ \
               AND check_out > $2::TIMESTAMPTZ \
               AND ($4::UUID IS NULL OR id <> $4::UUID) \
               AND {scope_filtering} \
             LIMIT 1",
        );
        Ok(self
            .query_opt(
                &sql,
                &[
                    &property_id,
                    &check_in,
                    &check_out,
                    &except,
                    &booking::Status::Confirmed,
                    &booking::Status::Pending,
                    &payment::Status::Failed,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| read::booking::Conflict {
                booking_id: row.get("id"),
            }))
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, read::booking::Expired>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::Expired>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Expired { at } = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE status = $1::INT2 \
              AND check_out < $2::TIMESTAMPTZ \
            ORDER BY check_out ASC";
        Ok(self
            .query(SQL, &[&booking::Status::Confirmed, &at])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C>
    Database<
        Select<By<read::booking::list::Page, read::booking::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::booking::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::Page, read::booking::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Selector {
            arguments,
            filter: read::booking::list::Filter { renter_id, status },
        } = by.into_inner();

        let limit = i32::try_from(arguments.fetch_limit()).unwrap_or(i32::MAX);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });
        let renter_idx = renter_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let status_idx = status.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });

        let sql = format!(
            "SELECT id \
             FROM bookings \
             WHERE TRUE \
                   {cursor} \
                   {renter_filtering} \
                   {status_filtering} \
             ORDER BY id {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            renter_filtering =
                renter_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND renter_id = ${idx}::UUID"))
                }),
            status_filtering =
                status_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND status = ${idx}::INT2"))
                }),
            order = arguments.kind().order().sql(),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::booking::list::Page::from_fetched(
            &arguments,
            rows.into_iter().map(|row| {
                let id = row.get::<_, booking::Id>("id");
                (id, id)
            }),
        ))
    }
}

impl<C>
    Database<
        Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::booking::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::TotalCount, read::booking::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Filter { renter_id, status } = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*)::INT4 \
            FROM bookings \
            WHERE ($1::UUID IS NULL OR renter_id = $1::UUID) \
              AND ($2::INT2 IS NULL OR status = $2::INT2)";
        let rows = self
            .query(SQL, &[&renter_id, &status])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(rows
            .first()
            .map_or(0, |row| row.get::<_, i32>(0))
            .into())
    }
}

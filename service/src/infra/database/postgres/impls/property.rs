//! [`Property`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{property, Property},
    infra::{
        database::{
            self,
            postgres::{Connection, FuzzPattern},
            Postgres,
        },
        Database,
    },
    read,
};

/// Builds a [`Property`] out of the provided [`Row`].
fn from_row(row: &Row) -> Property {
    Property {
        id: row.get("id"),
        landlord_id: row.get("landlord_id"),
        title: row.get("title"),
        location: row.get("location"),
        description: row.get("description"),
        rent: Money {
            amount: row.get("rent"),
            currency: row.get("rent_currency"),
        },
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<property::Id, Property>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[property::Id]>,
{
    type Ok = HashMap<property::Id, Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<property::Id, Property>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[property::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        const SQL: &str = "\
            SELECT id, landlord_id, title, location, description, \
                   rent, rent_currency, \
                   created_at, deleted_at \
            FROM properties \
            WHERE id = ANY($1::UUID[]) \
              AND deleted_at IS NULL";
        Ok(self
            .query(SQL, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .map(|p| (p.id, p))
            .collect())
    }
}

impl<C> Database<Select<By<Option<Property>, property::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<property::Id, Property>, [property::Id; 1]>>,
        Ok = HashMap<property::Id, Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Property>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Property>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(property))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Property>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        let Property {
            id,
            landlord_id,
            title,
            location,
            description,
            rent,
            created_at,
            deleted_at,
        } = property;

        const SQL: &str = "\
            INSERT INTO properties (\
                id, landlord_id, title, location, description, \
                rent, rent_currency, \
                created_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::VARCHAR, $5::TEXT, \
                $6::NUMERIC, $7::INT2, \
                $8::TIMESTAMPTZ, $9::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET title = EXCLUDED.title, \
                location = EXCLUDED.location, \
                description = EXCLUDED.description, \
                rent = EXCLUDED.rent, \
                rent_currency = EXCLUDED.rent_currency, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &landlord_id,
                &title,
                &location,
                &description,
                &rent.amount,
                &rent.currency,
                &created_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Property, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO properties_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<
        Select<
            By<read::property::list::Page, read::property::list::Selector>,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::property::list::Page, read::property::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::property::list::Selector {
            arguments,
            filter: read::property::list::Filter {
                landlord_id,
                search,
            },
        } = by.into_inner();

        let limit = i32::try_from(arguments.fetch_limit()).unwrap_or(i32::MAX);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });
        let landlord_idx = landlord_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let pattern =
            search.as_ref().and_then(|s| FuzzPattern::new(s.as_ref()));
        let pattern_idx = pattern.as_ref().map(|p| {
            ps.push(p);
            ps.len()
        });

        let sql = format!(
            "SELECT id \
             FROM properties \
             WHERE deleted_at IS NULL \
                   {cursor} \
                   {landlord_filtering} \
                   {search_filtering} \
             ORDER BY id {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            landlord_filtering =
                landlord_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND landlord_id = ${idx}::UUID"))
                }),
            search_filtering =
                pattern_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!(
                        "AND (LOWER(title) SIMILAR TO LOWER(${idx}::VARCHAR) \
                              OR LOWER(location) \
                                 SIMILAR TO LOWER(${idx}::VARCHAR))"
                    ))
                }),
            order = arguments.kind().order().sql(),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::property::list::Page::from_fetched(
            &arguments,
            rows.into_iter().map(|row| {
                let id = row.get::<_, property::Id>("id");
                (id, id)
            }),
        ))
    }
}

impl<C>
    Database<
        Select<
            By<read::property::list::TotalCount, read::property::list::Filter>,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::property::list::TotalCount, read::property::list::Filter>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::property::list::Filter {
            landlord_id,
            search,
        } = by.into_inner();
        let pattern =
            search.as_ref().and_then(|s| FuzzPattern::new(s.as_ref()));

        const SQL: &str = "\
            SELECT COUNT(*)::INT4 \
            FROM properties \
            WHERE deleted_at IS NULL \
              AND ($1::UUID IS NULL OR landlord_id = $1::UUID) \
              AND ($2::VARCHAR IS NULL \
                   OR LOWER(title) SIMILAR TO LOWER($2::VARCHAR) \
                   OR LOWER(location) SIMILAR TO LOWER($2::VARCHAR))";
        let row = self
            .query(SQL, &[&landlord_id, &pattern])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(row
            .first()
            .map_or(0, |row| row.get::<_, i32>(0))
            .into())
    }
}

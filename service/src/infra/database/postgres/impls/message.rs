//! [`Message`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Select, Update};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{message, Message},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Message`] row.
const COLUMNS: &str = "\
    id, conversation_id, sender_id, recipient_id, content, kind, status, \
    reply_to, created_at, edited_at, deleted_at, deleted_by";

/// Builds a [`Message`] out of the provided [`Row`].
fn from_row(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        content: row.get("content"),
        kind: row.get("kind"),
        status: row.get("status"),
        reply_to: row.get("reply_to"),
        created_at: row.get("created_at"),
        edited_at: row.get("edited_at"),
        deleted_at: row.get("deleted_at"),
        deleted_by: row.get("deleted_by"),
    }
}

impl<C, IDs> Database<Select<By<HashMap<message::Id, Message>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[message::Id]>,
{
    type Ok = HashMap<message::Id, Message>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<message::Id, Message>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[message::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM messages \
             WHERE id = ANY($1::UUID[])",
        );
        Ok(self
            .query(&sql, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .map(|m| (m.id, m))
            .collect())
    }
}

impl<C> Database<Select<By<Option<Message>, message::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<message::Id, Message>, [message::Id; 1]>>,
        Ok = HashMap<message::Id, Message>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Message>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Message>, message::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Message>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Message>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(message): Insert<Message>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(message))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Message>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(message): Update<Message>,
    ) -> Result<Self::Ok, Self::Err> {
        let Message {
            id,
            conversation_id,
            sender_id,
            recipient_id,
            content,
            kind,
            status,
            reply_to,
            created_at,
            edited_at,
            deleted_at,
            deleted_by,
        } = message;

        const SQL: &str = "\
            INSERT INTO messages (\
                id, conversation_id, sender_id, recipient_id, \
                content, kind, status, reply_to, \
                created_at, edited_at, deleted_at, deleted_by\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::VARCHAR, $6::INT2, $7::INT2, $8::UUID, \
                $9::TIMESTAMPTZ, $10::TIMESTAMPTZ, $11::TIMESTAMPTZ, \
                $12::UUID\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET content = EXCLUDED.content, \
                status = EXCLUDED.status, \
                edited_at = EXCLUDED.edited_at, \
                deleted_at = EXCLUDED.deleted_at, \
                deleted_by = EXCLUDED.deleted_by";
        self.exec(
            SQL,
            &[
                &id,
                &conversation_id,
                &sender_id,
                &recipient_id,
                &content,
                &kind,
                &status,
                &reply_to,
                &created_at,
                &edited_at,
                &deleted_at,
                &deleted_by,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C>
    Database<
        Select<By<read::message::list::Page, read::message::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::message::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::message::list::Page, read::message::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::message::list::Selector {
            arguments,
            filter: read::message::list::Filter { conversation_id },
        } = by.into_inner();

        let limit = i32::try_from(arguments.fetch_limit()).unwrap_or(i32::MAX);

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit, &conversation_id];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });

        let sql = format!(
            "SELECT id, created_at \
             FROM messages \
             WHERE conversation_id = $2::UUID \
               AND deleted_at IS NULL \
                   {cursor} \
             ORDER BY created_at {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND created_at {op} ${idx}::TIMESTAMPTZ"))
            }),
            order = arguments.kind().order().sql(),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        Ok(read::message::list::Page::from_fetched(
            &arguments,
            rows.into_iter().map(|row| {
                (
                    row.get::<_, message::CreationDateTime>("created_at"),
                    row.get::<_, message::Id>("id"),
                )
            }),
        ))
    }
}

impl<C> Database<Select<By<Vec<message::Id>, read::message::Unread>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<message::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<message::Id>, read::message::Unread>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::message::Unread {
            conversation_id,
            reader_id,
            message_id,
        } = by.into_inner();

        const SQL: &str = "\
            SELECT m.id \
            FROM messages AS m \
            WHERE m.conversation_id = $1::UUID \
              AND m.sender_id <> $2::UUID \
              AND m.deleted_at IS NULL \
              AND ($3::UUID IS NULL OR m.id = $3::UUID) \
              AND NOT EXISTS (\
                  SELECT 1 FROM message_receipts AS r \
                  WHERE r.message_id = m.id \
                    AND r.reader_id = $2::UUID\
              ) \
            ORDER BY m.created_at ASC";
        Ok(self
            .query(SQL, &[&conversation_id, &reader_id, &message_id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C>
    Database<Select<By<read::message::UnreadCount, read::message::Unread>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::message::UnreadCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::message::UnreadCount, read::message::Unread>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::message::Unread {
            conversation_id,
            reader_id,
            message_id,
        } = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*)::INT4 \
            FROM messages AS m \
            WHERE m.conversation_id = $1::UUID \
              AND m.sender_id <> $2::UUID \
              AND m.deleted_at IS NULL \
              AND ($3::UUID IS NULL OR m.id = $3::UUID) \
              AND NOT EXISTS (\
                  SELECT 1 FROM message_receipts AS r \
                  WHERE r.message_id = m.id \
                    AND r.reader_id = $2::UUID\
              )";
        let rows = self
            .query(SQL, &[&conversation_id, &reader_id, &message_id])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(rows
            .first()
            .map_or(0, |row| {
                u32::try_from(row.get::<_, i32>(0)).unwrap_or_default()
            })
            .into())
    }
}

impl<C> Database<Insert<Vec<message::Receipt>>> for Postgres<C>
where
    C: Connection,
{
    /// IDs of the [`Message`]s the [`message::Receipt`]s were newly added to.
    type Ok = Vec<message::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(receipts): Insert<Vec<message::Receipt>>,
    ) -> Result<Self::Ok, Self::Err> {
        if receipts.is_empty() {
            return Ok(vec![]);
        }

        let (message_ids, (reader_ids, read_ats)): (Vec<_>, (Vec<_>, Vec<_>)) =
            receipts
                .into_iter()
                .map(|r| (r.message_id, (r.reader_id, r.read_at)))
                .unzip();

        // Duplicate receipts are skipped, so only the newly read `Message`s
        // change their status.
        const SQL: &str = "\
            WITH inserted AS (\
                INSERT INTO message_receipts (message_id, reader_id, read_at) \
                SELECT * FROM UNNEST(\
                    $1::UUID[], $2::UUID[], $3::TIMESTAMPTZ[]\
                ) \
                ON CONFLICT (message_id, reader_id) DO NOTHING \
                RETURNING message_id\
            ) \
            UPDATE messages \
            SET status = $4::INT2 \
            WHERE id IN (SELECT message_id FROM inserted) \
            RETURNING id";
        Ok(self
            .query(
                SQL,
                &[
                    &message_ids,
                    &reader_ids,
                    &read_ats,
                    &message::Status::Read,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C> Database<Select<By<Vec<message::Receipt>, message::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<message::Receipt>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<message::Receipt>, message::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT message_id, reader_id, read_at \
            FROM message_receipts \
            WHERE message_id = $1::UUID \
            ORDER BY read_at ASC";
        Ok(self
            .query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| message::Receipt {
                message_id: row.get("message_id"),
                reader_id: row.get("reader_id"),
                read_at: row.get("read_at"),
            })
            .collect())
    }
}

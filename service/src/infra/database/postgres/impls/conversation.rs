//! [`Conversation`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{conversation, user, Conversation},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Conversation`] row.
const COLUMNS: &str = "\
    id, participant_a, participant_b, property_id, kind, status, title, \
    last_message_id, last_message_at, created_at, updated_at, deleted_at";

/// Builds [`Conversation`]s out of the provided [`Row`]s, loading their
/// members.
async fn load<C: Connection>(
    conn: &C,
    rows: Vec<Row>,
) -> Result<Vec<Conversation>, Traced<database::Error>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let mut convs = rows
        .iter()
        .map(|row| {
            let ids = [row.get("participant_a"), row.get("participant_b")];
            // SAFETY: Stored participants are canonical, as the `CHECK`
            //         constraint guarantees.
            #[expect(unsafe_code, reason = "invariants are preserved")]
            let participants =
                unsafe { conversation::Participants::new_unchecked(ids) };
            Conversation {
                id: row.get("id"),
                participants,
                property_id: row.get("property_id"),
                kind: row.get("kind"),
                status: row.get("status"),
                title: row.get("title"),
                last_message_id: row.get("last_message_id"),
                last_message_at: row.get("last_message_at"),
                unread: HashMap::new(),
                deleted_by: HashMap::new(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                deleted_at: row.get("deleted_at"),
            }
        })
        .collect::<Vec<_>>();
    let ids = convs.iter().map(|c| c.id).collect::<Vec<_>>();

    const SQL: &str = "\
        SELECT conversation_id, user_id, unread, deleted_at \
        FROM conversation_members \
        WHERE conversation_id = ANY($1::UUID[])";
    let members = conn.query(SQL, &[&ids]).await.map_err(tracerr::wrap!())?;

    let mut by_id = convs
        .iter_mut()
        .map(|c| (c.id, c))
        .collect::<HashMap<_, _>>();
    for row in members {
        let Some(conv) =
            by_id.get_mut(&row.get::<_, conversation::Id>("conversation_id"))
        else {
            continue;
        };
        let user_id = row.get::<_, user::Id>("user_id");
        let unread = row.get::<_, i32>("unread");
        _ = conv
            .unread
            .insert(user_id, u32::try_from(unread).unwrap_or_default());
        if let Some(at) = row.get("deleted_at") {
            _ = conv.deleted_by.insert(user_id, at);
        }
    }

    Ok(convs)
}

impl<C> Database<Select<By<Option<Conversation>, conversation::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Conversation>, conversation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM conversations \
             WHERE id = $1::UUID",
        );
        let rows = self.query(&sql, &[&id]).await.map_err(tracerr::wrap!())?;
        Ok(load(&**self, rows)
            .await
            .map_err(tracerr::wrap!())?
            .pop())
    }
}

impl<C> Database<Select<By<Option<Conversation>, conversation::Key>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Conversation>, conversation::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let conversation::Key {
            participants,
            property_id,
        } = by.into_inner();
        let [a, b] = participants.as_array();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM conversations \
             WHERE participant_a = $1::UUID \
               AND participant_b = $2::UUID \
               AND property_id IS NOT DISTINCT FROM $3::UUID \
               AND deleted_at IS NULL \
             LIMIT 1",
        );
        let rows = self
            .query(&sql, &[&a, &b, &property_id])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(load(&**self, rows)
            .await
            .map_err(tracerr::wrap!())?
            .pop())
    }
}

impl<C> Database<Insert<Conversation>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Update<Conversation>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(conversation): Insert<Conversation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(conversation))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Conversation>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(conversation): Update<Conversation>,
    ) -> Result<Self::Ok, Self::Err> {
        let Conversation {
            id,
            participants,
            property_id,
            kind,
            status,
            title,
            last_message_id,
            last_message_at,
            unread,
            deleted_by,
            created_at,
            updated_at,
            deleted_at,
        } = conversation;
        let [a, b] = participants.as_array();

        const SQL: &str = "\
            INSERT INTO conversations (\
                id, participant_a, participant_b, property_id, \
                kind, status, title, \
                last_message_id, last_message_at, \
                created_at, updated_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::INT2, $6::INT2, $7::VARCHAR, \
                $8::UUID, $9::TIMESTAMPTZ, \
                $10::TIMESTAMPTZ, $11::TIMESTAMPTZ, $12::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                title = EXCLUDED.title, \
                last_message_id = EXCLUDED.last_message_id, \
                last_message_at = EXCLUDED.last_message_at, \
                updated_at = EXCLUDED.updated_at, \
                deleted_at = EXCLUDED.deleted_at";
        _ = self
            .exec(
                SQL,
                &[
                    &id,
                    &a,
                    &b,
                    &property_id,
                    &kind,
                    &status,
                    &title,
                    &last_message_id,
                    &last_message_at,
                    &created_at,
                    &updated_at,
                    &deleted_at,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;

        const MEMBERS_SQL: &str = "\
            INSERT INTO conversation_members (\
                conversation_id, user_id, unread, deleted_at\
            ) \
            VALUES ($1::UUID, $2::UUID, $3::INT4, $4::TIMESTAMPTZ) \
            ON CONFLICT (conversation_id, user_id) DO UPDATE \
            SET unread = EXCLUDED.unread, \
                deleted_at = EXCLUDED.deleted_at";
        for user_id in participants.iter() {
            let unread = unread
                .get(&user_id)
                .map_or(0, |n| i32::try_from(*n).unwrap_or(i32::MAX));
            let deleted_at = deleted_by.get(&user_id);
            _ = self
                .exec(MEMBERS_SQL, &[&id, &user_id, &unread, &deleted_at])
                .await
                .map_err(tracerr::wrap!())?;
        }

        Ok(())
    }
}

impl<C> Database<Lock<By<Conversation, conversation::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Conversation, conversation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: conversation::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO conversations_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Conversation, conversation::KeyHash>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Conversation, conversation::KeyHash>>,
    ) -> Result<Self::Ok, Self::Err> {
        let hash = by.into_inner();

        const SQL: &str = "\
            INSERT INTO conversation_keys_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (hash) DO UPDATE SET hash = EXCLUDED.hash";
        self.exec(SQL, &[&hash])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Vec<Conversation>, read::conversation::List>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Conversation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Conversation>, read::conversation::List>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::conversation::List {
            user_id,
            status,
            kind,
            limit,
        } = by.into_inner();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM conversations \
             WHERE id IN (\
                 SELECT conversation_id \
                 FROM conversation_members \
                 WHERE user_id = $1::UUID \
                   AND deleted_at IS NULL\
             ) \
               AND deleted_at IS NULL \
               AND ($2::INT2 IS NULL OR status = $2::INT2) \
               AND ($3::INT2 IS NULL OR kind = $3::INT2) \
             ORDER BY COALESCE(last_message_at, created_at) DESC, id \
             LIMIT $4::INT8",
        );
        let rows = self
            .query(&sql, &[&user_id, &status, &kind, &limit])
            .await
            .map_err(tracerr::wrap!())?;
        load(&**self, rows).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<read::conversation::Unread, user::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::conversation::Unread;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::conversation::Unread, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let user_id = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(DISTINCT c.id)::INT4 \
            FROM conversations AS c \
            INNER JOIN conversation_members AS m \
                    ON m.conversation_id = c.id \
                   AND m.user_id = $1::UUID \
            INNER JOIN messages AS msg \
                    ON msg.conversation_id = c.id \
            WHERE c.deleted_at IS NULL \
              AND m.deleted_at IS NULL \
              AND msg.sender_id <> $1::UUID \
              AND msg.deleted_at IS NULL \
              AND NOT EXISTS (\
                  SELECT 1 FROM message_receipts AS r \
                  WHERE r.message_id = msg.id \
                    AND r.reader_id = $1::UUID\
              )";
        let rows = self
            .query(SQL, &[&user_id])
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

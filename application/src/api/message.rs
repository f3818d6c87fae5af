//! [`Message`]-related definitions.

use std::future;

use common::{DateTime, Handler as _};
use derive_more::{Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar};
use service::{command, domain, query};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, AsError, Context, Error};

/// A chat message in a conversation.
#[derive(Clone, Debug, From)]
pub struct Message {
    /// ID of this [`Message`].
    id: Id,

    /// Underlying [`domain::Message`].
    message: OnceCell<domain::Message>,
}

impl From<domain::Message> for Message {
    fn from(message: domain::Message) -> Self {
        Self {
            id: message.id.into(),
            message: OnceCell::new_with(Some(message)),
        }
    }
}

impl Message {
    /// Creates a new [`Message`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Message`] with the provided ID exists,
    /// otherwise accessing this [`Message`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            message: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Message`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Message`] doesn't exist.
    async fn message(&self, ctx: &Context) -> Result<&domain::Message, Error> {
        let id = self.id.into();
        self.message
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::message::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|m| {
                        future::ready(m.ok_or_else(|| {
                            api::query::MessageError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A chat message in a conversation.
#[graphql_object(context = Context)]
impl Message {
    /// Unique identifier of this `Message`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `Conversation` this `Message` belongs to.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.conversation",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn conversation(
        &self,
        ctx: &Context,
    ) -> Result<api::Conversation, Error> {
        let conversation_id = self.message(ctx).await?.conversation_id;
        #[expect(
            unsafe_code,
            reason = "`Message` loaded from repository guarantees its \
                      `Conversation` existence"
        )]
        let conversation =
            unsafe { api::Conversation::new_unchecked(conversation_id) };
        Ok(conversation)
    }

    /// `User` who sent this `Message`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.sender",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn sender(&self, ctx: &Context) -> Result<api::User, Error> {
        let sender_id = self.message(ctx).await?.sender_id;
        #[expect(
            unsafe_code,
            reason = "`Message` loaded from repository guarantees its sender \
                      existence"
        )]
        let sender = unsafe { api::User::new_unchecked(sender_id) };
        Ok(sender)
    }

    /// `User` this `Message` is addressed to, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.recipient",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn recipient(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::User>, Error> {
        let recipient_id = self.message(ctx).await?.recipient_id;
        #[expect(
            unsafe_code,
            reason = "`Message` loaded from repository guarantees its \
                      recipient existence"
        )]
        let recipient =
            recipient_id.map(|id| unsafe { api::User::new_unchecked(id) });
        Ok(recipient)
    }

    /// Content of this `Message`.
    ///
    /// Deleted `Message`s show a placeholder.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.content",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn content(&self, ctx: &Context) -> Result<String, Error> {
        Ok(self.message(ctx).await?.content.to_string())
    }

    /// Kind of this `Message`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.kind",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn kind(&self, ctx: &Context) -> Result<Kind, Error> {
        Ok(self.message(ctx).await?.kind.into())
    }

    /// Delivery status of this `Message`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn status(&self, ctx: &Context) -> Result<Status, Error> {
        Ok(self.message(ctx).await?.status.into())
    }

    /// `Message` this one replies to, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.replyTo",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn reply_to(
        &self,
        ctx: &Context,
    ) -> Result<Option<Message>, Error> {
        let reply_to = self.message(ctx).await?.reply_to;
        #[expect(
            unsafe_code,
            reason = "`Message` loaded from repository guarantees the \
                      replied `Message` existence"
        )]
        let replied = reply_to.map(|id| unsafe { Self::new_unchecked(id) });
        Ok(replied)
    }

    /// Read receipts of this `Message`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.readBy",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn read_by(&self, ctx: &Context) -> Result<Vec<Receipt>, Error> {
        ctx.service()
            .execute(query::message::Receipts::by(self.id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|receipts| receipts.into_iter().map(Into::into).collect())
    }

    /// Indicator whether this `Message` is deleted.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.isDeleted",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn is_deleted(&self, ctx: &Context) -> Result<bool, Error> {
        Ok(self.message(ctx).await?.is_deleted())
    }

    /// `DateTime` when this `Message` was sent.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.message(ctx).await?.created_at.coerce())
    }

    /// `DateTime` when this `Message` was edited last time, if it was.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.editedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn edited_at(
        &self,
        ctx: &Context,
    ) -> Result<Option<DateTime>, Error> {
        Ok(self.message(ctx).await?.edited_at.map(|at| at.coerce()))
    }

    /// `DateTime` when this `Message` was deleted, if it was.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Message.deletedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn deleted_at(
        &self,
        ctx: &Context,
    ) -> Result<Option<DateTime>, Error> {
        Ok(self.message(ctx).await?.deleted_at.map(|at| at.coerce()))
    }
}

/// Unique identifier of a `Message`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::message::Id)]
#[into(domain::message::Id)]
#[graphql(name = "MessageId", transparent)]
pub struct Id(Uuid);

/// Kind of a `Message`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "MessageKind")]
pub enum Kind {
    /// Plain text.
    Text,

    /// Image link.
    Image,

    /// File link.
    File,

    /// Message generated by the platform.
    System,

    /// Shared property listing.
    PropertyShare,
}

impl From<domain::message::Kind> for Kind {
    fn from(kind: domain::message::Kind) -> Self {
        use domain::message::Kind as K;
        match kind {
            K::Text => Self::Text,
            K::Image => Self::Image,
            K::File => Self::File,
            K::System => Self::System,
            K::PropertyShare => Self::PropertyShare,
        }
    }
}

impl From<Kind> for domain::message::Kind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Text => Self::Text,
            Kind::Image => Self::Image,
            Kind::File => Self::File,
            Kind::System => Self::System,
            Kind::PropertyShare => Self::PropertyShare,
        }
    }
}

/// Delivery status of a `Message`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "MessageStatus")]
pub enum Status {
    /// `Message` is persisted.
    Sent,

    /// `Message` is delivered to its recipient.
    Delivered,

    /// `Message` is read by its recipient.
    Read,
}

impl From<domain::message::Status> for Status {
    fn from(status: domain::message::Status) -> Self {
        use domain::message::Status as S;
        match status {
            S::Sent => Self::Sent,
            S::Delivered => Self::Delivered,
            S::Read => Self::Read,
        }
    }
}

/// Read receipt of a `Message`.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context, name = "MessageReceipt")]
pub struct Receipt {
    /// `User` who read the `Message`.
    pub reader: api::User,

    /// `DateTime` when the `Message` was read.
    pub read_at: DateTime,
}

impl From<domain::message::Receipt> for Receipt {
    fn from(receipt: domain::message::Receipt) -> Self {
        #[expect(
            unsafe_code,
            reason = "`Receipt` loaded from repository guarantees its reader \
                      existence"
        )]
        let reader = unsafe { api::User::new_unchecked(receipt.reader_id) };
        Self {
            reader,
            read_at: receipt.read_at.coerce(),
        }
    }
}

/// Result of marking `Message`s as read.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "MarkConversationReadResult")]
pub struct MarkReadResult {
    /// Number of `Message`s newly marked as read.
    pub count: i32,

    /// Number of `Message`s still unread.
    pub unread_count: i32,
}

impl From<command::mark_conversation_read::Output> for MarkReadResult {
    fn from(output: command::mark_conversation_read::Output) -> Self {
        let command::mark_conversation_read::Output {
            count,
            unread_count,
        } = output;
        Self {
            count: i32::try_from(count).unwrap_or(i32::MAX),
            unread_count: i32::try_from(unread_count).unwrap_or(i32::MAX),
        }
    }
}

pub mod list {
    //! Definitions related to the [`Message`] list.

    use common::DateTime;
    use derive_more::{From, Into};
    use juniper::{graphql_object, GraphQLObject, GraphQLScalar};
    use service::read;

    use super::Message;
    use crate::Context;

    /// Cursor for the `Message` list.
    #[derive(Clone, Copy, Debug, GraphQLScalar)]
    #[graphql(name = "MessageListCursor", transparent)]
    pub struct Cursor(DateTime);

    impl From<read::message::list::Cursor> for Cursor {
        fn from(cursor: read::message::list::Cursor) -> Self {
            Self(cursor.coerce())
        }
    }

    impl From<Cursor> for read::message::list::Cursor {
        fn from(cursor: Cursor) -> Self {
            cursor.0.coerce()
        }
    }

    /// Edge in the [`Message`] list.
    #[derive(Clone, Copy, Debug, From, Into)]
    pub struct Edge(read::message::list::Edge);

    /// Edge in the `Message` list.
    #[graphql_object(name = "MessageListEdge", context = Context)]
    impl Edge {
        /// Cursor of this `MessageListEdge`.
        #[must_use]
        pub fn cursor(&self) -> Cursor {
            self.0.cursor.into()
        }

        /// Node of this `MessageListEdge`.
        #[must_use]
        pub fn node(&self) -> Message {
            #[expect(
                unsafe_code,
                reason = "`Edge` loaded from repository guarantees `Message` \
                          existence"
            )]
            unsafe {
                Message::new_unchecked(self.0.node)
            }
        }
    }

    /// Connection of the [`Message`] list.
    #[derive(Clone, Debug, From, Into)]
    pub struct Connection(read::message::list::Connection);

    /// Connection of the `Message` list.
    #[graphql_object(name = "MessageListConnection", context = Context)]
    impl Connection {
        /// Edges of this `MessageListConnection`, oldest first.
        #[must_use]
        pub fn edges(&self) -> Vec<Edge> {
            self.0.edges.iter().copied().map(Into::into).collect()
        }

        /// Information about the page.
        #[must_use]
        pub fn page_info(&self) -> PageInfo {
            let info = self.0.page_info();
            PageInfo {
                has_next_page: info.has_next_page,
                has_previous_page: info.has_previous_page,
                start_cursor: info.start_cursor.map(Into::into),
                end_cursor: info.end_cursor.map(Into::into),
            }
        }
    }

    /// Information about a `MessageListConnection` page.
    #[derive(Clone, Copy, Debug, GraphQLObject)]
    #[graphql(name = "MessageListPageInfo")]
    pub struct PageInfo {
        /// Indicator whether there is a next page.
        pub has_next_page: bool,

        /// Indicator whether there is a previous page.
        pub has_previous_page: bool,

        /// Start cursor of the page.
        pub start_cursor: Option<Cursor>,

        /// End cursor of the page.
        pub end_cursor: Option<Cursor>,
    }
}

//! [`Conversation`]-related definitions.

use std::future;

use common::{DateTime, Handler as _};
use derive_more::{Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar};
use service::{command, domain, query, read};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, AsError, Context, Error};

/// A pairwise conversation between two users.
#[derive(Clone, Debug, From)]
pub struct Conversation {
    /// ID of this [`Conversation`].
    id: Id,

    /// Underlying [`domain::Conversation`].
    conversation: OnceCell<domain::Conversation>,
}

impl From<domain::Conversation> for Conversation {
    fn from(conversation: domain::Conversation) -> Self {
        Self {
            id: conversation.id.into(),
            conversation: OnceCell::new_with(Some(conversation)),
        }
    }
}

impl Conversation {
    /// Creates a new [`Conversation`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Conversation`] with the provided ID exists,
    /// otherwise accessing this [`Conversation`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            conversation: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Conversation`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Conversation`] doesn't exist.
    pub(crate) async fn conversation(
        &self,
        ctx: &Context,
    ) -> Result<&domain::Conversation, Error> {
        let id = self.id.into();
        self.conversation
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::conversation::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|c| {
                        future::ready(c.ok_or_else(|| {
                            api::query::ConversationError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A pairwise conversation between two users.
#[graphql_object(context = Context)]
impl Conversation {
    /// Unique identifier of this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `User`s participating in this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.participants",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn participants(
        &self,
        ctx: &Context,
    ) -> Result<Vec<api::User>, Error> {
        let conversation = self.conversation(ctx).await?;
        #[expect(
            unsafe_code,
            reason = "`Conversation` loaded from repository guarantees its \
                      participants existence"
        )]
        let users = conversation
            .participants
            .iter()
            .map(|id| unsafe { api::User::new_unchecked(id) })
            .collect();
        Ok(users)
    }

    /// Participant of this `Conversation` other than the current `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.otherParticipant",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn other_participant(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::User>, Error> {
        let my_id = ctx.current_session().await?.user_id;
        let conversation = self.conversation(ctx).await?;
        #[expect(
            unsafe_code,
            reason = "`Conversation` loaded from repository guarantees its \
                      participants existence"
        )]
        let user = conversation
            .participants
            .other(my_id.into())
            .map(|id| unsafe { api::User::new_unchecked(id) });
        Ok(user)
    }

    /// `Property` this `Conversation` is about, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.property",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn property(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::Property>, Error> {
        let property_id = self.conversation(ctx).await?.property_id;
        #[expect(
            unsafe_code,
            reason = "`Conversation` loaded from repository guarantees its \
                      `Property` existence"
        )]
        let property = property_id
            .map(|id| unsafe { api::Property::new_unchecked(id) });
        Ok(property)
    }

    /// Kind of this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.kind",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn kind(&self, ctx: &Context) -> Result<Kind, Error> {
        Ok(self.conversation(ctx).await?.kind.into())
    }

    /// Status of this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn status(&self, ctx: &Context) -> Result<Status, Error> {
        Ok(self.conversation(ctx).await?.status.into())
    }

    /// Title of this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.title",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn title(&self, ctx: &Context) -> Result<String, Error> {
        Ok(self.conversation(ctx).await?.title.to_string())
    }

    /// Last `Message` sent to this `Conversation`, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.lastMessage",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn last_message(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::Message>, Error> {
        let message_id = self.conversation(ctx).await?.last_message_id;
        #[expect(
            unsafe_code,
            reason = "`Conversation` loaded from repository guarantees its \
                      last `Message` existence"
        )]
        let message =
            message_id.map(|id| unsafe { api::Message::new_unchecked(id) });
        Ok(message)
    }

    /// `DateTime` when the last `Message` was sent to this `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.lastMessageAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn last_message_at(
        &self,
        ctx: &Context,
    ) -> Result<Option<DateTime>, Error> {
        Ok(self
            .conversation(ctx)
            .await?
            .last_message_at
            .map(|at| at.coerce()))
    }

    /// Number of `Message`s in this `Conversation` not read by the current
    /// `User` yet.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.unreadCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn unread_count(&self, ctx: &Context) -> Result<i32, Error> {
        let my_id = ctx.current_session().await?.user_id;
        let count = ctx
            .service()
            .execute(query::messages::UnreadCount::by(
                read::message::Unread::all(self.id.into(), my_id.into()),
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        Ok(i32::try_from(u32::from(count)).unwrap_or(i32::MAX))
    }

    /// `DateTime` when this `Conversation` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.conversation(ctx).await?.created_at.coerce())
    }

    /// `DateTime` when this `Conversation` was updated last time.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Conversation.updatedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn updated_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.conversation(ctx).await?.updated_at.coerce())
    }
}

/// Unique identifier of a `Conversation`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::conversation::Id)]
#[into(domain::conversation::Id)]
#[graphql(name = "ConversationId", transparent)]
pub struct Id(Uuid);

/// Kind of a `Conversation`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "ConversationKind")]
pub enum Kind {
    /// Inquiry about a `Property`.
    PropertyInquiry,

    /// General chat.
    General,

    /// Chat with the platform support.
    Support,
}

impl From<domain::conversation::Kind> for Kind {
    fn from(kind: domain::conversation::Kind) -> Self {
        use domain::conversation::Kind as K;
        match kind {
            K::PropertyInquiry => Self::PropertyInquiry,
            K::General => Self::General,
            K::Support => Self::Support,
        }
    }
}

impl From<Kind> for domain::conversation::Kind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::PropertyInquiry => Self::PropertyInquiry,
            Kind::General => Self::General,
            Kind::Support => Self::Support,
        }
    }
}

/// Status of a `Conversation`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "ConversationStatus")]
pub enum Status {
    /// `Conversation` is in use.
    Active,

    /// `Conversation` is archived until the next `Message`.
    Archived,

    /// `Conversation` doesn't accept new `Message`s.
    Blocked,
}

impl From<domain::conversation::Status> for Status {
    fn from(status: domain::conversation::Status) -> Self {
        use domain::conversation::Status as S;
        match status {
            S::Active => Self::Active,
            S::Archived => Self::Archived,
            S::Blocked => Self::Blocked,
        }
    }
}

impl From<Status> for domain::conversation::Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Active => Self::Active,
            Status::Archived => Self::Archived,
            Status::Blocked => Self::Blocked,
        }
    }
}

/// Result of resolving a `Conversation` between two `User`s.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context, name = "FindOrCreateConversationResult")]
pub struct FindOrCreateResult {
    /// Resolved `Conversation`.
    pub conversation: Conversation,

    /// Indicator whether the `Conversation` has been created.
    pub created: bool,
}

impl From<command::find_or_create_conversation::Output> for FindOrCreateResult {
    fn from(output: command::find_or_create_conversation::Output) -> Self {
        let command::find_or_create_conversation::Output {
            conversation,
            created,
        } = output;
        Self {
            conversation: conversation.into(),
            created,
        }
    }
}

//! GraphQL [`Query`]s definitions.

use common::DateTime;
use juniper::graphql_object;
use service::{
    domain::{self, user::RoleSet},
    query, read, Query as _,
};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the currently authenticated `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myUser",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_user(ctx: &Context) -> Result<api::User, Error> {
        ctx.current_user().await.cloned().map(Into::into)
    }

    /// Returns the `User` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `USER_NOT_EXISTS` - the `User` with the specified ID does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "user",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn user(
        id: api::user::Id,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        ctx.service()
            .execute(query::user::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| UserError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Property` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does
    ///                           not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "property",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn property(
        id: api::property::Id,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        ctx.service()
            .execute(query::property::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| PropertyError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Fetches the page of `Property`s, newest first.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PAGINATION_AMBIGUOUS` - the pagination arguments are ambiguous.
    #[tracing::instrument(
        skip_all,
        fields(
            after = ?after,
            before = ?before,
            first = ?first,
            gql.name = "properties",
            landlord_id = ?landlord_id,
            last = ?last,
            otel.name = Self::SPAN_NAME,
            search = ?search.as_ref().map(ToString::to_string),
        ),
    )]
    #[expect(clippy::too_many_arguments, reason = "still readable")]
    pub async fn properties(
        first: Option<i32>,
        after: Option<api::property::list::Cursor>,
        last: Option<i32>,
        before: Option<api::property::list::Cursor>,
        landlord_id: Option<api::user::Id>,
        search: Option<api::property::Title>,
        ctx: &Context,
    ) -> Result<api::property::list::Connection, Error> {
        const DEFAULT_PAGE_SIZE: i32 = 10;

        let filter = read::property::list::Filter {
            landlord_id: landlord_id.map(Into::into),
            search: search.map(Into::into),
        };
        let page = ctx
            .service()
            .execute(query::properties::List::by(
                read::property::list::Selector {
                    arguments: read::property::list::Arguments::new(
                        first,
                        after.map(Into::into),
                        last,
                        before.map(Into::into),
                        DEFAULT_PAGE_SIZE,
                    )
                    .ok_or_else(|| api::PaginationError::Ambiguous.into())
                    .map_err(ctx.error())?,
                    filter: filter.clone(),
                },
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(api::property::list::Connection::new(page, filter))
    }

    /// Checks whether the `Property` with the specified ID is free of
    /// confirmed `Booking`s for the specified dates.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PROPERTY_NOT_EXISTS` - the `Property` with the specified ID does
    ///                           not exist;
    /// - `INVALID_RANGE` - `checkOut` is not at least one night after
    ///                     `checkIn`.
    #[tracing::instrument(
        skip_all,
        fields(
            check_in = %check_in.to_rfc3339(),
            check_out = %check_out.to_rfc3339(),
            gql.name = "propertyAvailability",
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
        ),
    )]
    pub async fn property_availability(
        property_id: api::property::Id,
        check_in: DateTime,
        check_out: DateTime,
        ctx: &Context,
    ) -> Result<api::property::Availability, Error> {
        let (check_in, check_out) = (check_in.coerce(), check_out.coerce());
        let nights = domain::Booking::nights(check_in, check_out)
            .ok_or_else(|| AvailabilityError::InvalidRange.into())
            .map_err(ctx.error())?;

        let property = ctx
            .service()
            .execute(query::property::ById::by(property_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| PropertyError::NotExists.into())
            .map_err(ctx.error())?;
        let conflict = ctx
            .service()
            .execute(query::property::Availability::by(
                read::booking::Availability {
                    property_id: property.id,
                    check_in,
                    check_out,
                    scope: read::booking::Scope::Confirmed,
                    except: None,
                },
            ))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(api::property::Availability {
            is_available: conflict.is_none(),
            nights: i32::try_from(nights).unwrap_or(i32::MAX),
        })
    }

    /// Returns the `Booking` with the specified ID.
    ///
    /// Visible to its renter, the landlord of the booked `Property` and
    /// administrators only.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` with the specified ID does not
    ///                          exist;
    /// - `FORBIDDEN` - the current `User` cannot access the `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "booking",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        let me = ctx.current_user().await?;
        let booking = ctx
            .service()
            .execute(query::booking::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| BookingError::NotExists.into())
            .map_err(ctx.error())?;

        if booking.renter_id != me.id && !me.is_any_of(RoleSet::ADMIN) {
            let landlord_id = ctx
                .service()
                .execute(query::property::ById::by(booking.property_id))
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())?
                .map(|p| p.landlord_id);
            if landlord_id != Some(me.id) {
                return Err(api::PrivilegeError::Forbidden.into());
            }
        }

        Ok(booking.into())
    }

    /// Fetches the page of `Booking`s, newest first.
    ///
    /// Administrators may list `Booking`s of any renter, other `User`s only
    /// see their own ones.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PAGINATION_AMBIGUOUS` - the pagination arguments are ambiguous;
    /// - `FORBIDDEN` - the current `User` lists `Booking`s of another one.
    #[tracing::instrument(
        skip_all,
        fields(
            after = ?after,
            before = ?before,
            first = ?first,
            gql.name = "bookings",
            last = ?last,
            otel.name = Self::SPAN_NAME,
            renter_id = ?renter_id,
            status = ?status,
        ),
    )]
    #[expect(clippy::too_many_arguments, reason = "still readable")]
    pub async fn bookings(
        first: Option<i32>,
        after: Option<api::booking::list::Cursor>,
        last: Option<i32>,
        before: Option<api::booking::list::Cursor>,
        renter_id: Option<api::user::Id>,
        status: Option<api::booking::Status>,
        ctx: &Context,
    ) -> Result<api::booking::list::Connection, Error> {
        const DEFAULT_PAGE_SIZE: i32 = 10;

        let arguments = read::booking::list::Arguments::new(
            first,
            after.map(Into::into),
            last,
            before.map(Into::into),
            DEFAULT_PAGE_SIZE,
        )
        .ok_or_else(|| api::PaginationError::Ambiguous.into())
        .map_err(ctx.error())?;

        let me = ctx.current_user().await?;
        let renter_id = if me.is_any_of(RoleSet::ADMIN) {
            renter_id.map(Into::into)
        } else {
            match renter_id.map(domain::user::Id::from) {
                Some(id) if id != me.id => {
                    return Err(api::PrivilegeError::Forbidden.into());
                }
                _ => Some(me.id),
            }
        };

        let filter = read::booking::list::Filter {
            renter_id,
            status: status.map(Into::into),
        };
        let page = ctx
            .service()
            .execute(query::bookings::List::by(read::booking::list::Selector {
                arguments,
                filter,
            }))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        Ok(api::booking::list::Connection::new(page, filter))
    }

    /// Returns the `Payment` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PAYMENT_NOT_EXISTS` - the `Payment` with the specified ID does not
    ///                          exist;
    /// - `FORBIDDEN` - the current `User` is neither the payer nor an
    ///                 administrator.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "payment",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn payment(
        id: api::payment::Id,
        ctx: &Context,
    ) -> Result<api::Payment, Error> {
        let me = ctx.current_user().await?;
        let payment = ctx
            .service()
            .execute(query::payment::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| PaymentError::NotExists.into())
            .map_err(ctx.error())?;

        if payment.user_id != me.id && !me.is_any_of(RoleSet::ADMIN) {
            return Err(api::PrivilegeError::Forbidden.into());
        }
        Ok(payment.into())
    }

    /// Lists `Conversation`s of the current `User`, most recently active
    /// first.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "conversations",
            kind = ?kind,
            limit = ?limit,
            otel.name = Self::SPAN_NAME,
            status = ?status,
        ),
    )]
    pub async fn conversations(
        status: Option<api::conversation::Status>,
        kind: Option<api::conversation::Kind>,
        limit: Option<i32>,
        ctx: &Context,
    ) -> Result<Vec<api::Conversation>, Error> {
        const DEFAULT_LIMIT: usize = 50;
        const MAX_LIMIT: usize = 100;

        let limit = limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);

        let my_id = ctx.current_session().await?.user_id;
        ctx.service()
            .execute(query::conversations::List::by(read::conversation::List {
                user_id: my_id.into(),
                status: status.map(Into::into),
                kind: kind.map(Into::into),
                limit,
            }))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|list| list.into_iter().map(Into::into).collect())
    }

    /// Returns the `Conversation` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` with the specified ID
    ///                               does not exist, is deleted, or the
    ///                               current `User` doesn't participate in
    ///                               it.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "conversation",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn conversation(
        id: api::conversation::Id,
        ctx: &Context,
    ) -> Result<api::Conversation, Error> {
        let my_id: domain::user::Id =
            ctx.current_session().await?.user_id.into();
        ctx.service()
            .execute(query::conversation::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .filter(|c| {
                c.is_participant(my_id)
                    && !c.is_deleted()
                    && !c.is_deleted_for(my_id)
            })
            .ok_or_else(|| ConversationError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Fetches the page of `Message`s in the specified `Conversation`,
    /// oldest first within the page.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `PAGINATION_AMBIGUOUS` - the pagination arguments are ambiguous;
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` with the specified ID
    ///                               is not accessible by the current `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            after = ?after,
            before = ?before,
            conversation_id = %conversation_id,
            first = ?first,
            gql.name = "messages",
            last = ?last,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn messages(
        conversation_id: api::conversation::Id,
        first: Option<i32>,
        after: Option<api::message::list::Cursor>,
        last: Option<i32>,
        before: Option<api::message::list::Cursor>,
        ctx: &Context,
    ) -> Result<api::message::list::Connection, Error> {
        const DEFAULT_PAGE_SIZE: i32 = 50;

        let arguments = read::message::list::Arguments::new(
            first,
            after.map(Into::into),
            last,
            before.map(Into::into),
            DEFAULT_PAGE_SIZE,
        )
        .ok_or_else(|| api::PaginationError::Ambiguous.into())
        .map_err(ctx.error())?;

        _ = Self::conversation(conversation_id, ctx).await?;

        ctx.service()
            .execute(query::messages::List::by(read::message::list::Selector {
                arguments,
                filter: read::message::list::Filter {
                    conversation_id: conversation_id.into(),
                },
            }))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Counts `Conversation`s having `Message`s not read by the current
    /// `User` yet.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "unreadCount",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn unread_count(ctx: &Context) -> Result<i32, Error> {
        let my_id = ctx.current_session().await?.user_id;
        let unread = ctx
            .service()
            .execute(query::conversations::Unread::by(my_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        Ok(i32::try_from(u32::from(unread)).unwrap_or(i32::MAX))
    }
}

define_error! {
    enum AvailabilityError {
        #[code = "INVALID_RANGE"]
        #[status = BAD_REQUEST]
        #[message = "`checkOut` must be at least one night after `checkIn`"]
        InvalidRange,
    }
}

define_error! {
    enum BookingError {
        #[code = "BOOKING_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Booking` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum ConversationError {
        #[code = "CONVERSATION_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Conversation` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum MessageError {
        #[code = "MESSAGE_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Message` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum PaymentError {
        #[code = "PAYMENT_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Payment` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum PropertyError {
        #[code = "PROPERTY_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Property` with the specified ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum UserError {
        #[code = "USER_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`User` with the specified ID does not exist"]
        NotExists,
    }
}

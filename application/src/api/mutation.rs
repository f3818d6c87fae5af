//! GraphQL [`Mutation`]s definitions.

use common::{DateTime, Money};
use juniper::graphql_object;
use service::{command, Command as _};

use crate::{api, define_error, AsError, Context, Error, Session};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Registers a new `User` and signs it in.
    ///
    /// The `User` is registered as a renter unless `role` is specified.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `EMAIL_OCCUPIED` - provided `UserEmail` is occupied by another
    ///                      `User`;
    /// - `ROLE_NOT_ALLOWED` - provided `UserRole` cannot be chosen on
    ///                        registration.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "createUser",
            name = %name,
            otel.name = Self::SPAN_NAME,
            phone = ?phone,
            role = ?role,
        ),
    )]
    pub async fn create_user(
        name: api::user::Name,
        email: api::user::Email,
        password: api::user::Password,
        phone: Option<api::user::Phone>,
        role: Option<api::user::Role>,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let user = ctx
            .service()
            .execute(command::CreateUser {
                name: name.into(),
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
                phone: phone.map(Into::into),
                role: role.map(Into::into).unwrap_or_default(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        let output = ctx
            .service()
            .execute(command::CreateUserSession::ByUserId(user.id))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            user_id: output.user.id.into(),
            token: output.token.clone(),
            expires_at: output.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Creates a new `UserSession` with the provided credentials.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WRONG_CREDENTIALS` - provided credentials does not match any `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "createUserSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_user_session(
        email: api::user::Email,
        password: api::user::Password,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::CreateUserSession::ByCredentials {
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            user_id: output.user.id.into(),
            token: output.token.clone(),
            expires_at: output.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Sends a one-time verification code to the `User` with the provided
    /// email.
    ///
    /// A previously issued code is replaced.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `USER_NOT_EXISTS` - no `User` has the provided `UserEmail`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "issueOneTimeCode",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn issue_one_time_code(
        email: api::user::Email,
        ctx: &Context,
    ) -> Result<bool, Error> {
        ctx.service()
            .execute(command::IssueOneTimeCode {
                email: email.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        Ok(true)
    }

    /// Redeems the one-time code, marks the `User` as verified and signs it
    /// in.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `USER_NOT_EXISTS` - no `User` has the provided `UserEmail`;
    /// - `WRONG_CODE` - the code is wrong or expired.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "verifyUser",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn verify_user(
        email: api::user::Email,
        code: String,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::VerifyUser {
                email: email.into(),
                code,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            user_id: output.user.id.into(),
            token: output.token.clone(),
            expires_at: output.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Lists a new `Property` of the current `User`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `FORBIDDEN` - the current `User` is not a landlord;
    /// - `INVALID_RENT` - provided rent is not positive.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createProperty",
            location = %location,
            otel.name = Self::SPAN_NAME,
            rent = %rent,
            title = %title,
        ),
    )]
    pub async fn create_property(
        title: api::property::Title,
        location: api::property::Location,
        description: Option<api::property::Description>,
        rent: Money,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        let landlord_id =
            ctx.authorize(command::CreateProperty::ROLES).await?.id;

        ctx.service()
            .execute(command::CreateProperty {
                landlord_id,
                title: title.into(),
                location: location.into(),
                description: description.map(Into::into),
                rent,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Books the `Property` for the provided dates and initializes its
    /// payment.
    ///
    /// Returns the URL of the hosted payment page to redirect to.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_RANGE` - `checkOut` is not at least one night after
    ///                     `checkIn`;
    /// - `INVALID_GUESTS` - number of guests is out of range;
    /// - `PROPERTY_NOT_EXISTS` - the `Property` does not exist or is not
    ///                           bookable;
    /// - `BOOKING_CONFLICT` - the dates are held by another `Booking`;
    /// - `UPSTREAM_FAILURE` - the payment gateway failed.
    #[tracing::instrument(
        skip_all,
        fields(
            check_in = %check_in.to_rfc3339(),
            check_out = %check_out.to_rfc3339(),
            gql.name = "createBooking",
            guests = %guests,
            otel.name = Self::SPAN_NAME,
            property_id = %property_id,
        ),
    )]
    pub async fn create_booking(
        property_id: api::property::Id,
        check_in: DateTime,
        check_out: DateTime,
        guests: i32,
        ctx: &Context,
    ) -> Result<api::booking::CreateResult, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::CreateBooking {
                renter_id: my_id.into(),
                property_id: property_id.into(),
                check_in: check_in.coerce(),
                check_out: check_out.coerce(),
                guests,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Verifies the payment with the provided reference and confirms its
    /// `Booking`.
    ///
    /// Safe to repeat: an already paid `Booking` is returned as is.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - no `Booking` has the provided reference;
    /// - `BOOKING_CONFLICT` - the dates are confirmed for another `Booking`;
    /// - `INVALID_STATE` - the `Booking` cannot be confirmed anymore;
    /// - `UPSTREAM_FAILURE` - the payment gateway failed.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "confirmBookingPayment",
            otel.name = Self::SPAN_NAME,
            reference = %reference,
        ),
    )]
    pub async fn confirm_booking_payment(
        reference: api::payment::Reference,
        ctx: &Context,
    ) -> Result<api::booking::VerificationResult, Error> {
        ctx.service()
            .execute(command::ConfirmBookingPayment {
                reference: reference.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Cancels the `Booking` with the provided ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `BOOKING_NOT_EXISTS` - the `Booking` does not exist;
    /// - `FORBIDDEN` - the current `User` cannot cancel the `Booking`;
    /// - `INVALID_STATE` - the `Booking` cannot be cancelled anymore.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "cancelBooking",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn cancel_booking(
        id: api::booking::Id,
        ctx: &Context,
    ) -> Result<api::Booking, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::CancelBooking {
                booking_id: id.into(),
                actor_id: my_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns the `Conversation` between the current `User` and the provided
    /// one, creating it if there is none yet.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_PARTICIPANTS` - the current `User` is the provided one;
    /// - `USER_NOT_EXISTS` - the provided `User` does not exist;
    /// - `PROPERTY_NOT_EXISTS` - the provided `Property` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "findOrCreateConversation",
            kind = ?kind,
            otel.name = Self::SPAN_NAME,
            participant_id = %participant_id,
            property_id = ?property_id,
        ),
    )]
    pub async fn find_or_create_conversation(
        participant_id: api::user::Id,
        property_id: Option<api::property::Id>,
        kind: Option<api::conversation::Kind>,
        ctx: &Context,
    ) -> Result<api::conversation::FindOrCreateResult, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::FindOrCreateConversation {
                participants: vec![my_id.into(), participant_id.into()],
                property_id: property_id.map(Into::into),
                kind: kind.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Archives the `Conversation` until the next `Message` is sent to it.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` does not exist;
    /// - `NOT_PARTICIPANT` - the current `User` doesn't participate in the
    ///                       `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "archiveConversation",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn archive_conversation(
        id: api::conversation::Id,
        ctx: &Context,
    ) -> Result<api::Conversation, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::ArchiveConversation {
                conversation_id: id.into(),
                user_id: my_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Hides the `Conversation` from the current `User`.
    ///
    /// The `Conversation` is deleted completely once both its participants
    /// delete it.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` does not exist;
    /// - `NOT_PARTICIPANT` - the current `User` doesn't participate in the
    ///                       `Conversation`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "deleteConversation",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn delete_conversation(
        id: api::conversation::Id,
        ctx: &Context,
    ) -> Result<api::Conversation, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::DeleteConversation {
                conversation_id: id.into(),
                user_id: my_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Sends a new `Message` to the `Conversation`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_CONTENT` - the content is empty or too long;
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` does not exist;
    /// - `NOT_PARTICIPANT` - the current `User` doesn't participate in the
    ///                       `Conversation`;
    /// - `CONVERSATION_CLOSED` - the `Conversation` doesn't accept new
    ///                           `Message`s;
    /// - `MESSAGE_NOT_EXISTS` - the replied `Message` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            conversation_id = %conversation_id,
            gql.name = "sendMessage",
            kind = ?kind,
            otel.name = Self::SPAN_NAME,
            reply_to = ?reply_to,
        ),
    )]
    pub async fn send_message(
        conversation_id: api::conversation::Id,
        content: String,
        kind: Option<api::message::Kind>,
        reply_to: Option<api::message::Id>,
        ctx: &Context,
    ) -> Result<api::Message, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::SendMessage {
                conversation_id: conversation_id.into(),
                sender_id: my_id.into(),
                content,
                kind: kind.map_or_else(Default::default, Into::into),
                reply_to: reply_to.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Marks `Message`s of the `Conversation` as read by the current `User`.
    ///
    /// Only the specified `Message` is marked if `messageId` is provided.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `CONVERSATION_NOT_EXISTS` - the `Conversation` does not exist;
    /// - `NOT_PARTICIPANT` - the current `User` doesn't participate in the
    ///                       `Conversation`;
    /// - `MESSAGE_NOT_EXISTS` - the specified `Message` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            conversation_id = %conversation_id,
            gql.name = "markConversationRead",
            message_id = ?message_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn mark_conversation_read(
        conversation_id: api::conversation::Id,
        message_id: Option<api::message::Id>,
        ctx: &Context,
    ) -> Result<api::message::MarkReadResult, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::MarkConversationRead {
                conversation_id: conversation_id.into(),
                reader_id: my_id.into(),
                message_id: message_id.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Edits the content of the `Message` sent by the current `User`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `INVALID_CONTENT` - the content is empty or too long;
    /// - `MESSAGE_NOT_EXISTS` - the `Message` does not exist;
    /// - `FORBIDDEN` - the `Message` is sent by another `User`;
    /// - `MESSAGE_EXPIRED` - the `Message` is too old to be edited.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "editMessage",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn edit_message(
        id: api::message::Id,
        content: String,
        ctx: &Context,
    ) -> Result<api::Message, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::EditMessage {
                message_id: id.into(),
                editor_id: my_id.into(),
                content,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Deletes the `Message` sent by the current `User`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `MESSAGE_NOT_EXISTS` - the `Message` does not exist;
    /// - `FORBIDDEN` - the `Message` is sent by another `User`;
    /// - `MESSAGE_EXPIRED` - the `Message` is too old to be deleted.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "deleteMessage",
            id = %id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn delete_message(
        id: api::message::Id,
        ctx: &Context,
    ) -> Result<api::Message, Error> {
        let my_id = ctx.current_session().await?.user_id;

        ctx.service()
            .execute(command::DeleteMessage {
                message_id: id.into(),
                actor_id: my_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "EMAIL_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "Provided `UserEmail` is occupied by another \
                             `User`"]
                EmailOccupied,

                #[code = "ROLE_NOT_ALLOWED"]
                #[status = BAD_REQUEST]
                #[message = "Provided `UserRole` cannot be chosen on \
                             registration"]
                RoleNotAllowed,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::EmailOccupied(_) => Error::EmailOccupied.into(),
            Self::RoleNotAllowed(_) => Error::RoleNotAllowed.into(),
        })
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = UNAUTHORIZED]
                #[message = "Provided credentials does not match any `User`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::UserNotExists(_) | Self::WrongCredentials => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::issue_one_time_code::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided email does not exist"]
                UserNotExists,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::KeyValue(e) => e.try_as_error(),
            Self::Notifier(e) => e.try_as_error(),
            Self::UserNotExists(_) => Some(Error::UserNotExists.into()),
        }
    }
}

impl AsError for command::verify_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided email does not exist"]
                UserNotExists,

                #[code = "WRONG_CODE"]
                #[status = FORBIDDEN]
                #[message = "One-time code is wrong or expired"]
                WrongCode,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::KeyValue(e) => e.try_as_error(),
            Self::JsonWebTokenEncodeError(_) => None,
            Self::UserNotExists(_) => Some(Error::UserNotExists.into()),
            Self::WrongCode => Some(Error::WrongCode.into()),
        }
    }
}

impl AsError for command::create_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_RENT"]
                #[status = BAD_REQUEST]
                #[message = "Rent must be positive"]
                InvalidRent,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::UserNotExists(_) => return None,
            Self::Forbidden(_) => api::PrivilegeError::Forbidden.into(),
            Self::InvalidRent(_) => Error::InvalidRent.into(),
        })
    }
}

impl AsError for command::create_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_RANGE"]
                #[status = BAD_REQUEST]
                #[message = "`checkOut` must be at least one night after \
                             `checkIn`"]
                InvalidRange,

                #[code = "INVALID_GUESTS"]
                #[status = BAD_REQUEST]
                #[message = "Number of guests is out of range"]
                InvalidGuests,

                #[code = "PROPERTY_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`Property` with the provided ID does not exist"]
                PropertyNotExists,

                #[code = "BOOKING_CONFLICT"]
                #[status = CONFLICT]
                #[message = "Provided dates are already booked"]
                Conflict,

                #[code = "BOOKING_CANCELLED"]
                #[status = CONFLICT]
                #[message = "`Booking` was cancelled before its payment \
                             started"]
                Cancelled,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::PaymentGateway(e) => return e.try_as_error(),
            Self::InvalidState(_) => Error::Cancelled.into(),
            Self::InvalidRange => Error::InvalidRange.into(),
            Self::InvalidGuests(_) => Error::InvalidGuests.into(),
            Self::UserNotExists(_) => return None,
            Self::PropertyNotExists(_) => Error::PropertyNotExists.into(),
            Self::Conflict(_) => Error::Conflict.into(),
        })
    }
}

impl AsError for command::confirm_booking_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "BOOKING_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "No `Booking` has the provided payment reference"]
                BookingNotExists,

                #[code = "INVALID_STATE"]
                #[status = CONFLICT]
                #[message = "`Booking` cannot be confirmed anymore"]
                InvalidState,

                #[code = "BOOKING_CONFLICT"]
                #[status = CONFLICT]
                #[message = "Dates are already confirmed for another \
                             `Booking`"]
                Conflict,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::PaymentGateway(e) => return e.try_as_error(),
            Self::BookingNotExists(_) => Error::BookingNotExists.into(),
            Self::InvalidState(_) => Error::InvalidState.into(),
            Self::Conflict(_) => Error::Conflict.into(),
        })
    }
}

impl AsError for command::cancel_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "BOOKING_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`Booking` with the provided ID does not exist"]
                BookingNotExists,

                #[code = "INVALID_STATE"]
                #[status = CONFLICT]
                #[message = "`Booking` cannot be cancelled anymore"]
                InvalidState,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::BookingNotExists(_) => Error::BookingNotExists.into(),
            Self::UserNotExists(_) => return None,
            Self::Forbidden(_) => api::PrivilegeError::Forbidden.into(),
            Self::InvalidState(_) => Error::InvalidState.into(),
        })
    }
}

impl AsError for command::find_or_create_conversation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_PARTICIPANTS"]
                #[status = BAD_REQUEST]
                #[message = "`Conversation` needs two distinct participants"]
                InvalidParticipants,

                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided ID does not exist"]
                UserNotExists,

                #[code = "PROPERTY_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`Property` with the provided ID does not exist"]
                PropertyNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidParticipants(_) => Error::InvalidParticipants.into(),
            Self::UserNotExists(_) => Error::UserNotExists.into(),
            Self::PropertyNotExists(_) => Error::PropertyNotExists.into(),
        })
    }
}

define_error! {
    enum ConversationAccessError {
        #[code = "CONVERSATION_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Conversation` with the provided ID does not exist"]
        NotExists,

        #[code = "NOT_PARTICIPANT"]
        #[status = FORBIDDEN]
        #[message = "Current `User` doesn't participate in the `Conversation`"]
        NotParticipant,
    }
}

impl AsError for command::archive_conversation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ConversationNotExists(_) => {
                ConversationAccessError::NotExists.into()
            }
            Self::NotParticipant(_) => {
                ConversationAccessError::NotParticipant.into()
            }
        })
    }
}

impl AsError for command::delete_conversation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ConversationNotExists(_) => {
                ConversationAccessError::NotExists.into()
            }
            Self::NotParticipant(_) => {
                ConversationAccessError::NotParticipant.into()
            }
        })
    }
}

impl AsError for command::send_message::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_CONTENT"]
                #[status = BAD_REQUEST]
                #[message = "`Message` content must be non-empty and not too \
                             long"]
                InvalidContent,

                #[code = "CONVERSATION_CLOSED"]
                #[status = FORBIDDEN]
                #[message = "`Conversation` doesn't accept new `Message`s"]
                ConversationClosed,

                #[code = "MESSAGE_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "Replied `Message` does not exist"]
                MessageNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidContent => Error::InvalidContent.into(),
            Self::ConversationNotExists(_) => {
                ConversationAccessError::NotExists.into()
            }
            Self::NotParticipant(_) => {
                ConversationAccessError::NotParticipant.into()
            }
            Self::ConversationClosed(_) => Error::ConversationClosed.into(),
            Self::MessageNotExists(_) => Error::MessageNotExists.into(),
        })
    }
}

impl AsError for command::mark_conversation_read::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "MESSAGE_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`Message` with the provided ID does not exist"]
                MessageNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ConversationNotExists(_) => {
                ConversationAccessError::NotExists.into()
            }
            Self::NotParticipant(_) => {
                ConversationAccessError::NotParticipant.into()
            }
            Self::MessageNotExists(_) => Error::MessageNotExists.into(),
        })
    }
}

define_error! {
    enum MessageModificationError {
        #[code = "MESSAGE_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Message` with the provided ID does not exist"]
        NotExists,

        #[code = "MESSAGE_EXPIRED"]
        #[status = GONE]
        #[message = "`Message` is too old to be modified"]
        Expired,
    }
}

impl AsError for command::edit_message::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_CONTENT"]
                #[status = BAD_REQUEST]
                #[message = "`Message` content must be non-empty and not too \
                             long"]
                InvalidContent,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidContent => Error::InvalidContent.into(),
            Self::MessageNotExists(_) => {
                MessageModificationError::NotExists.into()
            }
            Self::Forbidden(_) => api::PrivilegeError::Forbidden.into(),
            Self::Expired(_) => MessageModificationError::Expired.into(),
        })
    }
}

impl AsError for command::delete_message::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::MessageNotExists(_) => {
                MessageModificationError::NotExists.into()
            }
            Self::Forbidden(_) => api::PrivilegeError::Forbidden.into(),
            Self::Expired(_) => MessageModificationError::Expired.into(),
        })
    }
}

define_error! {
    enum ConnectionError {
        #[code = "NOT_CONNECTED"]
        #[status = BAD_REQUEST]
        #[message = "Connection is not registered"]
        NotConnected,

        #[code = "NOT_JOINED"]
        #[status = BAD_REQUEST]
        #[message = "`Conversation` is not joined"]
        NotJoined,
    }
}

impl AsError for command::join_conversation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::MarkAsRead(e) => return e.try_as_error(),
            Self::NotConnected(_) => ConnectionError::NotConnected.into(),
            Self::ConversationNotExists(_) => {
                ConversationAccessError::NotExists.into()
            }
            Self::NotParticipant(_) => {
                ConversationAccessError::NotParticipant.into()
            }
        })
    }
}

impl AsError for command::leave_conversation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::NotConnected(_) => ConnectionError::NotConnected.into(),
        })
    }
}

impl AsError for command::notify_typing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::NotConnected(_) => ConnectionError::NotConnected.into(),
            Self::NotJoined(_) => ConnectionError::NotJoined.into(),
        })
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command,
        domain::{booking, conversation, message, user},
        infra::payment,
    };

    use crate::AsError as _;

    #[test]
    fn maps_booking_conflict_to_conflict_status() {
        let err = command::create_booking::ExecutionError::Conflict(
            booking::Id::new(),
        )
        .as_error();

        assert_eq!(err.code, "BOOKING_CONFLICT");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
    }

    #[test]
    fn maps_invalid_range_to_bad_request() {
        let err =
            command::create_booking::ExecutionError::InvalidRange.as_error();

        assert_eq!(err.code, "INVALID_RANGE");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn maps_gateway_failure_to_bad_gateway() {
        let err = command::create_booking::ExecutionError::PaymentGateway(
            payment::Error::Malformed("no `authorization_url`"),
        )
        .as_error();

        assert_eq!(err.status_code, http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn maps_expired_edit_to_gone() {
        let err =
            command::edit_message::ExecutionError::Expired(message::Id::new())
                .as_error();

        assert_eq!(err.code, "MESSAGE_EXPIRED");
        assert_eq!(err.status_code, http::StatusCode::GONE);
    }

    #[test]
    fn maps_invalid_state_to_conflict() {
        let err = command::cancel_booking::ExecutionError::InvalidState(
            booking::Status::Completed,
        )
        .as_error();

        assert_eq!(err.code, "INVALID_STATE");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
    }

    #[test]
    fn maps_non_participant_to_forbidden() {
        let send = command::send_message::ExecutionError::NotParticipant(
            user::Id::new(),
        )
        .as_error();
        let join = command::join_conversation::ExecutionError::NotParticipant(
            user::Id::new(),
        )
        .as_error();
        let missing =
            command::send_message::ExecutionError::ConversationNotExists(
                conversation::Id::new(),
            )
            .as_error();

        for err in [send, join] {
            assert_eq!(err.code, "NOT_PARTICIPANT");
            assert_eq!(err.status_code, http::StatusCode::FORBIDDEN);
        }
        assert_eq!(missing.code, "CONVERSATION_NOT_EXISTS");
        assert_eq!(missing.status_code, http::StatusCode::NOT_FOUND);
    }
}

//! [`Booking`]-related definitions.

use std::future;

use common::{DateTime, Handler as _, Money};
use derive_more::{Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar};
use service::{command, domain, query};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, AsError, Context, Error};

/// A reservation of a property for a range of nights.
#[derive(Clone, Debug, From)]
pub struct Booking {
    /// ID of this [`Booking`].
    id: Id,

    /// Underlying [`domain::Booking`].
    booking: OnceCell<domain::Booking>,
}

impl From<domain::Booking> for Booking {
    fn from(booking: domain::Booking) -> Self {
        Self {
            id: booking.id.into(),
            booking: OnceCell::new_with(Some(booking)),
        }
    }
}

impl Booking {
    /// Creates a new [`Booking`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Booking`] with the provided ID exists,
    /// otherwise accessing this [`Booking`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            booking: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Booking`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Booking`] doesn't exist.
    pub(crate) async fn booking(
        &self,
        ctx: &Context,
    ) -> Result<&domain::Booking, Error> {
        let id = self.id.into();
        self.booking
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::booking::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|b| {
                        future::ready(b.ok_or_else(|| {
                            api::query::BookingError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A reservation of a property for a range of nights.
#[graphql_object(context = Context)]
impl Booking {
    /// Unique identifier of this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `User` renting the `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.renter",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn renter(&self, ctx: &Context) -> Result<api::User, Error> {
        let renter_id = self.booking(ctx).await?.renter_id;
        #[expect(
            unsafe_code,
            reason = "`Booking` loaded from repository guarantees its renter \
                      existence"
        )]
        let renter = unsafe { api::User::new_unchecked(renter_id) };
        Ok(renter)
    }

    /// Booked `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.property",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn property(
        &self,
        ctx: &Context,
    ) -> Result<api::Property, Error> {
        let property_id = self.booking(ctx).await?.property_id;
        #[expect(
            unsafe_code,
            reason = "`Booking` loaded from repository guarantees its \
                      `Property` existence"
        )]
        let property = unsafe { api::Property::new_unchecked(property_id) };
        Ok(property)
    }

    /// `DateTime` of checking in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.checkIn",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn check_in(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.check_in.coerce())
    }

    /// `DateTime` of checking out.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.checkOut",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn check_out(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.check_out.coerce())
    }

    /// Number of booked nights.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.nights",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn nights(&self, ctx: &Context) -> Result<i32, Error> {
        let booking = self.booking(ctx).await?;
        let nights = domain::Booking::nights(booking.check_in, booking.check_out)
            .unwrap_or_default();
        Ok(i32::try_from(nights).unwrap_or(i32::MAX))
    }

    /// Number of guests.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.guests",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn guests(&self, ctx: &Context) -> Result<i32, Error> {
        Ok(u16::from(self.booking(ctx).await?.guests).into())
    }

    /// Total amount to pay for this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.total",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn total(&self, ctx: &Context) -> Result<Money, Error> {
        Ok(self.booking(ctx).await?.total)
    }

    /// Status of this `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn status(&self, ctx: &Context) -> Result<Status, Error> {
        Ok(self.booking(ctx).await?.status.into())
    }

    /// Status of this `Booking` payment.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.paymentStatus",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn payment_status(
        &self,
        ctx: &Context,
    ) -> Result<api::payment::Status, Error> {
        Ok(self.booking(ctx).await?.payment_status.into())
    }

    /// Reference issued by the gateway for this `Booking` payment, if any.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.paymentReference",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn payment_reference(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::payment::Reference>, Error> {
        Ok(self
            .booking(ctx)
            .await?
            .payment_reference
            .clone()
            .map(Into::into))
    }

    /// `Payment` of this `Booking`, if it's paid.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.payment",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn payment(
        &self,
        ctx: &Context,
    ) -> Result<Option<api::Payment>, Error> {
        let payment_id = self.booking(ctx).await?.payment_id;
        #[expect(
            unsafe_code,
            reason = "`Booking` loaded from repository guarantees its \
                      `Payment` existence"
        )]
        let payment =
            payment_id.map(|id| unsafe { api::Payment::new_unchecked(id) });
        Ok(payment)
    }

    /// `DateTime` when this `Booking` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.created_at.coerce())
    }

    /// `DateTime` when this `Booking` was updated last time.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Booking.updatedAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn updated_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.booking(ctx).await?.updated_at.coerce())
    }
}

/// Unique identifier of a `Booking`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::booking::Id)]
#[into(domain::booking::Id)]
#[graphql(name = "BookingId", transparent)]
pub struct Id(Uuid);

/// Status of a `Booking`.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "BookingStatus")]
pub enum Status {
    /// `Booking` awaits its payment.
    Pending,

    /// `Booking` is paid and its dates are reserved.
    Confirmed,

    /// `Booking` was cancelled.
    Cancelled,

    /// Stay of the `Booking` is over.
    Completed,
}

impl From<domain::booking::Status> for Status {
    fn from(status: domain::booking::Status) -> Self {
        use domain::booking::Status as S;
        match status {
            S::Pending => Self::Pending,
            S::Confirmed => Self::Confirmed,
            S::Cancelled => Self::Cancelled,
            S::Completed => Self::Completed,
        }
    }
}

impl From<Status> for domain::booking::Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Pending => Self::Pending,
            Status::Confirmed => Self::Confirmed,
            Status::Cancelled => Self::Cancelled,
            Status::Completed => Self::Completed,
        }
    }
}

/// Result of a `Booking` creation.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context, name = "CreateBookingResult")]
pub struct CreateResult {
    /// Created `Booking`.
    pub booking: Booking,

    /// URL of the hosted payment page to redirect the renter to.
    pub redirect_url: String,
}

impl From<command::create_booking::Output> for CreateResult {
    fn from(output: command::create_booking::Output) -> Self {
        let command::create_booking::Output {
            booking,
            redirect_url,
        } = output;
        Self {
            booking: booking.into(),
            redirect_url,
        }
    }
}

/// Outcome of a `Booking` payment verification.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "PaymentVerificationOutcome")]
pub enum Outcome {
    /// `Booking` has been paid and confirmed.
    Confirmed,

    /// `Booking` was paid before.
    AlreadyPaid,

    /// Gateway reported the payment as not successful.
    Failed,
}

impl From<command::confirm_booking_payment::Outcome> for Outcome {
    fn from(outcome: command::confirm_booking_payment::Outcome) -> Self {
        use command::confirm_booking_payment::Outcome as O;
        match outcome {
            O::Confirmed => Self::Confirmed,
            O::AlreadyPaid => Self::AlreadyPaid,
            O::Failed => Self::Failed,
        }
    }
}

/// Result of a `Booking` payment verification.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context, name = "PaymentVerificationResult")]
pub struct VerificationResult {
    /// Current state of the `Booking`.
    pub booking: Booking,

    /// `Payment` of the `Booking`, if it's paid.
    pub payment: Option<api::Payment>,

    /// Outcome of the verification.
    pub outcome: Outcome,
}

impl From<command::confirm_booking_payment::Output> for VerificationResult {
    fn from(output: command::confirm_booking_payment::Output) -> Self {
        let command::confirm_booking_payment::Output {
            booking,
            payment,
            outcome,
        } = output;
        Self {
            booking: booking.into(),
            payment: payment.map(Into::into),
            outcome: outcome.into(),
        }
    }
}

pub mod list {
    //! Definitions related to the [`Booking`] list.

    use derive_more::{AsRef, From, Into};
    use juniper::{graphql_object, GraphQLScalar};
    use service::{query, read, Query as _};

    use super::{Booking, Id};
    use crate::{api::scalar, AsError, Context, Error};

    /// Cursor for the `Booking` list.
    #[derive(AsRef, Clone, Copy, Debug, From, GraphQLScalar, Into)]
    #[from(Id, read::booking::list::Cursor)]
    #[graphql(
        name = "BookingListCursor",
        with = scalar::Via::<read::booking::list::Cursor>,
    )]
    pub struct Cursor(pub read::booking::list::Cursor);

    /// Edge in the [`Booking`] list.
    #[derive(Clone, Copy, Debug, From, Into)]
    pub struct Edge(read::booking::list::Edge);

    /// Edge in the `Booking` list.
    #[graphql_object(name = "BookingListEdge", context = Context)]
    impl Edge {
        /// Cursor of this `BookingListEdge`.
        #[must_use]
        pub fn cursor(&self) -> Cursor {
            self.0.cursor.into()
        }

        /// Node of this `BookingListEdge`.
        #[must_use]
        pub fn node(&self) -> Booking {
            #[expect(
                unsafe_code,
                reason = "`Edge` loaded from repository guarantees `Booking` \
                          existence"
            )]
            unsafe {
                Booking::new_unchecked(self.0.node)
            }
        }
    }

    /// Connection of the [`Booking`] list.
    #[derive(Clone, Debug)]
    pub struct Connection {
        /// Underlying [`read::booking::list::Connection`].
        page: read::booking::list::Connection,

        /// [`read::booking::list::Filter`] the page was selected with.
        filter: read::booking::list::Filter,
    }

    impl Connection {
        /// Creates a new [`Connection`] out of the provided page selected with
        /// the provided filter.
        #[must_use]
        pub fn new(
            page: read::booking::list::Connection,
            filter: read::booking::list::Filter,
        ) -> Self {
            Self { page, filter }
        }
    }

    /// Connection of the `Booking` list.
    #[graphql_object(name = "BookingListConnection", context = Context)]
    impl Connection {
        /// Edges of this `BookingListConnection`.
        #[must_use]
        pub fn edges(&self) -> Vec<Edge> {
            self.page.edges.iter().copied().map(Into::into).collect()
        }

        /// Information about the page.
        #[must_use]
        pub fn page_info(&self) -> PageInfo {
            PageInfo {
                info: self.page.page_info(),
                filter: self.filter,
            }
        }
    }

    /// Information about a [`Connection`] page.
    #[derive(Clone, Copy, Debug)]
    pub struct PageInfo {
        /// Underlying [`read::booking::list::PageInfo`].
        info: read::booking::list::PageInfo,

        /// [`read::booking::list::Filter`] to count the total with.
        filter: read::booking::list::Filter,
    }

    /// Information about a `BookingListConnection` page.
    #[graphql_object(name = "BookingListPageInfo", context = Context)]
    impl PageInfo {
        /// Indicator whether there is a next page.
        #[must_use]
        pub fn has_next_page(&self) -> bool {
            self.info.has_next_page
        }

        /// Indicator whether there is a previous page.
        #[must_use]
        pub fn has_previous_page(&self) -> bool {
            self.info.has_previous_page
        }

        /// Start cursor of the page.
        #[must_use]
        pub fn start_cursor(&self) -> Option<Cursor> {
            self.info.start_cursor.map(Into::into)
        }

        /// End cursor of the page.
        #[must_use]
        pub fn end_cursor(&self) -> Option<Cursor> {
            self.info.end_cursor.map(Into::into)
        }

        /// Total count of the listed `Booking`s.
        pub async fn total_count(&self, ctx: &Context) -> Result<i32, Error> {
            ctx.service()
                .execute(query::bookings::TotalCount::by(self.filter))
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(Into::into)
        }
    }
}

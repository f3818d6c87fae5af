//! [`Payment`]-related definitions.

use std::future;

use common::{DateTime, Handler as _, Money};
use derive_more::{AsRef, Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLEnum, GraphQLScalar};
use service::{domain, query};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, api::scalar, AsError, Context, Error};

/// A verified payment of a booking.
#[derive(Clone, Debug, From)]
pub struct Payment {
    /// ID of this [`Payment`].
    id: Id,

    /// Underlying [`domain::Payment`].
    payment: OnceCell<domain::Payment>,
}

impl From<domain::Payment> for Payment {
    fn from(payment: domain::Payment) -> Self {
        Self {
            id: payment.id.into(),
            payment: OnceCell::new_with(Some(payment)),
        }
    }
}

impl Payment {
    /// Creates a new [`Payment`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Payment`] with the provided ID exists,
    /// otherwise accessing this [`Payment`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            payment: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Payment`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Payment`] doesn't exist.
    async fn payment(&self, ctx: &Context) -> Result<&domain::Payment, Error> {
        let id = self.id.into();
        self.payment
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::payment::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|p| {
                        future::ready(p.ok_or_else(|| {
                            api::query::PaymentError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A verified payment of a booking.
#[graphql_object(context = Context)]
impl Payment {
    /// Unique identifier of this `Payment`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `User` who paid.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.user",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn user(&self, ctx: &Context) -> Result<api::User, Error> {
        let user_id = self.payment(ctx).await?.user_id;
        #[expect(
            unsafe_code,
            reason = "`Payment` loaded from repository guarantees its payer \
                      existence"
        )]
        let user = unsafe { api::User::new_unchecked(user_id) };
        Ok(user)
    }

    /// Paid `Booking`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.booking",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn booking(&self, ctx: &Context) -> Result<api::Booking, Error> {
        let booking_id = self.payment(ctx).await?.booking_id;
        #[expect(
            unsafe_code,
            reason = "`Payment` loaded from repository guarantees its \
                      `Booking` existence"
        )]
        let booking = unsafe { api::Booking::new_unchecked(booking_id) };
        Ok(booking)
    }

    /// Paid amount, as reported by the gateway.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.amount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn amount(&self, ctx: &Context) -> Result<Money, Error> {
        Ok(self.payment(ctx).await?.amount)
    }

    /// Reference of this `Payment` in the gateway.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.reference",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn reference(&self, ctx: &Context) -> Result<Reference, Error> {
        Ok(self.payment(ctx).await?.reference.clone().into())
    }

    /// Status of this `Payment`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.status",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn status(&self, ctx: &Context) -> Result<Status, Error> {
        Ok(self.payment(ctx).await?.status.into())
    }

    /// Name of the gateway processed this `Payment`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.gateway",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn gateway(&self, ctx: &Context) -> Result<String, Error> {
        Ok(self.payment(ctx).await?.gateway.to_string())
    }

    /// Channel this `Payment` was made through, if known.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.channel",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn channel(
        &self,
        ctx: &Context,
    ) -> Result<Option<String>, Error> {
        Ok(self.payment(ctx).await?.channel.as_ref().map(ToString::to_string))
    }

    /// `DateTime` when this `Payment` was paid, if known.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.paidAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn paid_at(
        &self,
        ctx: &Context,
    ) -> Result<Option<DateTime>, Error> {
        Ok(self.payment(ctx).await?.paid_at.map(|at| at.coerce()))
    }

    /// `DateTime` when this `Payment` was recorded.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Payment.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.payment(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `Payment`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::payment::Id)]
#[into(domain::payment::Id)]
#[graphql(name = "PaymentId", transparent)]
pub struct Id(Uuid);

/// Reference of a `Payment` issued by the gateway.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PaymentReference",
    with = scalar::Via::<domain::payment::Reference>,
)]
pub struct Reference(domain::payment::Reference);

/// Status of a payment.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "PaymentStatus")]
pub enum Status {
    /// Payment is not verified yet.
    Pending,

    /// Payment is verified as successful.
    Paid,

    /// Payment verification failed.
    Failed,
}

impl From<domain::payment::Status> for Status {
    fn from(status: domain::payment::Status) -> Self {
        use domain::payment::Status as S;
        match status {
            S::Pending => Self::Pending,
            S::Paid => Self::Paid,
            S::Failed => Self::Failed,
        }
    }
}

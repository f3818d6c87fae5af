//! REST endpoints serving the payment gateway redirects.

use axum::{
    extract::{rejection::QueryRejection, Query},
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::DateTime;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, confirm_booking_payment::Outcome, Command as _},
    domain::{self, booking, payment, property, user},
};
use tracing as log;

use crate::{define_error, AsError, Error, Service};

/// Uniform REST response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// HTTP status of this [`Envelope`].
    #[serde(skip)]
    pub status_code: http::StatusCode,

    /// Indicator whether the request succeeded.
    pub status: bool,

    /// Human-readable description of the result.
    pub message: String,

    /// Payload of a successful result.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Creates a successful [`Envelope`] with the provided payload.
    #[must_use]
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: http::StatusCode::OK,
            status: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Creates a failed [`Envelope`] out of the provided [`Error`].
    #[must_use]
    pub fn failed(err: &Error) -> Self {
        Self {
            status_code: err.status_code,
            status: false,
            message: err.public_message().to_owned(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// Query parameters of the payment verification redirect.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentParams {
    /// Reference of the payment in the gateway.
    pub reference: Option<String>,
}

/// Verifies the payment the gateway redirected back with, and confirms its
/// [`domain::Booking`].
#[tracing::instrument(
    skip_all,
    fields(reference = tracing::field::Empty),
)]
pub async fn verify_payment(
    Extension(service): Extension<Service>,
    params: Result<Query<VerifyPaymentParams>, QueryRejection>,
) -> Envelope<BookingView> {
    define_error! {
        enum Error {
            #[code = "MISSING_REFERENCE"]
            #[status = BAD_REQUEST]
            #[message = "Payment reference is required"]
            MissingReference,

            #[code = "PAYMENT_FAILED"]
            #[status = PAYMENT_REQUIRED]
            #[message = "Payment verification failed"]
            PaymentFailed,
        }
    }

    let reference = params
        .ok()
        .and_then(|Query(p)| p.reference)
        .and_then(|r| r.parse::<payment::Reference>().ok());
    let Some(reference) = reference else {
        return Envelope::failed(&Error::MissingReference.into());
    };
    _ = tracing::Span::current()
        .record("reference", tracing::field::display(&reference));

    match service
        .execute(command::ConfirmBookingPayment { reference })
        .await
    {
        Ok(output) => match output.outcome {
            Outcome::Confirmed => Envelope::ok(
                "Payment verified successfully",
                BookingView::from(&output.booking),
            ),
            Outcome::AlreadyPaid => Envelope::ok(
                "Payment has been verified already",
                BookingView::from(&output.booking),
            ),
            Outcome::Failed => {
                log::warn!("payment was not successful");
                Envelope::failed(&Error::PaymentFailed.into())
            }
        },
        Err(e) => {
            let err = e.as_error();
            if err.status_code.is_server_error() {
                log::error!("failed to verify payment: {e}");
            }
            Envelope::failed(&err)
        }
    }
}

/// Client-facing representation of a [`domain::Booking`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    /// ID of the [`domain::Booking`].
    pub id: booking::Id,

    /// ID of the renting [`domain::User`].
    pub renter_id: user::Id,

    /// ID of the booked [`domain::Property`].
    pub property_id: property::Id,

    /// Start of the stay.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub check_in: DateTime,

    /// End of the stay.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub check_out: DateTime,

    /// Number of guests.
    pub number_of_guests: u16,

    /// Total price of the stay.
    pub total_amount: String,

    /// Status of the [`domain::Booking`].
    pub status: String,

    /// Status of the [`domain::Booking`] payment.
    pub payment_status: String,

    /// Reference of the [`domain::Booking`] payment in the gateway.
    pub payment_reference: Option<String>,
}

impl From<&domain::Booking> for BookingView {
    fn from(booking: &domain::Booking) -> Self {
        Self {
            id: booking.id,
            renter_id: booking.renter_id,
            property_id: booking.property_id,
            check_in: booking.check_in.coerce(),
            check_out: booking.check_out.coerce(),
            number_of_guests: booking.guests.into(),
            total_amount: booking.total.to_string(),
            status: booking.status.to_string(),
            payment_status: booking.payment_status.to_string(),
            payment_reference: booking
                .payment_reference
                .as_ref()
                .map(ToString::to_string),
        }
    }
}

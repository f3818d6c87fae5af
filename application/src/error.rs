//! [`Error`]-related definitions.

use std::{convert::Infallible, fmt};

use axum_extra::typed_header::TypedHeaderRejection;
use derive_more::Error as StdError;
use itertools::Itertools as _;
use juniper::IntoFieldError;
use service::infra::{database, kv, notifier, payment};
use tracerr::{Trace, Traced};

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        #[repr(u16)]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            status_code: ::http::StatusCode::$status_code,
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

/// GraphQL API [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// [`http::StatusCode`] of this [`Error`].
    pub status_code: http::StatusCode,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an internal server error.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_SERVER_ERROR",
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Returns the message of this [`Error`] safe to be shown to clients.
    ///
    /// Server errors carry internal details, so they're replaced with
    /// [`Error::INTERNAL_MESSAGE`].
    #[must_use]
    pub fn public_message(&self) -> &str {
        if self.status_code.is_server_error() {
            Self::INTERNAL_MESSAGE
        } else {
            &self.message
        }
    }

    /// Message shown to clients instead of a server error's own one.
    pub const INTERNAL_MESSAGE: &'static str = "Internal server error";
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            status_code: _,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("{trace}"))),
        )
    }
}

impl<S> IntoFieldError<S> for Error
where
    S: From<String>,
{
    fn into_field_error(self) -> juniper::FieldError<S> {
        let mut ext = juniper::Object::with_capacity(1);
        drop(
            ext.add_field("code", juniper::Value::scalar(self.code.to_owned())),
        );
        drop(
            ext.add_field(
                "backtrace",
                juniper::Value::list(
                    self.backtrace
                        .iter()
                        .flat_map(|trace| trace.iter())
                        .map(|frame| juniper::Value::scalar(frame.to_string()))
                        .collect(),
                ),
            ),
        );
        juniper::FieldError::new(
            self.public_message(),
            juniper::Value::object(ext),
        )
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for TypedHeaderRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error {
            code: "BAD_REQUEST",
            status_code: http::StatusCode::BAD_REQUEST,
            message: self.to_string(),
            backtrace: None,
        })
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for payment::Error {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "UPSTREAM_FAILURE"]
                #[status = BAD_GATEWAY]
                #[message = "Payment gateway failed to process the request"]
                UpstreamFailure,
            }
        }

        Some(Error::UpstreamFailure.into())
    }
}

impl AsError for kv::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for notifier::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for Infallible {
    fn try_as_error(&self) -> Option<Error> {
        match *self {}
    }
}

#[cfg(test)]
mod spec {
    use juniper::{DefaultScalarValue, IntoFieldError as _};
    use service::infra::payment;

    use super::{AsError as _, Error};

    #[test]
    fn renders_code_in_extensions() {
        let err: juniper::FieldError<DefaultScalarValue> =
            Error::internal(&"boom").into_field_error();

        assert_eq!(err.message(), "Internal server error");
        assert_eq!(
            err.extensions()
                .as_object_value()
                .and_then(|o| o.get_field_value("code"))
                .and_then(|v| v.as_string_value()),
            Some("INTERNAL_SERVER_ERROR"),
        );
    }

    #[test]
    fn maps_gateway_failures_to_bad_gateway() {
        let err = payment::Error::Rejected("declined".into()).as_error();

        assert_eq!(err.code, "UPSTREAM_FAILURE");
        assert_eq!(err.status_code, http::StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn hides_server_error_details() {
        let internal = Error::internal(&"db error: users_email_key violated");
        let gateway = payment::Error::Rejected("declined".into()).as_error();
        let client = Error {
            code: "BAD_REQUEST",
            status_code: http::StatusCode::BAD_REQUEST,
            message: "no `reference`".into(),
            backtrace: None,
        };

        assert_eq!(internal.public_message(), "Internal server error");
        assert_eq!(gateway.public_message(), "Internal server error");
        assert_eq!(client.public_message(), "no `reference`");
    }
}

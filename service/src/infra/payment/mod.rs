//! [`PaymentGateway`]-related implementations.

pub mod paystack;
#[cfg(test)]
pub mod scripted;

use common::{money::Currency, Money};
use derive_more::{Display, Error as StdError, From};

use crate::domain::{payment, user};

#[cfg(test)]
pub use self::scripted::Scripted;
pub use self::paystack::Paystack;

/// Hosted payment page provider.
pub use common::Handler as PaymentGateway;

/// Operation to initialize a new payment transaction.
#[derive(Clone, Debug)]
pub struct Initialize {
    /// [`user::Email`] of the paying customer.
    pub email: user::Email,

    /// Amount to be paid.
    pub amount: Money,
}

/// Operation to verify a payment transaction by its [`payment::Reference`].
#[derive(Clone, Debug)]
pub struct Verify(pub payment::Reference);

/// Hosted payment session created by [`Initialize`].
#[derive(Clone, Debug)]
pub struct Session {
    /// URL to redirect the customer to for paying.
    pub redirect_url: String,

    /// [`payment::Reference`] of the initialized transaction.
    pub reference: payment::Reference,
}

/// Payment transaction reported by a [`Verify`].
#[derive(Clone, Debug)]
pub struct Transaction {
    /// Status of the transaction, as reported by the gateway.
    ///
    /// Only [`Transaction::SUCCESS`] means a settled payment.
    pub status: String,

    /// [`payment::Reference`] of the transaction.
    pub reference: payment::Reference,

    /// Paid amount in minor units of the [`Transaction::currency`].
    pub amount_minor: i64,

    /// [`Currency`] of the transaction, if reported.
    pub currency: Option<Currency>,

    /// [`payment::Channel`] the transaction was made through, if reported.
    pub channel: Option<payment::Channel>,

    /// [`payment::PaidDateTime`] of the transaction, if reported.
    pub paid_at: Option<payment::PaidDateTime>,
}

impl Transaction {
    /// Status of a successful [`Transaction`].
    pub const SUCCESS: &'static str = "success";

    /// Indicates whether this [`Transaction`] is successfully paid.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }

    /// Returns the paid amount in major units, falling back to the provided
    /// [`Currency`] if the gateway didn't report one.
    #[must_use]
    pub fn amount(&self, fallback: Currency) -> Money {
        Money::from_minor_units(
            self.amount_minor,
            self.currency.unwrap_or(fallback),
        )
    }
}

/// [`PaymentGateway`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// HTTP request to the gateway failed or timed out.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Gateway rejected the request.
    #[display("Gateway rejected the request: {_0}")]
    #[from(ignore)]
    Rejected(#[error(not(source))] String),

    /// Gateway responded with unexpected data.
    #[display("Gateway responded with malformed data: {_0}")]
    #[from(ignore)]
    Malformed(#[error(not(source))] &'static str),

    /// Amount cannot be represented in minor units.
    #[display("Amount `{_0}` is not representable")]
    #[from(ignore)]
    InvalidAmount(#[error(not(source))] Money),
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use rust_decimal::Decimal;

    use crate::domain::payment;

    use super::Transaction;

    #[test]
    fn converts_amount_to_major_units() {
        let tx = Transaction {
            status: Transaction::SUCCESS.into(),
            reference: payment::Reference::new("T1").unwrap(),
            amount_minor: 30_000,
            currency: None,
            channel: None,
            paid_at: None,
        };

        assert!(tx.is_success());
        assert_eq!(
            tx.amount(Currency::Ngn),
            Money {
                amount: Decimal::from(300),
                currency: Currency::Ngn,
            },
        );
    }

    #[test]
    fn treats_other_statuses_as_failed() {
        for status in ["failed", "abandoned", "SUCCESS", ""] {
            let tx = Transaction {
                status: status.into(),
                reference: payment::Reference::new("T1").unwrap(),
                amount_minor: 0,
                currency: Some(Currency::Usd),
                channel: None,
                paid_at: None,
            };
            assert!(!tx.is_success(), "`{status}` must not succeed");
        }
    }
}

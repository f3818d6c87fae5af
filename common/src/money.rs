//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal, RoundingStrategy};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Number of minor units in a single major unit of every supported
    /// [`Currency`].
    pub const MINOR_UNITS: i64 = 100;

    /// Creates a new [`Money`] out of the provided amount of minor units
    /// (cents, kobo, etc).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::from(minor) / Decimal::from(Self::MINOR_UNITS),
            currency,
        }
    }

    /// Returns the amount of this [`Money`] in minor units, rounding half away
    /// from zero.
    ///
    /// [`None`] is returned if the amount doesn't fit into [`i64`].
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.amount.checked_mul(Decimal::from(Self::MINOR_UNITS))?)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Multiplies this [`Money`] by the provided `times`.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_mul(&self, times: u32) -> Option<Self> {
        Some(Self {
            amount: self.amount.checked_mul(Decimal::from(times))?,
            currency: self.currency,
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        match amount.is_integer().then(|| amount.to_i128()).flatten() {
            Some(int) => write!(f, "{int}{currency}"),
            None => write!(f, "{}{currency}", amount.normalize()),
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }
        if !s.is_char_boundary(s.len() - 3) {
            return Err("invalid currency");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        if amount.is_sign_negative() {
            return Err("negative amount");
        }
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,

        #[doc = "Euro."]
        Eur = 2,

        #[doc = "Nigerian Naira."]
        Ngn = 3,
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Money in `{major}.{minor}{currency}` format, where:
    /// - `major` is an integer;
    /// - `minor` is an optional integer;
    /// - `currency` is a three-letter currency code.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Money = super::Money;

    impl Money {
        fn to_output<S: ScalarValue>(m: &Money) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Money` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Money` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ngn(s: &str) -> Money {
        Money {
            amount: decimal(s),
            currency: Currency::Ngn,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("123.45NGN").unwrap(), ngn("123.45"));
        assert_eq!(
            Money::from_str("10EUR").unwrap(),
            Money {
                amount: decimal("10"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Ng").is_err());
        assert!(Money::from_str("123.45naira").is_err());
        assert!(Money::from_str("-5USD").is_err());
        assert!(Money::from_str("1₦NG").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(ngn("123.45").to_string(), "123.45NGN");
        assert_eq!(ngn("123.00").to_string(), "123NGN");
        assert_eq!(ngn("2.50").to_string(), "2.5NGN");
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(ngn("300").to_minor_units(), Some(30_000));
        assert_eq!(ngn("12.34").to_minor_units(), Some(1234));
        assert_eq!(ngn("0.005").to_minor_units(), Some(1));
        assert_eq!(ngn("0.004").to_minor_units(), Some(0));
    }

    #[test]
    fn converts_from_minor_units() {
        assert_eq!(Money::from_minor_units(30_000, Currency::Ngn), ngn("300"));
        assert_eq!(Money::from_minor_units(1, Currency::Ngn), ngn("0.01"));
    }

    #[test]
    fn multiplies() {
        assert_eq!(ngn("100").checked_mul(3), Some(ngn("300")));
        assert_eq!(ngn("99.99").checked_mul(0), Some(ngn("0")));
    }
}

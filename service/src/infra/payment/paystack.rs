//! [Paystack] [`PaymentGateway`] implementation.
//!
//! [Paystack]: https://paystack.com/docs/api

use std::time::Duration;

use common::money::Currency;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use smart_default::SmartDefault;
use tracerr::Traced;

use crate::domain::payment;

use super::{Error, Initialize, PaymentGateway, Session, Transaction, Verify};

/// Configuration of a [`Paystack`] client.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Base URL of the Paystack API.
    #[default("https://api.paystack.co".into())]
    pub base_url: String,

    /// Secret key authorizing requests.
    #[default(SecretString::from(String::new()))]
    pub secret_key: SecretString,

    /// URL the customer is redirected to once the payment is made.
    pub callback_url: String,

    /// Timeout of a single request.
    #[default(Duration::from_secs(10))]
    pub timeout: Duration,
}

/// [Paystack] [`PaymentGateway`] client.
///
/// [Paystack]: https://paystack.com
#[derive(Clone, Debug)]
pub struct Paystack {
    /// HTTP client performing requests.
    client: reqwest::Client,

    /// [`Config`] of this [`Paystack`] client.
    config: Config,
}

impl Paystack {
    /// Creates a new [`Paystack`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to build an HTTP client.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        Ok(Self { client, config })
    }

    /// Returns the URL of the provided API `path`.
    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Parses the `data` of the provided Paystack API [`reqwest::Response`].
    async fn parse<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, Traced<Error>> {
        let status = resp.status();
        let envelope = resp
            .json::<Envelope<T>>()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        if !status.is_success() || !envelope.status {
            let reason = if envelope.message.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_owned()
            } else {
                envelope.message
            };
            return Err(tracerr::new!(Error::Rejected(reason)));
        }
        envelope
            .data
            .ok_or(Error::Malformed("missing `data`"))
            .map_err(tracerr::wrap!())
    }
}

impl PaymentGateway<Initialize> for Paystack {
    type Ok = Session;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Initialize { email, amount }: Initialize,
    ) -> Result<Self::Ok, Self::Err> {
        let minor = amount
            .to_minor_units()
            .ok_or(Error::InvalidAmount(amount))
            .map_err(tracerr::wrap!())?;

        let resp = self
            .client
            .post(self.url("transaction/initialize"))
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(&json!({
                "email": email.to_string(),
                "amount": minor,
                "currency": amount.currency.to_string(),
                "callback_url": self.config.callback_url,
            }))
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        let data = Self::parse::<InitializeData>(resp)
            .await
            .map_err(tracerr::wrap!())?;

        Ok(Session {
            redirect_url: data.authorization_url,
            reference: payment::Reference::new(data.reference)
                .ok_or(Error::Malformed("invalid `reference`"))
                .map_err(tracerr::wrap!())?,
        })
    }
}

impl PaymentGateway<Verify> for Paystack {
    type Ok = Transaction;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Verify(reference): Verify,
    ) -> Result<Self::Ok, Self::Err> {
        let resp = self
            .client
            .get(self.url(&format!("transaction/verify/{reference}")))
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        let data = Self::parse::<VerifyData>(resp)
            .await
            .map_err(tracerr::wrap!())?;

        Ok(Transaction {
            status: data.status,
            reference: payment::Reference::new(data.reference)
                .unwrap_or(reference),
            amount_minor: data.amount,
            currency: data.currency.and_then(|c| c.parse::<Currency>().ok()),
            channel: data.channel.and_then(payment::Channel::new),
            paid_at: data
                .paid_at
                .and_then(|at| payment::PaidDateTime::from_rfc3339(&at).ok()),
        })
    }
}

/// Envelope of every Paystack API response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    /// Indicator whether the request succeeded.
    #[serde(default)]
    status: bool,

    /// Human-readable outcome of the request.
    #[serde(default)]
    message: String,

    /// Payload of the response.
    data: Option<T>,
}

/// `data` of a `transaction/initialize` response.
#[derive(Debug, Deserialize)]
struct InitializeData {
    /// URL of the hosted payment page.
    authorization_url: String,

    /// Reference of the initialized transaction.
    reference: String,
}

/// `data` of a `transaction/verify` response.
#[derive(Debug, Deserialize)]
struct VerifyData {
    /// Status of the transaction.
    status: String,

    /// Reference of the transaction.
    reference: String,

    /// Amount in minor units.
    amount: i64,

    /// ISO 4217 code of the currency.
    currency: Option<String>,

    /// Channel the transaction was made through.
    channel: Option<String>,

    /// RFC 3339 timestamp of the payment.
    paid_at: Option<String>,
}

#[cfg(test)]
mod spec {
    use super::{Envelope, InitializeData, Paystack, VerifyData};

    #[test]
    fn parses_verification() {
        let envelope = serde_json::from_str::<Envelope<VerifyData>>(
            r#"{
                "status": true,
                "message": "Verification successful",
                "data": {
                    "id": 4099260516,
                    "status": "success",
                    "reference": "re4lyvq3s3",
                    "amount": 30000,
                    "paid_at": "2024-08-22T09:15:02.000Z",
                    "created_at": "2024-08-22T09:14:24.000Z",
                    "channel": "card",
                    "currency": "NGN",
                    "customer": {"email": "demo@test.com"}
                }
            }"#,
        )
        .unwrap();

        assert!(envelope.status);
        let data = envelope.data.unwrap();
        assert_eq!(data.status, "success");
        assert_eq!(data.amount, 30_000);
        assert_eq!(data.currency.as_deref(), Some("NGN"));
    }

    #[test]
    fn parses_rejection_without_data() {
        let envelope = serde_json::from_str::<Envelope<InitializeData>>(
            r#"{"status": false, "message": "Invalid key"}"#,
        )
        .unwrap();

        assert!(!envelope.status);
        assert_eq!(envelope.message, "Invalid key");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn builds_urls() {
        let paystack = Paystack::new(super::Config {
            base_url: "https://api.paystack.co/".into(),
            ..super::Config::default()
        })
        .unwrap();

        assert_eq!(
            paystack.url("transaction/initialize"),
            "https://api.paystack.co/transaction/initialize",
        );
    }
}

//! [`Config`]-related definitions.

use std::time;

use common::money::Currency;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use derive_more::Debug;
use secrecy::SecretString;
use serde::Deserialize;
use service::infra::payment::paystack;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("secret".to_owned())]
    pub jwt_secret: String,

    /// One-time codes configuration.
    pub otp: Otp,

    /// Payment gateway configuration.
    pub payment: Payment,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            otp,
            payment,
            tasks: Tasks {
                complete_expired_bookings,
            },
        } = value;
        Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            one_time_code_ttl: otp.ttl,
            payment_currency: payment.currency,
            complete_expired_bookings:
                service::task::complete_expired_bookings::Config {
                    interval: complete_expired_bookings.interval,
                },
        }
    }
}

/// One-time codes configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Otp {
    /// Period an issued code stays redeemable for.
    #[default(time::Duration::from_secs(10 * 60))]
    #[serde(with = "humantime_serde")]
    pub ttl: time::Duration,
}

/// [Paystack] payment gateway configuration.
///
/// [Paystack]: https://paystack.com
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Payment {
    /// Base URL of the gateway API.
    #[default("https://api.paystack.co".to_owned())]
    pub base_url: String,

    /// Secret key authorizing requests to the gateway.
    #[debug(skip)]
    pub secret_key: String,

    /// URL the customer is redirected to once the payment is made.
    #[default("http://localhost:8080/bookings/verify-payment".to_owned())]
    pub callback_url: String,

    /// Timeout of a single gateway request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,

    /// Currency the payments are charged in.
    #[default(Currency::Ngn)]
    pub currency: Currency,
}

impl From<Payment> for paystack::Config {
    fn from(value: Payment) -> Self {
        let Payment {
            base_url,
            secret_key,
            callback_url,
            timeout,
            currency: _,
        } = value;
        Self {
            base_url,
            secret_key: SecretString::from(secret_key),
            callback_url,
            timeout,
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `CompleteExpiredBookings` task configuration.
    pub complete_expired_bookings: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time;

    use common::money::Currency;

    use super::Config;

    #[test]
    fn falls_back_to_defaults() {
        let conf = Config::new("non-existent.toml").unwrap();

        assert_eq!(conf.server.port, 8080);
        assert_eq!(conf.service.otp.ttl, time::Duration::from_secs(600));
        assert_eq!(conf.service.payment.currency, Currency::Ngn);
        assert_eq!(
            conf.service.tasks.complete_expired_bookings.interval,
            time::Duration::from_secs(24 * 60 * 60),
        );
        assert_eq!(conf.postgres.dbname, "postgres");
    }
}

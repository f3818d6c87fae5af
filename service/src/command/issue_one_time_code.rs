//! [`Command`] for issuing a one-time code verifying a [`User`]'s
//! [`user::Email`].

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use uuid::Uuid;

use crate::{
    domain::{user, User},
    infra::{
        database, kv,
        notifier::{self, Notification},
        Database, KeyValue,
    },
    Service,
};

use super::Command;

/// [`Command`] for issuing a one-time code verifying a [`User`]'s
/// [`user::Email`].
#[derive(Clone, Debug)]
pub struct IssueOneTimeCode {
    /// [`user::Email`] to deliver the code to.
    pub email: user::Email,
}

impl IssueOneTimeCode {
    /// Number of digits in a one-time code.
    const DIGITS: u32 = 6;

    /// Returns the [`KeyValue`] key the one-time code of the provided
    /// [`user::Email`] is stored under.
    #[must_use]
    pub fn key(email: &user::Email) -> String {
        format!("otp:{email}")
    }

    /// Generates a new random one-time code.
    fn generate() -> String {
        let code = Uuid::new_v4().as_u128() % 10_u128.pow(Self::DIGITS);
        format!("{code:0width$}", width = Self::DIGITS as usize)
    }
}

impl<Db, Pg, Kv> Command<IssueOneTimeCode> for Service<Db, Pg, Kv>
where
    Db: for<'e> Database<
        Select<By<Option<User>, &'e user::Email>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
    Kv: KeyValue<Insert<kv::Entry>, Ok = (), Err = Traced<kv::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: IssueOneTimeCode,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let IssueOneTimeCode { email } = cmd;

        self.database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(email.clone()))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let code = IssueOneTimeCode::generate();
        self.key_value()
            .execute(Insert(kv::Entry {
                key: IssueOneTimeCode::key(&email),
                value: code.clone(),
                ttl: self.config().one_time_code_ttl,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.notifier()
            .notify(Notification::OneTimeCode { email, code })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`IssueOneTimeCode`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`KeyValue`] store error.
    #[display("`KeyValue` operation failed: {_0}")]
    KeyValue(kv::Error),

    /// [`notifier::Notifier`] failed to deliver the code.
    #[display("Failed to deliver the one-time code: {_0}")]
    Notifier(notifier::Error),

    /// [`User`] with the provided [`user::Email`] does not exist.
    #[display("`User(email: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Email),
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::Command as _,
        domain::user,
        infra::{notifier::Notification, KeyValue as _},
        testing,
    };

    use super::{ExecutionError, IssueOneTimeCode};

    #[test]
    fn generates_six_digits() {
        for _ in 0..100 {
            let code = IssueOneTimeCode::generate();
            assert_eq!(code.len(), 6, "`{code}` must have 6 digits");
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn stores_and_delivers_code() {
        let (svc, env) = testing::service();
        let user = testing::user(&env.database, user::Role::User).await;

        svc.execute(IssueOneTimeCode {
            email: user.email.clone(),
        })
        .await
        .unwrap();

        let key = IssueOneTimeCode::key(&user.email);
        let stored = svc
            .key_value()
            .execute(Select(By::new(key.as_str())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.notifier.delivered(), vec![Notification::OneTimeCode {
            email: user.email,
            code: stored,
        }]);
    }

    #[tokio::test]
    async fn requires_existing_user() {
        let (svc, env) = testing::service();

        let err = svc
            .execute(IssueOneTimeCode {
                email: user::Email::new("ghost@example.com").unwrap(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
        assert!(env.notifier.delivered().is_empty());
    }
}

//! [`Command`] for verifying a [`User`]'s [`user::Email`] with a one-time
//! code.

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::Session;
use crate::{
    domain::{user, User},
    infra::{database, kv, Database, KeyValue},
    Service,
};

use super::{create_user_session, Command, IssueOneTimeCode};

/// [`Command`] for verifying a [`User`]'s [`user::Email`] with a one-time
/// code issued by [`IssueOneTimeCode`].
///
/// Creates a new [`Session`] on success.
#[derive(Clone, Debug)]
pub struct VerifyUser {
    /// Verified [`user::Email`].
    pub email: user::Email,

    /// One-time code delivered to the [`user::Email`].
    pub code: String,
}

impl<Db, Pg, Kv> Command<VerifyUser> for Service<Db, Pg, Kv>
where
    Db: for<'e> Database<
            Select<By<Option<User>, &'e user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<User, user::Id>>, Err = Traced<database::Error>>
        + Database<Update<User>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Kv: for<'k> KeyValue<
            Select<By<Option<String>, &'k str>>,
            Ok = Option<String>,
            Err = Traced<kv::Error>,
        > + for<'k> KeyValue<Delete<&'k str>, Err = Traced<kv::Error>>,
{
    type Ok = create_user_session::Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: VerifyUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let VerifyUser { email, code } = cmd;

        let key = IssueOneTimeCode::key(&email);
        let stored = self
            .key_value()
            .execute(Select(By::new(key.as_str())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if stored.as_deref() != Some(code.trim()) {
            return Err(tracerr::new!(E::WrongCode));
        }

        let user = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(email.clone()))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Lock(By::<User, _>::new(user.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        let mut user = tx
            .execute(Select(By::<Option<User>, _>::new(user.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(email.clone()))
            .map_err(tracerr::wrap!())?;
        if user.verified_at.is_none() {
            user.verified_at = Some(user::VerificationDateTime::now());
            tx.execute(Update(user.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.key_value()
            .execute(Delete(key.as_str()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        create_user_session::Output::issue(self.config(), user)
            .map_err(tracerr::from_and_wrap!(=> E))
    }
}

/// Error of [`VerifyUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`KeyValue`] store error.
    #[display("`KeyValue` operation failed: {_0}")]
    KeyValue(kv::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// [`User`] with the provided [`user::Email`] does not exist.
    #[display("`User(email: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Email),

    /// One-time code is wrong or expired.
    #[display("One-time code is wrong or expired")]
    WrongCode,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Select};

    use crate::{
        command::{Command as _, IssueOneTimeCode},
        domain::{user, User},
        infra::{notifier::Notification, Database as _},
        testing,
    };

    use super::{ExecutionError, VerifyUser};

    async fn issue(
        svc: &testing::TestService,
        env: &testing::Adapters,
        email: &user::Email,
    ) -> String {
        svc.execute(IssueOneTimeCode {
            email: email.clone(),
        })
        .await
        .unwrap();
        match env.notifier.delivered().pop() {
            Some(Notification::OneTimeCode { code, .. }) => code,
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn verifies_once() {
        let (svc, env) = testing::service();
        let user = testing::user(&env.database, user::Role::User).await;
        let code = issue(&svc, &env, &user.email).await;

        let out = svc
            .execute(VerifyUser {
                email: user.email.clone(),
                code: code.clone(),
            })
            .await
            .unwrap();
        assert_eq!(out.user.id, user.id);
        assert!(out.user.is_verified());

        let stored = env
            .database
            .execute(Select(By::<Option<User>, _>::new(user.id)))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_verified());

        let err = svc
            .execute(VerifyUser {
                email: user.email,
                code,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::WrongCode));
    }

    #[tokio::test]
    async fn rejects_wrong_code() {
        let (svc, env) = testing::service();
        let user = testing::user(&env.database, user::Role::User).await;
        let code = issue(&svc, &env, &user.email).await;
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = svc
            .execute(VerifyUser {
                email: user.email,
                code: wrong.into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongCode));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_expired_code() {
        let (svc, env) = testing::service();
        let user = testing::user(&env.database, user::Role::User).await;
        let code = issue(&svc, &env, &user.email).await;

        tokio::time::advance(Duration::from_secs(10 * 60)).await;

        let err = svc
            .execute(VerifyUser {
                email: user.email,
                code,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongCode));
    }
}

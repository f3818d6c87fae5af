//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password, Phone};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`User`].
#[derive(Clone, Debug)]
pub struct CreateUser {
    /// [`Name`] of a new [`User`].
    pub name: user::Name,

    /// [`Email`] of a new [`User`].
    pub email: user::Email,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`Phone`] of a new [`User`].
    pub phone: Option<user::Phone>,

    /// [`user::Role`] of a new [`User`].
    pub role: user::Role,
}

impl CreateUser {
    /// [`user::Role`]s a [`User`] may register with.
    pub const ROLES: user::RoleSet =
        user::RoleSet::of(&[user::Role::User, user::Role::Landlord]);
}

impl<Db, Pg, Kv> Command<CreateUser> for Service<Db, Pg, Kv>
where
    Db: for<'e> Database<
            Select<By<Option<User>, &'e user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<User>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            name,
            email,
            password,
            phone,
            role,
        } = cmd;

        if !CreateUser::ROLES.contains(role) {
            return Err(tracerr::new!(E::RoleNotAllowed(role)));
        }

        let u = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if u.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let user = User {
            id: user::Id::new(),
            name,
            email,
            password_hash: user::PasswordHash::new(password.expose_secret()),
            phone,
            role,
            verified_at: None,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(user.clone()))
            .await
            .map_err(|e| {
                if e.as_ref().is_unique_violation(None) {
                    tracerr::new!(E::EmailOccupied(user.email.clone()))
                } else {
                    tracerr::map_from(e)
                }
            })
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`user::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    EmailOccupied(#[error(not(source))] user::Email),

    /// [`user::Role`] cannot be chosen on registration.
    #[display("`{_0}` role cannot be chosen on registration")]
    RoleNotAllowed(#[error(not(source))] user::Role),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{command::Command as _, domain::user, testing};

    use super::{CreateUser, ExecutionError};

    fn cmd(email: &str, role: user::Role) -> CreateUser {
        CreateUser {
            name: user::Name::new("Ada").unwrap(),
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new("correct horse").unwrap(),
            )),
            phone: None,
            role,
        }
    }

    #[tokio::test]
    async fn registers_with_role() {
        let (svc, _) = testing::service();

        let user = svc
            .execute(cmd("ada@example.com", user::Role::Landlord))
            .await
            .unwrap();

        assert_eq!(user.role, user::Role::Landlord);
        assert!(!user.is_verified());
    }

    #[tokio::test]
    async fn rejects_occupied_email() {
        let (svc, _) = testing::service();
        drop(
            svc.execute(cmd("ada@example.com", user::Role::User))
                .await
                .unwrap(),
        );

        let err = svc
            .execute(cmd("ADA@example.com", user::Role::User))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }

    #[tokio::test]
    async fn rejects_admin_registration() {
        let (svc, _) = testing::service();

        let err = svc
            .execute(cmd("root@example.com", user::Role::Admin))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::RoleNotAllowed(_)));
    }
}

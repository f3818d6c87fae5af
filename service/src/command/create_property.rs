//! [`Command`] for listing a new [`Property`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{property, user, Property, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for listing a new [`Property`].
#[derive(Clone, Debug)]
pub struct CreateProperty {
    /// ID of the [`User`] listing the [`Property`].
    pub landlord_id: user::Id,

    /// [`property::Title`] of a new [`Property`].
    pub title: property::Title,

    /// [`property::Location`] of a new [`Property`].
    pub location: property::Location,

    /// [`property::Description`] of a new [`Property`].
    pub description: Option<property::Description>,

    /// Nightly rent of a new [`Property`].
    pub rent: Money,
}

impl CreateProperty {
    /// [`user::Role`]s allowed to list a [`Property`].
    pub const ROLES: user::RoleSet =
        user::RoleSet::of(&[user::Role::Landlord, user::Role::Admin]);
}

impl<Db, Pg, Kv> Command<CreateProperty> for Service<Db, Pg, Kv>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<Property>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateProperty,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateProperty {
            landlord_id,
            title,
            location,
            description,
            rent,
        } = cmd;

        let landlord = self
            .database()
            .execute(Select(By::new(landlord_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::UserNotExists(landlord_id))
            .map_err(tracerr::wrap!())?;
        if !landlord.is_any_of(CreateProperty::ROLES) {
            return Err(tracerr::new!(E::Forbidden(landlord.role)));
        }
        if rent.amount.is_zero() {
            return Err(tracerr::new!(E::InvalidRent(rent)));
        }

        let property = Property {
            id: property::Id::new(),
            landlord_id,
            title,
            location,
            description,
            rent,
            created_at: DateTime::now().coerce(),
            deleted_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(property.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(property)
    }
}

/// Error of [`CreateProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// [`User`] is not allowed to list a [`Property`].
    #[display("`{_0}` cannot list a `Property`")]
    #[from(ignore)]
    Forbidden(#[error(not(source))] user::Role),

    /// Rent is not positive.
    #[display("Rent `{_0}` must be positive")]
    #[from(ignore)]
    InvalidRent(#[error(not(source))] Money),
}

#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        command::Command as _,
        domain::{property, user},
        testing,
    };

    use super::{CreateProperty, ExecutionError};

    fn cmd(landlord_id: user::Id, rent: &str) -> CreateProperty {
        CreateProperty {
            landlord_id,
            title: property::Title::new("Loft").unwrap(),
            location: property::Location::new("Lagos").unwrap(),
            description: None,
            rent: rent.parse::<Money>().unwrap(),
        }
    }

    #[tokio::test]
    async fn lists_for_landlord_and_admin() {
        let (svc, env) = testing::service();

        for role in [user::Role::Landlord, user::Role::Admin] {
            let owner = testing::user(&env.database, role).await;
            let property =
                svc.execute(cmd(owner.id, "100NGN")).await.unwrap();
            assert_eq!(property.landlord_id, owner.id);
            assert!(property.is_bookable());
        }
    }

    #[tokio::test]
    async fn forbids_plain_users() {
        let (svc, env) = testing::service();
        let renter = testing::user(&env.database, user::Role::User).await;

        let err = svc.execute(cmd(renter.id, "100NGN")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Forbidden(_)));
    }

    #[tokio::test]
    async fn rejects_free_rent() {
        let (svc, env) = testing::service();
        let owner = testing::user(&env.database, user::Role::Landlord).await;

        let err = svc.execute(cmd(owner.id, "0NGN")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidRent(_)));
    }
}

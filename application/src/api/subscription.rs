//! GraphQL [`Subscription`]s definitions.

use common::DateTime;
use futures::{
    stream::{self, BoxStream},
    FutureExt as _, StreamExt as _,
};
use juniper::graphql_subscription;

use crate::{context, Context, Error};

/// Root of all GraphQL subscriptions.
#[derive(Clone, Copy, Debug)]
pub struct Subscription;

#[graphql_subscription(context = Context)]
impl Subscription {
    /// Waits for the current `UserSession` to expire.
    ///
    /// Emits a single error once the `UserAuthToken` is not valid anymore, so
    /// clients know when to sign in again.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the current session is not authenticated
    ///                              or has expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "waitSession",
            otel.name = "GraphQL subscription",
        ),
    )]
    pub async fn wait_session(
        &self,
        ctx: &Context,
    ) -> Result<BoxStream<'static, Result<bool, Error>>, Error> {
        let session = ctx.current_session().await?;
        let left = session
            .expires_at
            .duration_since(DateTime::now())
            .unwrap_or_default();
        Ok(stream::once(tokio::time::sleep(left).map(|()| {
            Err(context::AuthError::AuthroizationRequired.into())
        }))
        .boxed())
    }
}

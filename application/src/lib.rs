//! Application serves the property-rental marketplace [`Service`] over
//! GraphQL, REST and WebSocket chat.

#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod api;
pub mod args;
pub mod chat;
pub mod config;
mod context;
pub mod error;
pub mod rest;

use std::sync::Arc;

use axum::{
    extract::WebSocketUpgrade,
    response::{IntoResponse, Response},
    Extension, Json,
};
use derive_more::Debug;
use juniper::{http::GraphQLBatchResponse, DefaultScalarValue, ScalarValue};
use juniper_axum::{extract::JuniperRequest, subscriptions};
use juniper_graphql_ws::ConnectionConfig;
// Used in binary.
use axum_client_ip as _;
use refinery as _;
use tower_http as _;
use tracing_subscriber as _;

pub use self::{
    args::Args,
    config::Config,
    context::{Context, Session},
    error::{AsError, Error},
};

/// [`Service`] with filled infrastructure dependencies.
///
/// [`Service`]: service::Service
pub type Service = service::Service<
    service::infra::Postgres,
    service::infra::payment::Paystack,
    service::infra::kv::Memory,
>;

/// Size limit (in bytes) of a single GraphQL subscriptions message.
const SUBSCRIPTION_MESSAGE_LIMIT: usize = 4 * 1024;

/// Maximum number of GraphQL subscriptions running over one connection.
const SUBSCRIPTION_MAX_OPERATIONS: usize = 10;

/// [`juniper`] GraphQL response, carrying the HTTP status of the first
/// failed resolver.
#[derive(Debug)]
pub struct JuniperResponse<S = DefaultScalarValue>
where
    S: ScalarValue,
{
    /// Status code used whenever the `response` has errors.
    pub status_code: http::StatusCode,

    /// Underlying GraphQL response.
    #[debug(skip)]
    pub response: GraphQLBatchResponse<S>,
}

impl<S> IntoResponse for JuniperResponse<S>
where
    S: ScalarValue,
{
    fn into_response(self) -> Response {
        let status = if self.response.is_ok() {
            http::StatusCode::OK
        } else {
            self.status_code
        };
        (status, Json(self.response)).into_response()
    }
}

/// GraphQL API handler.
///
/// Serves both `GET` and `POST` requests, including batched ones.
pub async fn graphql(
    Extension(schema): Extension<Arc<api::Schema>>,
    context: Context,
    JuniperRequest(gql_request): JuniperRequest,
) -> JuniperResponse {
    JuniperResponse {
        status_code: context.error_status_code(),
        response: gql_request.execute(&*schema, &context).await,
    }
}

/// GraphQL subscriptions handler.
///
/// Sessions are authenticated with the `authToken` connection init
/// payload variable.
#[expect(
    clippy::unused_async,
    reason = "`async` is required to match signature"
)]
pub async fn subscriptions(
    Extension(schema): Extension<Arc<api::Schema>>,
    mut context: Context,
    ws: WebSocketUpgrade,
) -> Response {
    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .max_frame_size(SUBSCRIPTION_MESSAGE_LIMIT)
        .max_message_size(SUBSCRIPTION_MESSAGE_LIMIT)
        .write_buffer_size(SUBSCRIPTION_MESSAGE_LIMIT / 2)
        .max_write_buffer_size(SUBSCRIPTION_MESSAGE_LIMIT)
        .on_upgrade(move |socket| {
            subscriptions::serve_ws(socket, schema, move |vars| async move {
                context.apply_subscription_variables(&vars).map(|()| {
                    ConnectionConfig::new(context)
                        .with_max_in_flight_operations(
                            SUBSCRIPTION_MAX_OPERATIONS,
                        )
                })
            })
        })
}

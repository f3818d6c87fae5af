use std::{
    future::IntoFuture as _,
    io,
    sync::{Arc, OnceLock},
    time,
};

use application::{api, chat, graphql, rest, subscriptions, Args, Config};
use axum::{
    extract::MatchedPath,
    routing::{get, on, MethodFilter},
    Extension, Router,
};
use axum_client_ip::InsecureClientIp;
use futures::future;
use service::{
    infra::{kv, notifier, payment::Paystack, postgres, Postgres},
    realtime::bus,
    Service,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing as log;
use tracing_subscriber::{
    filter::filter_fn,
    fmt::MakeWriter,
    layer::{Layer, SubscriberExt as _},
    registry::LookupSpan,
    util::SubscriberInitExt as _,
};

const STDERR_LEVELS: &[log::Level] = &[log::Level::WARN, log::Level::ERROR];

static LOG_LEVEL: OnceLock<log::Level> = OnceLock::new();

postgres::embed_migrations!("../migrations");

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt_layer(io::stdout, false))
        .with(fmt_layer(io::stderr, true))
        .init();

    _ = start().await;
}

/// Creates a log layer writing either the [`STDERR_LEVELS`] or all the other
/// levels into the provided `writer`.
fn fmt_layer<S, W>(writer: W, stderr: bool) -> impl Layer<S>
where
    S: log::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(true)
        .with_thread_names(true)
        .with_writer(writer)
        .with_filter(filter_fn(move |meta| {
            let max = LOG_LEVEL.get().copied().unwrap_or(log::Level::INFO);
            meta.is_span()
                || (STDERR_LEVELS.contains(meta.level()) == stderr
                    && max >= *meta.level())
        }))
}

async fn start() -> Result<(), ()> {
    let Args { config } = Args::parse().map_err(|e| {
        log::error!("failed to parse command line arguments: {e}");
    })?;

    let Config {
        postgres,
        service,
        server,
        log,
    } = Config::new(config).map_err(|e| {
        log::error!("failed to load `Config`: {e}");
    })?;

    LOG_LEVEL
        .set(log.level.into())
        .unwrap_or_else(|_| unreachable!("first initialization"));

    let postgres_config = postgres.into();
    let mut postgres = Postgres::new(&postgres_config).map_err(|e| {
        log::error!("failed to initialize `Postgres` client: {e}");
    })?;
    migrations::runner()
        .run_async(&mut postgres)
        .await
        .map_err(|e| {
            log::error!("failed to run database migrations: {e}");
        })?;

    let paystack = Paystack::new(service.payment.clone().into()).map_err(|e| {
        log::error!("failed to initialize `Paystack` client: {e}");
    })?;

    let (service, background) = Service::new(
        service.into(),
        postgres,
        paystack,
        kv::Memory::new(),
        Arc::new(bus::Local::default()),
        Arc::new(notifier::Log),
    );

    let app = router(service, cors(&server.cors.origins)?);

    let listener = TcpListener::bind((server.host.clone(), server.port))
        .await
        .map_err(|e| {
            log::error!(
                "failed to listen on `{}:{}`: {e}",
                server.host,
                server.port,
            );
        })?;
    log::info!("listening on `{}:{}`", server.host, server.port);

    let serve = axum::serve(listener, app).into_future();
    let background = background.into_future();
    futures::pin_mut!(serve);
    match future::select(serve, background).await {
        future::Either::Left((res, _)) => res.map_err(|e| {
            log::error!("webserver failed: {e}");
        }),
        future::Either::Right((stopped, _)) => {
            log::error!("{stopped}");
            Err(())
        }
    }
}

/// Builds the [`CorsLayer`] allowing the provided `origins`.
fn cors(origins: &[String]) -> Result<CorsLayer, ()> {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::OPTIONS,
            http::Method::POST,
        ])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
        ]);
    if origins.iter().any(|o| o == "*") {
        return Ok(cors.allow_origin(AllowOrigin::any()));
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<http::HeaderValue>().map_err(|e| {
                log::error!("`{o}` is not a valid CORS origin: {e}");
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

/// Builds the HTTP [`Router`] of all the API surfaces.
fn router(service: application::Service, cors: CorsLayer) -> Router {
    let schema = api::Schema::new(api::Query, api::Mutation, api::Subscription);

    Router::new()
        .route(
            "/graphql",
            on(MethodFilter::GET.or(MethodFilter::POST), graphql),
        )
        .route("/subscriptions", get(subscriptions))
        .route("/chat", get(chat::chat))
        .route("/bookings/verify-payment", get(rest::verify_payment))
        .layer(Extension(Arc::new(schema)))
        .layer(Extension(service))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|r: &http::Request<_>| request_span(r))
                .on_response(
                    |r: &http::Response<_>,
                     dur: time::Duration,
                     span: &tracing::Span| {
                        record_response(r.status(), dur, span);
                    },
                ),
        )
}

/// Creates a [`tracing::Span`] of the provided HTTP request.
fn request_span<B>(r: &http::Request<B>) -> tracing::Span {
    tracing::info_span!(
        "HTTP request",
        http.client_ip = InsecureClientIp::from(r.headers(), r.extensions())
            .map(|ip| ip.0.to_string())
            .ok(),
        http.flavor = ?r.version(),
        http.host = r.uri().host(),
        http.method = r.method().as_str(),
        http.route = r
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str),
        http.scheme = r.uri().scheme().map(http::uri::Scheme::as_str),
        http.target = r
            .uri()
            .path_and_query()
            .map(http::uri::PathAndQuery::as_str),
        http.user_agent = r
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok()),
        http.status_code = tracing::field::Empty,
    )
}

/// Records the HTTP response `status` into the request `span` and logs the
/// request duration.
fn record_response(
    status: http::StatusCode,
    dur: time::Duration,
    span: &tracing::Span,
) {
    _ = span.record(
        "http.status_code",
        tracing::field::display(status.as_u16()),
    );

    let duration = format!("{}ms", dur.as_millis());
    if status.is_server_error() {
        log::error!(duration = duration.as_str());
    } else if status.is_client_error() {
        log::warn!(duration = duration.as_str());
    } else {
        log::info!(duration = duration.as_str());
    }
}

//! users-api is a user accounts service with a cache-aside layer over its
//! record store.
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
mod middleware;
mod router;
pub mod telemetry;
pub mod user;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use error::ServerError;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::user::UserService;

/// Key accepted by [`test_state`].
#[cfg(test)]
pub const TEST_API_KEY: &str = "test-key";

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, TEST_API_KEY)
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State over in-memory store and cache, with cheap hashing.
#[cfg(test)]
pub fn test_state() -> AppState {
    let mut config = config::Configuration::default();
    config.api_key = TEST_API_KEY.to_owned();
    config.argon2 = Some(config::Argon2::light());

    let pwd = Arc::new(
        crypto::PasswordManager::new(config.argon2.clone()).unwrap(),
    );
    let users = UserService::new(
        Arc::new(user::memory::MemoryUserRepository::new()),
        Arc::new(cache::MemoryCache::new()),
        pwd,
    );

    AppState {
        config: Arc::new(config),
        db: database::Database::default(),
        users: Arc::new(users),
        metrics: None,
    }
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub users: Arc<UserService>,
    /// Set once a Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(
                    |chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                        tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                    },
                )
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(true)
                        .level(tracing::Level::INFO),
                )
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        .merge(router::users::router())
        // `GET /metrics` renders Prometheus metrics.
        .route("/metrics", get(router::metrics))
        .route_layer(AxumMiddleware::from_fn_with_state(
            state.clone(),
            middleware::api_key,
        ))
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .fallback(router::not_found)
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state()
-> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    // read configuration file. let it in memory.
    let path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_default();
    let config = config::Configuration::default().path(path).read();

    if config.api_key.is_empty() {
        return Err("missing `USERS_API_KEY` environment variable".into());
    }

    let db = database::Database::connect(&config).await?;

    // execute migrations scripts on start.
    if let Some(pool) = &db.postgres {
        sqlx::migrate!().run(pool).await?;
    }

    let pwd = Arc::new(crypto::PasswordManager::new(config.argon2.clone())?);
    let users = UserService::new(db.repository(), db.cache(), pwd)
        .with_ttl(config.cache_ttl());

    Ok(AppState {
        config,
        db,
        users: Arc::new(users),
        metrics: None,
    })
}

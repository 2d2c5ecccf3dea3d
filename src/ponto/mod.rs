use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Router,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod csrf;
pub mod error;
pub mod handlers;
pub mod hydra;
pub mod join;
pub mod join_token;
pub mod openapi;
pub mod password;
pub mod storage;

use handlers::{consent, health, login, users};
use join::SharedJoinSink;
use hydra::HydraClient;

/// Build the application router with its middleware stack.
///
/// Dependencies are injected here, at the composition root: the pool is
/// created once by [`new`] and handed to every handler via an `Extension`,
/// never lazily behind a global.
pub fn app(
    pool: PgPool,
    globals: Arc<GlobalArgs>,
    hydra: Option<HydraClient>,
    sink: SharedJoinSink,
) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/@login", get(login::begin).post(login::submit))
        .route(
            "/@consent",
            get(consent::begin)
                .post(consent::submit)
                .delete(consent::deny),
        )
        .route("/@users", get(users::list).post(users::create))
        .route("/@users/:userid", get(users::detail).delete(users::remove))
        .route("/@join", axum::routing::post(handlers::join::join))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(globals))
                .layer(Extension(hydra))
                .layer(Extension(sink))
                .layer(Extension(pool)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(globals.pool_min)
        .max_connections(globals.pool_size)
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    storage::ensure_schema(&pool).await?;

    let hydra = globals
        .hydra_admin_url
        .as_deref()
        .map(HydraClient::new)
        .transpose()?;

    // Registration events go through a channel; the drain task stands in for
    // the external provisioning consumer.
    let (sink, rx) = join::ChannelJoinSink::new();
    join::spawn_log_drain(rx);

    let app = app(pool, Arc::new(globals), hydra, Arc::new(sink));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

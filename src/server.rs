//! HTTP server.
//!
//! All endpoints live under `/api/v1`. Successful responses share one
//! envelope:
//!
//! ```json
//! { "statusCode": 200, "data": { ... }, "message": "video fetched", "success": true }
//! ```
//!
//! Errors use the body described in [`crate::error`].
//!
//! | Prefix | Router |
//! |--------|--------|
//! | `/healthcheck` | [`health`] |
//! | `/users` | [`crate::routes::users`] |
//! | `/videos` | [`crate::routes::videos`] |
//! | `/comments` | [`crate::routes::comments`] |
//! | `/posts` | [`crate::routes::posts`] |
//! | `/likes` | [`crate::routes::likes`] |
//! | `/subscriptions` | [`crate::routes::subscriptions`] |
//! | `/playlists` | [`crate::routes::playlists`] |
//! | `/dashboard` | [`crate::routes::dashboard`] |
//! | `/auth` | [`crate::routes::oauth`] |
//!
//! With the `local` media provider, stored files are served from `/media`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::config::Config;
use crate::error::{internal, AppResult};
use crate::media::{build_store, MediaStore};
use crate::oauth::{GoogleProvider, IdentityProvider};
use crate::{db, migrate, routes};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub media: Arc<dyn MediaStore>,
    /// `None` when no identity provider is configured.
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    /// Wires the configured collaborators around an open pool.
    pub fn new(config: Config, pool: SqlitePool) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vidnest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let media = build_store(&config.media, client.clone())?;
        let identity = config.oauth.google.clone().map(|google| {
            Arc::new(GoogleProvider::new(google, client.clone())) as Arc<dyn IdentityProvider>
        });
        Ok(Self {
            pool,
            config: Arc::new(config),
            media,
            identity,
        })
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = media;
        self
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/v1/healthcheck`; 500 when the database is unreachable.
pub async fn health(State(state): State<AppState>) -> AppResult<ApiResponse<Health>> {
    db::check_ready(&state.pool)
        .await
        .map_err(|e| internal(format!("database not ready: {:#}", e)))?;
    Ok(ApiResponse::ok(
        Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
        "service is healthy",
    ))
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let Some(origin) = config.server.cors_origin.as_deref() else {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    };
    let origin = HeaderValue::from_str(origin).context("invalid server.cors_origin")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Request id, tracing, timeout and body limit layers around `router`.
fn apply_standard_layers(router: Router, config: &Config) -> anyhow::Result<Router> {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
        .on_failure(|class: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
            tracing::warn!(classification = %class, latency_ms = latency.as_millis() as u64, "request failed");
        });

    let request_id_header = HeaderName::from_static("x-request-id");

    Ok(router
        .layer(cors_layer(config)?)
        .layer(trace)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid)))
}

/// The full application router with all layers applied.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api = Router::new()
        .route("/healthcheck", get(health))
        .nest("/users", routes::users::router())
        .nest("/videos", routes::videos::router())
        .nest("/comments", routes::comments::router())
        .nest("/posts", routes::posts::router())
        .nest("/likes", routes::likes::router())
        .nest("/subscriptions", routes::subscriptions::router())
        .nest("/playlists", routes::playlists::router())
        .nest("/dashboard", routes::dashboard::router())
        .nest("/auth", routes::oauth::router());

    let mut app = Router::new().nest("/api/v1", api);

    if let Some(local) = state.config.media.local.as_ref().filter(|_| state.config.media.is_local()) {
        app = app.nest_service("/media", ServeDir::new(&local.root));
    }

    let config = state.config.clone();
    apply_standard_layers(app.with_state(state), &config)
}

/// Runs migrations, then serves until Ctrl-C.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = db::connect(&config).await?;
    migrate::apply_schema(&pool).await?;

    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config, pool)?;
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!(addr = %bind_addr, "vidnest listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

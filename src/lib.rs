use crate::config::db::DB;
use crate::config::AppConfig;
use crate::errors::{any_error, ApiError};
use crate::repository::post::PostRepository;
use crate::repository::user::UserRepository;
use crate::service::password_service::PasswordService;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub mod config;
pub mod errors;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod service;
pub mod util;

// Application state shared across handlers
// Cloning AppState is cheap: the config and pool sit behind Arc, and the
// repositories only hold a handle to the same pool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DB>,
    pub posts: PostRepository,
    pub users: UserRepository,
    pub passwords: PasswordService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = DB::new(&config.db.url, config.db.pool_size, config.db.acquire_timeout_secs)
            .await
            .context("Cannot connect to database")?;
        Ok(Self::from_parts(config, db))
    }

    /// Wires the repositories to `db`.
    pub fn from_parts(config: AppConfig, db: DB) -> Self {
        let db = Arc::new(db);
        AppState {
            config: Arc::new(config),
            posts: PostRepository::new(db.pool.clone()),
            users: UserRepository::new(db.pool.clone()),
            passwords: PasswordService::new(),
            db,
        }
    }
}

// Application router creation
// The order of the layers is important.
// https://docs.rs/axum/latest/axum/middleware/index.html#ordering
pub fn create_app(state: AppState) -> Result<Router> {
    let config = &state.config;
    let cors = config.http.cors.clone().into_layer()?;

    let mut app = Router::new()
        .nest("/api", route::create_routes(state.clone()))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(DefaultBodyLimit::max(config.http.max_body_size as usize))
                .layer(cors),
        );

    if config.log.log_requests {
        app = app.layer(TraceLayer::new_for_http());
    }
    Ok(app.with_state(state))
}

pub async fn handle_404(_uri: Uri) -> ApiError {
    any_error(404, "Not Found", None)
}

async fn handle_405() -> ApiError {
    any_error(405, "Method Not Allowed", None)
}

// Custom panic handler, logs the panic and returns a 500 response
fn handle_panic(panic: Box<dyn std::any::Any + Send>) -> Response {
    let panic_message = if let Some(s) = panic.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Unknown panic"
    };

    error!("App panicked: {}", panic_message);
    any_error(500, "Internal Server Error", None).into_response()
}

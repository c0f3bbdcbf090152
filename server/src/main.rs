use anyhow::{Context, Result};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use chrono::{DateTime, Local};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

mod config;
mod error;
mod fs;
mod health;
mod logging;
mod walk;

use crate::{config::ServerConfig, error::ApiError, health::HealthTracker};

// -----------------------------------------------------------------------------
// Shared state
// -----------------------------------------------------------------------------

/// State shared by all API handlers. Nothing here changes per request except
/// the health tracker's last-activity time.
#[derive(Debug)]
pub struct ServerState {
    /// Canonical directory every listing is resolved against.
    pub root: PathBuf,
    pub health: HealthTracker,
}

impl ServerState {
    pub fn new(root: PathBuf, started: DateTime<Local>) -> Self {
        Self {
            root,
            health: HealthTracker::new(started),
        }
    }
}

pub type SharedState = Arc<ServerState>;

// -----------------------------------------------------------------------------
// Main entry
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let _log_guard = logging::init(&config.log_file, config.quiet_debug)?;
    info!("Application started.");

    let root = config
        .root
        .canonicalize()
        .with_context(|| format!("listing root {} is not accessible", config.root.display()))?;

    let state: SharedState = Arc::new(ServerState::new(root, Local::now()));
    info!(
        "Starting web service API on {} serving {}",
        config.listen_addr,
        state.root.display()
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Application stopped from main");
    Ok(())
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", any(home))
        .route("/ls", get(fs::list).fallback(unexpected_route))
        .route("/health", get(health::health).fallback(unexpected_route))
        .route("/ls/", get(strip_trailing_slash).fallback(unexpected_route))
        .route("/health/", get(strip_trailing_slash).fallback(unexpected_route))
        .fallback(unexpected_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(cors)),
        )
        .with_state(state)
}

// -----------------------------------------------------------------------------
// Handlers and middleware
// -----------------------------------------------------------------------------

/// GET /
async fn home() -> &'static str {
    debug!("Hit endpoint: homePage");
    "Welcome to the HomePage!"
}

async fn unexpected_route() -> ApiError {
    ApiError::RouteNotFound
}

/// Redirects `/ls/` and `/health/` to their canonical form, keeping the query.
async fn strip_trailing_slash(uri: Uri) -> Response {
    let path = uri.path().trim_end_matches('/');
    let location = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    match HeaderValue::try_from(location) {
        Ok(location) => {
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        Err(_) => ApiError::RouteNotFound.into_response(),
    }
}

/// Allows any origin, method and header; preflight `OPTIONS` never reaches a handler.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    for name in [
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::ACCESS_CONTROL_ALLOW_HEADERS,
    ] {
        headers.insert(name, HeaderValue::from_static("*"));
    }

    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Application stopped from external, draining open requests");
}

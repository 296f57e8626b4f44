//! `fillform serve` -- HTTP server for one-time response forms.
//!
//! Endpoints:
//! - GET  /health            - Server status
//! - GET  /form/{name}/{key} - Show the form for the record keyed by `key`
//! - POST /form/{name}/{key} - Submit the form
//!
//! Pages are HTML rendered from the embedded templates.

mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use self::handlers::{handle_form_get, handle_form_post, handle_health, handle_not_found};
pub use self::state::{AppState, FormEntry};
use crate::config::AppConfig;

/// Maximum request body size: 64 KiB.
const MAX_BODY_SIZE: usize = 64 * 1024;

pub const MSG_NOT_FOUND: &str = "Not found";
pub const MSG_AMBIGUOUS: &str = "More than one record found for request key";
pub const MSG_NOTIFY_FAILED: &str =
    "Your response has been recorded, but the notification could not be sent.";
pub const MSG_INTERNAL_ERROR: &str = "Internal server error";
pub const MSG_BAD_REQUEST: &str = "Bad request";

/// Message category, mapped onto Bootstrap alert classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Error,
    Message,
    Warning,
}

impl Category {
    pub fn bootstrap_class(self) -> &'static str {
        match self {
            Category::Error => "danger",
            Category::Message => "primary",
            Category::Warning => "warning",
        }
    }
}

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/form/{name}/{key}",
            get(handle_form_get).post(handle_form_post),
        )
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server for every form in `config`.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(
    config: AppConfig,
    bind: &str,
    port: u16,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    for (name, form) in &config.forms {
        tracing::info!(form = %name, table = %form.table, "serving form");
    }
    let app = router(Arc::new(AppState::from_config(&config)?));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        tracing::info!(%addr, "fillform listening on https");
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "fillform listening on http");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(err) => {
            tracing::error!(error = %err, "cannot listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

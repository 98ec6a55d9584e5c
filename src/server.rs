//! HTTP trigger for the `GetPhotoMetadata` function.
//!
//! Mounted as a custom handler behind the Azure Functions host, which owns
//! authorization; this layer only parses the request, runs the pipeline and
//! renders the result.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::Config;
use crate::fetch::ImageFetcher;
use crate::pipeline::{self, DebugInfo, MetadataRequest, PipelineError, ProcessResult};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn ImageFetcher>,
}

/// Router exposing the function on `route` for both GET and POST.
pub fn router(route: &str, fetcher: Arc<dyn ImageFetcher>) -> Router {
    Router::new()
        .route(route, get(get_photo_metadata).post(get_photo_metadata))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(AppState { fetcher })
}

async fn get_photo_metadata(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let debug_mode = pipeline::debug_requested(&params);
    if debug_mode {
        log::info!("Debug mode enabled for request");
    }
    log::info!("GetPhotoMetadata called");

    let request = match MetadataRequest::from_params(&params, &body) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("{err}");
            return error_response(&err, &DebugInfo::default(), debug_mode);
        }
    };

    let result = pipeline::process(&request, state.fetcher.as_ref()).await;
    render(result, request.debug)
}

/// Turn a pipeline result into the function's HTTP response.
pub fn render(result: ProcessResult, debug_mode: bool) -> Response {
    match result.into_body(debug_mode) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err((err, debug)) => error_response(&err, &debug, debug_mode),
    }
}

fn error_response(err: &PipelineError, debug: &DebugInfo, debug_mode: bool) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if debug_mode {
        if let Some(body) = err.debug_body(debug) {
            return (status, Json(body)).into_response();
        }
    }
    (status, err.to_string()).into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    log::error!("Unhandled exception in GetPhotoMetadata: {message}");

    let err = PipelineError::Unhandled { message };
    error_response(&err, &DebugInfo::default(), false)
}

/// Serve the function until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config, fetcher: Arc<dyn ImageFetcher>) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let route = config.server.route_path();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("GetPhotoMetadata listening on http://{addr}{route}");

    axum::serve(listener, router(&route, fetcher))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C signal"),
        _ = terminate => log::info!("Received terminate signal"),
    }

    log::info!("Shutting down gracefully...");
}

//! Serves an [`App`] over HTTP with axum.
//!
//! The App is single threaded, so every request gets a fresh App from the
//! factory on a blocking worker. The response is emitted into a
//! [`BufferedEmitter`] and handed back to axum.
use std::sync::Arc;

use axum::{
    Router,
    body::Body as AxumBody,
    extract::{Request as AxumRequest, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response as AxumResponse},
};
use bytes::Bytes;
use eyre::{Result as EyreResult, WrapErr};
use http_body_util::BodyExt;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;

use crate::{
    adapters::buffered_emitter::BufferedEmitter,
    core::app::App,
    error::Result,
    http::Request,
};

/// Builds the App serving one request.
pub type AppFactory = Arc<dyn Fn() -> Result<App> + Send + Sync>;

#[derive(Clone)]
struct HostState {
    factory: AppFactory,
}

/// axum router sending every request through a fresh App.
pub fn router(factory: AppFactory) -> Router {
    Router::new()
        .fallback(handle_request)
        .with_state(HostState { factory })
        .layer(TraceLayer::new_for_http())
}

/// Serve until SIGINT or SIGTERM.
pub async fn serve(listener: TcpListener, factory: AppFactory) -> EyreResult<()> {
    let addr = listener
        .local_addr()
        .wrap_err("Failed to read listener address")?;
    tracing::info!("Switchyard listening on {}", addr);

    axum::serve(listener, router(factory))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server error")?;

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

async fn handle_request(State(state): State<HostState>, request: AxumRequest) -> AxumResponse {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!("Failed to read request body: {}", e);
            return (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
        }
    };

    let factory = Arc::clone(&state.factory);
    let outcome =
        tokio::task::spawn_blocking(move || process_blocking(&factory, &parts, body)).await;

    match outcome {
        Ok(Ok(response)) => response.map(AxumBody::from),
        Ok(Err(e)) => {
            tracing::error!("Request handling error: {}", e);
            internal_error()
        }
        Err(e) => {
            tracing::error!("Request worker failed: {}", e);
            internal_error()
        }
    }
}

/// Run one request through a fresh App and collect the emitted response.
pub fn process_blocking(
    factory: &AppFactory,
    parts: &http::request::Parts,
    body: Bytes,
) -> Result<http::Response<Bytes>> {
    let app = factory()?;
    let request = Request::from_http(parts, body);
    let mut response = app.process(request, app.response_template())?;

    let mut emitter = BufferedEmitter::new();
    app.respond(&mut response, &mut emitter)?;
    Ok(emitter.into_http_response())
}

fn internal_error() -> AxumResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        "Internal Server Error",
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

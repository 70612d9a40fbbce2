//! Serve command - runs the reference Treesync server.

use std::time::Duration;

use axum::{
    Router,
    extract::{Json as ExtractJson, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::signal::unix::{SignalKind, signal};
use treesync::{
    Document,
    constants::{POLL_ENDPOINT, PUSH_ENDPOINT, REGISTER_ENDPOINT},
    sync::protocol::{RegisterResponse, SessionQuery},
};

use crate::cli::ServeArgs;
use crate::session::{PollReply, SessionStore};

/// Build the server's router over `sessions`.
pub fn router(sessions: SessionStore) -> Router {
    Router::new()
        .route("/health", get(handle_health_endpoint))
        .route(REGISTER_ENDPOINT, post(handle_register))
        .route(POLL_ENDPOINT, get(handle_poll))
        .route(PUSH_ENDPOINT, post(handle_push))
        .with_state(sessions)
}

/// Run the Treesync server
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ttl = (args.session_ttl > 0).then(|| Duration::from_secs(args.session_ttl));
    let app = router(SessionStore::new(ttl));

    // Bind server
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    // Register signal handlers before serving so a failure is reported up front
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    println!("Treesync server listening on http://{local_addr}");
    println!();
    println!("Available endpoints:");
    println!("  GET  /health                - Health check");
    println!("  POST {REGISTER_ENDPOINT}       - Register a session");
    println!("  GET  {POLL_ENDPOINT}?key=K     - Poll for the document");
    println!("  POST {PUSH_ENDPOINT}?key=K     - Push a document");
    println!();
    println!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
                _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
            }
        })
        .await?;

    println!("Server shut down");
    Ok(())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: u64,
    sessions: usize,
}

/// Handler for GET /health - Health check endpoint
async fn handle_health_endpoint(State(sessions): State<SessionStore>) -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy",
        version: sessions.version().await,
        sessions: sessions.session_count().await,
    })
}

/// Handler for POST /api/v0/register - issue a session key
async fn handle_register(State(sessions): State<SessionStore>) -> axum::Json<RegisterResponse> {
    axum::Json(RegisterResponse {
        key: sessions.create_session().await,
    })
}

/// Handler for GET /api/v0/poll - 200 with the document, 304 when the session
/// is up to date, 404 for an unknown key
async fn handle_poll(
    State(sessions): State<SessionStore>,
    Query(query): Query<SessionQuery>,
) -> Response {
    match sessions.poll(query.key.as_str()).await {
        PollReply::Unknown => StatusCode::NOT_FOUND.into_response(),
        PollReply::Unchanged => StatusCode::NOT_MODIFIED.into_response(),
        PollReply::Updated(document) => axum::Json(document).into_response(),
    }
}

/// Handler for POST /api/v0/push - fold a client document into the server's
async fn handle_push(
    State(sessions): State<SessionStore>,
    Query(query): Query<SessionQuery>,
    ExtractJson(document): ExtractJson<Document>,
) -> StatusCode {
    match sessions.push(query.key.as_str(), &document).await {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

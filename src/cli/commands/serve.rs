//! HTTP API server.
//!
//! Exposes the question-answering pipeline to browser extensions and other
//! clients.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use crate::rag::{ChatTurn, RagResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let state = Arc::new(AppState {
        pipeline: Pipeline::new(&settings)?,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("tubeqa API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Status", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Query (RAG)", "POST /rag/query");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the API routes with permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/rag/query", post(query))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
struct QueryRequest {
    video_id: String,
    question: String,
    #[serde(default)]
    chat_history: Vec<ChatTurn>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "tubeqa API is running" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return (
                rejection.status(),
                Json(ErrorResponse {
                    error: rejection.body_text(),
                }),
            )
                .into_response();
        }
    };

    let span = info_span!("rag_query", request_id = %Uuid::new_v4(), video_id = %req.video_id);

    async move {
        info!("Question with {} history turns", req.chat_history.len());

        match state
            .pipeline
            .run(&req.video_id, &req.question, &req.chat_history)
            .await
        {
            Ok(result) => Json::<RagResult>(result).into_response(),
            Err(e) => {
                error!("Query failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: e.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

//! HTTP surface: `GET /`, `GET /health` and `POST /convert`.
//!
//! `/convert` takes the raw body and parses it with
//! [`ConvertRequest::from_json`] so malformed or invalid payloads map to
//! `400` through the same [`ErrorKind`] table as every other failure,
//! instead of the extractor's own rejection codes.

use crate::config::ServiceConfig;
use crate::convert::convert;
use crate::error::{ErrorKind, Qp2PdfError};
use crate::model::ConvertRequest;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Largest accepted request body (inline images make payloads large).
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Response body chunk size.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
}

/// Build the application router with CORS open to every origin.
pub fn router(config: ServiceConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/convert", post(convert_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────────────

/// A pipeline error rendered as `{"error", "kind", "status"}`.
#[derive(Debug)]
pub struct ApiError(pub Qp2PdfError);

impl From<Qp2PdfError> for ApiError {
    fn from(e: Qp2PdfError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match kind {
            ErrorKind::InternalFault => error!("Internal error: {}", self.0),
            _ => info!("Request failed ({}): {}", status.as_u16(), self.0),
        }

        let body = Json(json!({
            "error": self.0.to_string(),
            "kind": kind,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "LaTeX to PDF Converter API",
        "endpoints": ["/convert", "/health"],
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn convert_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = ConvertRequest::from_json(&body)?;
    let document = convert(request, &state.config).await?;

    info!(
        "Returning {} ({} bytes, protected: {})",
        document.file_name,
        document.bytes.len(),
        document.protected
    );

    let bytes = Bytes::from(document.bytes);
    let chunks: Vec<Result<Bytes, Infallible>> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len()))))
        .collect();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", document.file_name),
            ),
        ],
        Body::from_stream(futures::stream::iter(chunks)),
    )
        .into_response())
}

//! HTTP glue: routing, JSON shapes, and error→status mapping.
//!
//! The interesting work happens in `detectai-inference`; this module only
//! marshals requests in and results out, in the wire format the browser
//! extension expects.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use detectai_inference::{DetectError, DetectionPipeline};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub question: Question,
}

#[derive(Debug, Default, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub model_loaded: bool,
}

pub fn router(pipeline: Arc<DetectionPipeline>) -> Router {
    Router::new()
        .route("/detect", post(detect))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

async fn detect(
    State(pipeline): State<Arc<DetectionPipeline>>,
    Json(request): Json<DetectRequest>,
) -> Response {
    let DetectRequest { code, question } = request;

    // Model load and inference are CPU-bound and can take a while; keep them
    // off the async workers.
    let outcome =
        tokio::task::spawn_blocking(move || pipeline.detect(&code, &question.tags)).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => {
            error!(%join_err, "detection task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "internal error".to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn health(State(pipeline): State<Arc<DetectionPipeline>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        model_loaded: pipeline.registry().is_loaded(),
    })
}

fn status_for(err: &DetectError) -> StatusCode {
    match err {
        DetectError::EmptyCode => StatusCode::BAD_REQUEST,
        DetectError::TagNotAllowed => StatusCode::FORBIDDEN,
        DetectError::ModelLoad(_) | DetectError::Inference(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: &DetectError) -> Response {
    if err.is_client_error() {
        debug!(%err, "rejected request");
    } else {
        error!(%err, "detection failed");
    }
    (
        status_for(err),
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

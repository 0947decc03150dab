pub mod cables;
pub mod junction_closures;
pub mod layout;
pub mod nodes;
pub mod paths;
pub mod systems;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{TopologyError, TopologyErrorExt};

/// Error response body: {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{} not found", resource),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse::new(self.message)),
        )
            .into_response()
    }
}

/// HTTP status for each engine error kind
fn topology_status(err: &TopologyError) -> StatusCode {
    match err {
        TopologyError::NotFound { .. } => StatusCode::NOT_FOUND,
        TopologyError::Conflict(_) | TopologyError::CycleDetected(_) => StatusCode::CONFLICT,
        TopologyError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TopologyError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Typed engine errors carry their own status; anything else is internal
        if let Some(topology) = err.topology_error() {
            return Self {
                status: topology_status(topology),
                message: topology.to_string(),
            };
        }
        tracing::error!("Request failed: {:#}", err);
        Self::internal(err.to_string())
    }
}

/// Message response for simple status messages
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Json<Self> {
        Json(Self { message: msg.into() })
    }
}

/// Response helper: return 201 Created with JSON body
pub fn created<T: Serialize>(item: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(item))
}

/// Healthcheck endpoint: 200 with service status, 503 if the database is unreachable
pub async fn healthcheck(
    axum::extract::State(state): axum::extract::State<std::sync::Arc<crate::AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (status, db) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("Healthcheck database ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": db,
            "service": "fiber-topology",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

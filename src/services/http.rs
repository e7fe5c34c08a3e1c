use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{Channels, ServiceError};
use crate::session::SessionSigner;

mod auth;
mod ledger;
mod levels;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub channels: Channels,
    pub sessions: Arc<SessionSigner>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("Not allowed to access this resource.")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Internal server error.")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::Invalid(message) => ApiError::Invalid(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(details) => {
                log::error!("Request failed: {}", details);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Sends a request to a service and waits for its reply.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ApiError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to process request: {}", e)))?;

    let result = response_rx
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to receive response: {}", e)))?;

    Ok(result?)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/levels",
            get(levels::list_levels).put(levels::update_levels),
        )
        .route("/users/{id}/level", get(users::get_user_level))
        .route("/users/{id}/referrals", get(users::list_referrals))
        .route("/users/{id}/ledger", get(ledger::get_ledger))
        .route("/users/{id}/withdrawals", post(ledger::request_withdrawal))
        .route("/transactions", post(ledger::record_cashback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    channels: Channels,
    sessions: Arc<SessionSigner>,
) -> Result<(), anyhow::Error> {
    let app = router(AppState { channels, sessions });

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

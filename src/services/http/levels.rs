use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::{auth::AdminSession, dispatch, ApiError, AppState};
use crate::models::levels::ClientLevel;
use crate::services::levels::LevelRequest;

pub async fn list_levels(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let levels = dispatch(&state.channels.levels, |response| LevelRequest::ListLevels {
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(levels)))
}

pub async fn update_levels(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(rows): Json<Vec<ClientLevel>>,
) -> Result<impl IntoResponse, ApiError> {
    log::info!("Admin {} is updating {} client levels.", admin.user_id, rows.len());

    let updated = dispatch(&state.channels.levels, |response| LevelRequest::UpdateLevels {
        rows,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(json!({ "updated": updated }))))
}

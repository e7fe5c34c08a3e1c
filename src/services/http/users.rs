use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{auth::Session, dispatch, ApiError, AppState};
use crate::services::users::UserRequest;

pub async fn get_user_level(
    State(state): State<AppState>,
    Session(session): Session,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !session.can_access(user_id) {
        return Err(ApiError::Forbidden);
    }

    let level = dispatch(&state.channels.users, |response| UserRequest::GetUserLevel {
        id: user_id,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(level)))
}

pub async fn list_referrals(
    State(state): State<AppState>,
    Session(session): Session,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !session.can_access(user_id) {
        return Err(ApiError::Forbidden);
    }

    let referrals = dispatch(&state.channels.users, |response| UserRequest::ListReferrals {
        id: user_id,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(referrals)))
}

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use super::{ApiError, AppState};
use crate::session::SessionClaims;

/// A verified session. Verification happens once here; handlers only read claims.
pub struct Session(pub SessionClaims);

/// A verified session whose claims carry the admin role.
pub struct AdminSession(pub SessionClaims);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token.".to_string()))?;

        let claims = state
            .sessions
            .verify(token.trim(), chrono::Utc::now().timestamp())
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(Session(claims))
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Session(claims) = Session::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            log::warn!("User {} attempted an admin action.", claims.user_id);
            return Err(ApiError::Forbidden);
        }

        Ok(AdminSession(claims))
    }
}

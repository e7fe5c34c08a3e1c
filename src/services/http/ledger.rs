use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{
    auth::{AdminSession, Session},
    dispatch, ApiError, AppState,
};
use crate::models::{transactions::NewCashbackTransaction, withdrawals::NewWithdrawal};
use crate::services::ledger::LedgerRequest;

pub async fn get_ledger(
    State(state): State<AppState>,
    Session(session): Session,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !session.can_access(user_id) {
        return Err(ApiError::Forbidden);
    }

    let ledger = dispatch(&state.channels.ledger, |response| LedgerRequest::GetLedger {
        user_id,
        response,
    })
    .await?;

    Ok((StatusCode::OK, Json(ledger)))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Session(session): Session,
    Path(user_id): Path<Uuid>,
    Json(request): Json<NewWithdrawal>,
) -> Result<impl IntoResponse, ApiError> {
    // Withdrawals are only ever requested by the account owner.
    if session.user_id != user_id {
        return Err(ApiError::Forbidden);
    }

    let withdrawal = dispatch(&state.channels.ledger, |response| {
        LedgerRequest::RequestWithdrawal {
            user_id,
            amount: request.amount,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(withdrawal)))
}

pub async fn record_cashback(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Json(rows): Json<Vec<NewCashbackTransaction>>,
) -> Result<impl IntoResponse, ApiError> {
    log::info!("Admin {} is recording {} cashback rows.", admin.user_id, rows.len());

    let recorded = dispatch(&state.channels.ledger, |response| {
        LedgerRequest::RecordCashback { rows, response }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(recorded)))
}

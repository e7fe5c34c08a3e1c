use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError, CHANNEL_CAPACITY};
use crate::loyalty::{self, LedgerSummary};
use crate::models::{
    transactions::{CashbackTransaction, NewCashbackTransaction},
    withdrawals::Withdrawal,
};
use crate::repositories::transactions::{LedgerError, LedgerRepository};

#[derive(Serialize)]
pub struct Ledger {
    pub transactions: Vec<CashbackTransaction>,
    pub withdrawals: Vec<Withdrawal>,
    pub summary: LedgerSummary,
}

pub enum LedgerRequest {
    RecordCashback {
        rows: Vec<NewCashbackTransaction>,
        response: oneshot::Sender<Result<Vec<CashbackTransaction>, ServiceError>>,
    },
    GetLedger {
        user_id: Uuid,
        response: oneshot::Sender<Result<Ledger, ServiceError>>,
    },
    RequestWithdrawal {
        user_id: Uuid,
        amount: Decimal,
        response: oneshot::Sender<Result<Withdrawal, ServiceError>>,
    },
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UserNotFound(id) => ServiceError::NotFound(format!("User {}.", id)),
            LedgerError::InvalidAmount(_) | LedgerError::InsufficientBalance { .. } => {
                ServiceError::Invalid(e.to_string())
            }
            LedgerError::Database(e) => ServiceError::Database(e.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct LedgerRequestHandler {
    repository: LedgerRepository,
}

impl LedgerRequestHandler {
    pub fn new(repository: LedgerRepository) -> Self {
        LedgerRequestHandler { repository }
    }

    async fn record_cashback(
        &self,
        rows: Vec<NewCashbackTransaction>,
    ) -> Result<Vec<CashbackTransaction>, ServiceError> {
        if rows.is_empty() {
            return Err(ServiceError::Invalid("No transactions were submitted.".to_string()));
        }

        self.repository.record_cashback(&rows).await.map_err(|e| {
            log::error!("Could not record cashback batch: {}", e);
            e.into()
        })
    }

    async fn get_ledger(&self, user_id: Uuid) -> Result<Ledger, ServiceError> {
        let transactions = self.repository.list_transactions(user_id).await?;
        let withdrawals = self.repository.list_withdrawals(user_id).await?;
        let summary = loyalty::summarize(user_id, &transactions, &withdrawals);

        Ok(Ledger {
            transactions,
            withdrawals,
            summary,
        })
    }

    async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Withdrawal, ServiceError> {
        let withdrawal = self.repository.request_withdrawal(user_id, amount).await?;
        log::info!("Withdrawal {} of {} requested by {}.", withdrawal.id, amount, user_id);

        Ok(withdrawal)
    }
}

#[async_trait]
impl RequestHandler<LedgerRequest> for LedgerRequestHandler {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::RecordCashback { rows, response } => {
                let result = self.record_cashback(rows).await;
                let _ = response.send(result);
            }
            LedgerRequest::GetLedger { user_id, response } => {
                let ledger = self.get_ledger(user_id).await;
                let _ = response.send(ledger);
            }
            LedgerRequest::RequestWithdrawal {
                user_id,
                amount,
                response,
            } => {
                let result = self.request_withdrawal(user_id, amount).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl Service<LedgerRequest, LedgerRequestHandler> for LedgerService {}

pub fn spawn(repository: LedgerRepository) -> mpsc::Sender<LedgerRequest> {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        LedgerService::new()
            .run(LedgerRequestHandler::new(repository), &mut rx)
            .await;
    });

    tx
}

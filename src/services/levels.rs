use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{RequestHandler, Service, ServiceError, CHANNEL_CAPACITY};
use crate::loyalty::BulkUpdateError;
use crate::models::levels::ClientLevel;
use crate::repositories::levels::LevelStore;

pub enum LevelRequest {
    ListLevels {
        response: oneshot::Sender<Result<Vec<ClientLevel>, ServiceError>>,
    },
    UpdateLevels {
        rows: Vec<ClientLevel>,
        response: oneshot::Sender<Result<usize, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct LevelRequestHandler<S> {
    store: S,
}

impl<S: LevelStore> LevelRequestHandler<S> {
    pub fn new(store: S) -> Self {
        LevelRequestHandler { store }
    }

    async fn list_levels(&self) -> Result<Vec<ClientLevel>, ServiceError> {
        self.store
            .list_levels()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn update_levels(&self, rows: Vec<ClientLevel>) -> Result<usize, ServiceError> {
        match self.store.update_levels(&rows).await {
            Ok(applied) => {
                log::info!("Updated {} client levels.", applied);
                Ok(applied)
            }
            Err(e @ (BulkUpdateError::Invalid(_) | BulkUpdateError::Inconsistent(_))) => {
                Err(ServiceError::Invalid(e.to_string()))
            }
            Err(e) => {
                log::error!("Client level update rolled back: {}", e);
                Err(ServiceError::Repository("LevelService".to_string(), e.to_string()))
            }
        }
    }
}

#[async_trait]
impl<S: LevelStore> RequestHandler<LevelRequest> for LevelRequestHandler<S> {
    async fn handle_request(&self, request: LevelRequest) {
        match request {
            LevelRequest::ListLevels { response } => {
                let levels = self.list_levels().await;
                let _ = response.send(levels);
            }
            LevelRequest::UpdateLevels { rows, response } => {
                let result = self.update_levels(rows).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LevelService;

impl LevelService {
    pub fn new() -> Self {
        LevelService {}
    }
}

#[async_trait]
impl<S: LevelStore> Service<LevelRequest, LevelRequestHandler<S>> for LevelService {}

pub fn spawn<S: LevelStore>(store: S) -> mpsc::Sender<LevelRequest> {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        LevelService::new()
            .run(LevelRequestHandler::new(store), &mut rx)
            .await;
    });

    tx
}

/// Asks the level service for the current table.
pub async fn request_levels(
    channel: &mpsc::Sender<LevelRequest>,
) -> Result<Vec<ClientLevel>, ServiceError> {
    let (response, levels) = oneshot::channel();

    channel
        .send(LevelRequest::ListLevels { response })
        .await
        .map_err(|e| ServiceError::Communication("LevelService".to_string(), e.to_string()))?;

    levels
        .await
        .map_err(|e| ServiceError::Communication("LevelService".to_string(), e.to_string()))?
}

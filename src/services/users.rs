use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{levels, RequestHandler, Service, ServiceError, CHANNEL_CAPACITY};
use crate::loyalty;
use crate::models::{
    levels::ClientLevel,
    users::{Referral, User, UserLevel},
};
use crate::repositories::users::UserRepository;

pub enum UserRequest {
    GetUserLevel {
        id: Uuid,
        response: oneshot::Sender<Result<UserLevel, ServiceError>>,
    },
    ListReferrals {
        id: Uuid,
        response: oneshot::Sender<Result<Vec<Referral>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    level_channel: mpsc::Sender<levels::LevelRequest>,
}

impl UserRequestHandler {
    pub fn new(repository: UserRepository, level_channel: mpsc::Sender<levels::LevelRequest>) -> Self {
        UserRequestHandler {
            repository,
            level_channel,
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<User, ServiceError> {
        self.repository
            .get_user_by_id(id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("User {}.", id)))
    }

    async fn get_user_level(&self, id: Uuid) -> Result<UserLevel, ServiceError> {
        let user = self.get_user(id).await?;
        let levels = levels::request_levels(&self.level_channel).await?;

        user_level(&user, &levels)
            .ok_or_else(|| ServiceError::Internal("Client level table is empty.".to_string()))
    }

    async fn list_referrals(&self, id: Uuid) -> Result<Vec<Referral>, ServiceError> {
        self.get_user(id).await?;

        self.repository
            .list_referrals(id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }
}

/// Current tier, next tier and progress for a user's stored level and earnings.
pub fn user_level(user: &User, levels: &[ClientLevel]) -> Option<UserLevel> {
    let resolved = loyalty::resolve_level(levels, user.level)?;
    let progress = loyalty::progress(user.monthly_earnings, resolved.next);

    Some(UserLevel {
        user_id: user.id,
        monthly_earnings: user.monthly_earnings,
        current: resolved.current.clone(),
        next: resolved.next.cloned(),
        progress: progress.percent,
        earnings_needed: progress.earnings_needed,
    })
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::GetUserLevel { id, response } => {
                let level = self.get_user_level(id).await;
                let _ = response.send(level);
            }
            UserRequest::ListReferrals { id, response } => {
                let referrals = self.list_referrals(id).await;
                let _ = response.send(referrals);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

pub fn spawn(
    repository: UserRepository,
    level_channel: mpsc::Sender<levels::LevelRequest>,
) -> mpsc::Sender<UserRequest> {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        UserService::new()
            .run(UserRequestHandler::new(repository, level_channel), &mut rx)
            .await;
    });

    tx
}

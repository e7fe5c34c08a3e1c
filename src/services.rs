use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::{
    repositories::{levels::LevelRepository, transactions::LedgerRepository, users::UserRepository},
    session::SessionSigner,
    settings::Settings,
};

pub mod http;
pub mod ledger;
pub mod levels;
pub mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Senders for every running service.
#[derive(Clone)]
pub struct Channels {
    pub levels: mpsc::Sender<levels::LevelRequest>,
    pub users: mpsc::Sender<users::UserRequest>,
    pub ledger: mpsc::Sender<ledger::LedgerRequest>,
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let sessions = Arc::new(SessionSigner::new(settings.session.key.as_bytes())?);

    log::info!("Starting level service.");
    let level_tx = levels::spawn(LevelRepository::new(pool.clone()));

    log::info!("Starting user service.");
    let user_tx = users::spawn(UserRepository::new(pool.clone()), level_tx.clone());

    log::info!("Starting ledger service.");
    let ledger_tx = ledger::spawn(LedgerRepository::new(pool));

    let channels = Channels {
        levels: level_tx,
        users: user_tx,
        ledger: ledger_tx,
    };

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.http.listen, channels, sessions).await?;

    Ok(())
}

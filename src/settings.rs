use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::models::levels::LevelSeed;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub http: Http,
    pub session: Session,
}

impl Settings {
    /// Reads `path`, then lets `CASHBACK__SECTION__KEY` variables override it.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("postgres.max_connections", 5)?
            .set_default("http.listen", "0.0.0.0:8080")?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CASHBACK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

/// Loads a level table seed file (`[[levels]]` entries).
pub fn load_level_seed(path: &str) -> Result<LevelSeed, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(path))
        .build()?;

    config.try_deserialize()
}

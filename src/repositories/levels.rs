use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tokio::sync::RwLock;

use crate::loyalty::{self, BulkUpdateError, LevelError, LevelWriter};
use crate::models::levels::ClientLevel;

/// Storage of the client level table.
///
/// `update_levels` is all-or-nothing: when any row fails, no row is changed.
#[async_trait]
pub trait LevelStore: Clone + Send + Sync + 'static {
    async fn list_levels(&self) -> Result<Vec<ClientLevel>, anyhow::Error>;

    async fn seed_levels(&self, levels: &[ClientLevel]) -> Result<(), anyhow::Error>;

    async fn update_levels(&self, rows: &[ClientLevel]) -> Result<usize, BulkUpdateError>;
}

#[derive(Clone)]
pub struct LevelRepository {
    conn: PgPool,
}

impl LevelRepository {
    pub fn new(conn: PgPool) -> Self {
        LevelRepository { conn }
    }
}

pub async fn fetch_levels<'e, E>(executor: E) -> Result<Vec<ClientLevel>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ClientLevel>(
        "SELECT id, name, required_total, advantage_referral_cashback, \
         advantage_referral_store, advantage_product_discount \
         FROM client_levels ORDER BY id",
    )
    .fetch_all(executor)
    .await
}

struct PgLevelWriter<'c> {
    conn: &'c mut PgConnection,
}

#[async_trait]
impl<'c> LevelWriter for PgLevelWriter<'c> {
    async fn write_level(&mut self, level: &ClientLevel) -> Result<(), anyhow::Error> {
        let result = sqlx::query(
            "UPDATE client_levels SET name = $2, required_total = $3, \
             advantage_referral_cashback = $4, advantage_referral_store = $5, \
             advantage_product_discount = $6 WHERE id = $1",
        )
        .bind(level.id)
        .bind(&level.name)
        .bind(level.required_total)
        .bind(level.advantage_referral_cashback)
        .bind(level.advantage_referral_store)
        .bind(level.advantage_product_discount)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LevelError::UnknownLevel(level.id).into());
        }

        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> BulkUpdateError {
    BulkUpdateError::Storage(e.to_string())
}

#[async_trait]
impl LevelStore for LevelRepository {
    async fn list_levels(&self) -> Result<Vec<ClientLevel>, anyhow::Error> {
        Ok(fetch_levels(&self.conn).await?)
    }

    async fn seed_levels(&self, levels: &[ClientLevel]) -> Result<(), anyhow::Error> {
        loyalty::validate_table(levels)?;

        let mut tx = self.conn.begin().await?;
        for level in levels {
            sqlx::query(
                r#"
                INSERT INTO client_levels
                (id, name, required_total, advantage_referral_cashback,
                 advantage_referral_store, advantage_product_discount)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    required_total = EXCLUDED.required_total,
                    advantage_referral_cashback = EXCLUDED.advantage_referral_cashback,
                    advantage_referral_store = EXCLUDED.advantage_referral_store,
                    advantage_product_discount = EXCLUDED.advantage_product_discount
                "#,
            )
            .bind(level.id)
            .bind(&level.name)
            .bind(level.required_total)
            .bind(level.advantage_referral_cashback)
            .bind(level.advantage_referral_store)
            .bind(level.advantage_product_discount)
            .execute(&mut *tx)
            .await?;
        }

        let table = fetch_levels(&mut *tx).await?;
        loyalty::validate_table(&table)?;
        tx.commit().await?;

        Ok(())
    }

    async fn update_levels(&self, rows: &[ClientLevel]) -> Result<usize, BulkUpdateError> {
        loyalty::validate_edits(rows).map_err(BulkUpdateError::Invalid)?;

        // Dropping `tx` on any early return rolls every row back.
        let mut tx = self.conn.begin().await.map_err(storage_error)?;
        let applied = {
            let mut writer = PgLevelWriter { conn: &mut *tx };
            loyalty::apply_sequential(&mut writer, rows).await?
        };

        let table = fetch_levels(&mut *tx).await.map_err(storage_error)?;
        loyalty::validate_table(&table).map_err(BulkUpdateError::Inconsistent)?;
        tx.commit().await.map_err(storage_error)?;

        Ok(applied)
    }
}

/// Level table held in memory; edits are applied to a copy and swapped in.
#[derive(Clone, Default)]
pub struct MemoryLevelStore {
    levels: Arc<RwLock<Vec<ClientLevel>>>,
}

impl MemoryLevelStore {
    pub fn new(levels: Vec<ClientLevel>) -> Self {
        MemoryLevelStore {
            levels: Arc::new(RwLock::new(levels)),
        }
    }
}

#[async_trait]
impl LevelStore for MemoryLevelStore {
    async fn list_levels(&self) -> Result<Vec<ClientLevel>, anyhow::Error> {
        Ok(self.levels.read().await.clone())
    }

    async fn seed_levels(&self, levels: &[ClientLevel]) -> Result<(), anyhow::Error> {
        let mut table = self.levels.write().await;
        let mut seeded = table.clone();
        for level in levels {
            match seeded.iter_mut().find(|existing| existing.id == level.id) {
                Some(existing) => *existing = level.clone(),
                None => seeded.push(level.clone()),
            }
        }
        seeded.sort_by_key(|level| level.id);
        loyalty::validate_table(&seeded)?;

        *table = seeded;
        Ok(())
    }

    async fn update_levels(&self, rows: &[ClientLevel]) -> Result<usize, BulkUpdateError> {
        loyalty::validate_edits(rows).map_err(BulkUpdateError::Invalid)?;

        let mut table = self.levels.write().await;
        let mut edited = table.clone();
        let applied = loyalty::apply_sequential(&mut edited, rows).await?;
        loyalty::validate_table(&edited).map_err(BulkUpdateError::Inconsistent)?;

        *table = edited;
        Ok(applied)
    }
}

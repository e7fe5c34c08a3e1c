use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::loyalty::Credit;
use crate::models::users::{Referral, Role, User};

const USER_COLUMNS: &str =
    "id, email, level, monthly_earnings, referred_by, role, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, anyhow::Error> {
        Ok(fetch_user(&self.conn, user_id, false).await?)
    }

    pub async fn list_referrals(&self, user_id: Uuid) -> Result<Vec<Referral>, anyhow::Error> {
        let referrals = sqlx::query_as::<_, Referral>(
            "SELECT id, email, level, created_at FROM users \
             WHERE referred_by = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(referrals)
    }

    pub async fn list_admins(&self) -> Result<Vec<User>, anyhow::Error> {
        let admins = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY email"
        ))
        .bind(Role::Admin)
        .fetch_all(&self.conn)
        .await?;

        Ok(admins)
    }

    /// Zeroes every user's monthly earnings. Levels are left as they are.
    pub async fn reset_monthly_earnings(&self) -> Result<u64, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE users SET monthly_earnings = 0, updated_at = CURRENT_TIMESTAMP \
             WHERE monthly_earnings <> 0",
        )
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Loads a user, optionally locking the row for the rest of the transaction.
pub async fn fetch_user<'e, E>(
    executor: E,
    user_id: Uuid,
    for_update: bool,
) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let lock = if for_update { " FOR UPDATE" } else { "" };

    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1{lock}"
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await
}


/// Locks the listed users in id order. Writers locking several users must all
/// use this order.
pub async fn lock_users(conn: &mut PgConnection, user_ids: &[Uuid]) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(user_ids)
    .fetch_all(conn)
    .await
}

pub async fn write_credit(conn: &mut PgConnection, credit: &Credit) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET monthly_earnings = $2, level = $3, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $1",
    )
    .bind(credit.user_id)
    .bind(credit.monthly_earnings)
    .bind(credit.level)
    .execute(conn)
    .await?;

    Ok(())
}

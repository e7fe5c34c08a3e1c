use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    levels::fetch_levels,
    users::{fetch_user, lock_users, write_credit},
};
use crate::loyalty;
use crate::models::{
    transactions::{CashbackTransaction, NewCashbackTransaction, ReferralBonus},
    users::User,
    withdrawals::{Withdrawal, WithdrawalStatus},
};

const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, cashback_amount, date, source_type, \
     referral_bonus_to, referral_bonus_amount, source_user_id, created_at";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),
    #[error(transparent)]
    InvalidAmount(#[from] loyalty::AmountOutOfRange),
    #[error("Requested {requested} but only {available} is available.")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct LedgerRepository {
    conn: PgPool,
}

impl LedgerRepository {
    pub fn new(conn: PgPool) -> Self {
        LedgerRepository { conn }
    }

    /// Records a batch of cashback rows in one transaction.
    ///
    /// Every earner and referrer is locked up front in id order. Referral bonuses
    /// are snapshotted from the referrer's level at this moment, then both sides
    /// are credited and promoted as [`loyalty::plan_credit`] decides.
    pub async fn record_cashback(
        &self,
        rows: &[NewCashbackTransaction],
    ) -> Result<Vec<CashbackTransaction>, LedgerError> {
        for row in rows {
            loyalty::check_amount(row.cashback_amount)?;
        }

        let mut tx = self.conn.begin().await?;
        let levels = fetch_levels(&mut *tx).await?;

        let earners: Vec<Uuid> = rows.iter().map(|row| row.user_id).collect();
        let referrers: Vec<Uuid> = sqlx::query_scalar(
            "SELECT referred_by FROM users WHERE id = ANY($1) AND referred_by IS NOT NULL",
        )
        .bind(&earners)
        .fetch_all(&mut *tx)
        .await?;
        let ids: Vec<Uuid> = earners
            .into_iter()
            .chain(referrers)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut users: HashMap<Uuid, User> = lock_users(&mut tx, &ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut recorded = Vec::with_capacity(rows.len());
        for row in rows {
            let earner = users
                .get(&row.user_id)
                .cloned()
                .ok_or(LedgerError::UserNotFound(row.user_id))?;
            let referrer = match earner.referred_by {
                Some(referrer_id) => match users.get(&referrer_id) {
                    Some(referrer) => Some(referrer.clone()),
                    // Referrer changed after the lock set was read.
                    None => fetch_user(&mut *tx, referrer_id, true).await?,
                },
                None => None,
            };

            let plan = loyalty::plan_credit(
                &levels,
                &earner,
                referrer.as_ref(),
                row.cashback_amount,
                row.source_type,
            )?;
            if let Some(referrer) = referrer {
                users.entry(referrer.id).or_insert(referrer);
            }

            let transaction = insert_transaction(&mut tx, row, plan.bonus).await?;
            for credit in [plan.earner, plan.referrer].into_iter().flatten() {
                write_credit(&mut tx, &credit).await?;
                if let Some(user) = users.get_mut(&credit.user_id) {
                    if credit.level != user.level {
                        log::info!(
                            "User {} promoted from level {} to {}.",
                            user.id,
                            user.level,
                            credit.level
                        );
                    }
                    user.monthly_earnings = credit.monthly_earnings;
                    user.level = credit.level;
                }
            }

            recorded.push(transaction);
        }

        tx.commit().await?;
        log::info!("Recorded {} cashback transactions.", recorded.len());

        Ok(recorded)
    }

    /// Rows where the user earned cashback or received a referral bonus.
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CashbackTransaction>, LedgerError> {
        Ok(list_transactions(&self.conn, user_id).await?)
    }

    pub async fn list_withdrawals(&self, user_id: Uuid) -> Result<Vec<Withdrawal>, LedgerError> {
        Ok(list_withdrawals(&self.conn, user_id).await?)
    }

    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Withdrawal, LedgerError> {
        loyalty::check_amount(amount)?;

        let mut tx = self.conn.begin().await?;
        // Locking the user serialises concurrent requests against one balance.
        fetch_user(&mut *tx, user_id, true)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let transactions = list_transactions(&mut *tx, user_id).await?;
        let withdrawals = list_withdrawals(&mut *tx, user_id).await?;
        let available = loyalty::summarize(user_id, &transactions, &withdrawals).available_balance;
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (id, user_id, amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, amount, status, requested_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount)
        .bind(WithdrawalStatus::Pending)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }
}

async fn insert_transaction(
    conn: &mut PgConnection,
    row: &NewCashbackTransaction,
    bonus: Option<ReferralBonus>,
) -> Result<CashbackTransaction, sqlx::Error> {
    sqlx::query_as::<_, CashbackTransaction>(&format!(
        r#"
        INSERT INTO cashback_transactions
        (id, user_id, account_id, cashback_amount, date, source_type,
         referral_bonus_to, referral_bonus_amount, source_user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(row.user_id)
    .bind(&row.account_id)
    .bind(row.cashback_amount)
    .bind(row.date)
    .bind(row.source_type)
    .bind(bonus.map(|b| b.to))
    .bind(bonus.map(|b| b.amount))
    .bind(bonus.map(|_| row.user_id))
    .fetch_one(conn)
    .await
}

async fn list_transactions<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Vec<CashbackTransaction>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, CashbackTransaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM cashback_transactions \
         WHERE user_id = $1 OR referral_bonus_to = $1 ORDER BY date DESC, created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await
}

async fn list_withdrawals<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Withdrawal>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Withdrawal>(
        "SELECT id, user_id, amount, status, requested_at FROM withdrawals \
         WHERE user_id = $1 ORDER BY requested_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{levels::ClientLevel, transactions::SourceType};
    use crate::repositories::{
        levels::{LevelRepository, LevelStore},
        users::UserRepository,
    };

    fn level(id: i32, required_total: Decimal) -> ClientLevel {
        ClientLevel {
            id,
            name: format!("Tier {id}"),
            required_total,
            advantage_referral_cashback: Decimal::from(id * 5),
            advantage_referral_store: Decimal::from(id * 2),
            advantage_product_discount: Decimal::from(id),
        }
    }

    async fn seed(pool: &PgPool) {
        LevelRepository::new(pool.clone())
            .seed_levels(&[level(1, dec!(0)), level(2, dec!(100)), level(3, dec!(500))])
            .await
            .unwrap();
    }

    async fn insert_user(pool: &PgPool, level: i32, referred_by: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, level, referred_by) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(format!("{id}@example.com"))
            .bind(level)
            .bind(referred_by)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    fn row(user_id: Uuid, amount: Decimal, source_type: SourceType) -> NewCashbackTransaction {
        NewCashbackTransaction {
            user_id,
            account_id: "MT5-1001".to_string(),
            cashback_amount: amount,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            source_type,
        }
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn bonus_is_snapshotted_and_both_users_promoted(pool: PgPool) {
        seed(&pool).await;
        let referrer = insert_user(&pool, 2, None).await;
        let earner = insert_user(&pool, 1, Some(referrer)).await;
        let ledger = LedgerRepository::new(pool.clone());
        let users = UserRepository::new(pool.clone());

        let recorded = ledger
            .record_cashback(&[row(earner, dec!(150), SourceType::Cashback)])
            .await
            .unwrap();
        assert_eq!(recorded[0].referral_bonus_to, Some(referrer));
        assert_eq!(recorded[0].referral_bonus_amount, Some(dec!(15)));
        assert_eq!(recorded[0].source_user_id, Some(earner));

        let earner_row = users.get_user_by_id(earner).await.unwrap().unwrap();
        assert_eq!(earner_row.monthly_earnings, dec!(150));
        assert_eq!(earner_row.level, 2);
        let referrer_row = users.get_user_by_id(referrer).await.unwrap().unwrap();
        assert_eq!(referrer_row.monthly_earnings, dec!(15));
        assert_eq!(referrer_row.level, 2);

        let mut richer = level(2, dec!(100));
        richer.advantage_referral_cashback = dec!(50);
        LevelRepository::new(pool.clone())
            .update_levels(&[richer])
            .await
            .unwrap();

        let rows = ledger.list_transactions(referrer).await.unwrap();
        assert_eq!(rows[0].referral_bonus_amount, Some(dec!(15)));
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn store_purchase_pays_referrer_only(pool: PgPool) {
        seed(&pool).await;
        let referrer = insert_user(&pool, 3, None).await;
        let buyer = insert_user(&pool, 1, Some(referrer)).await;
        let ledger = LedgerRepository::new(pool.clone());

        ledger
            .record_cashback(&[row(buyer, dec!(100), SourceType::Store)])
            .await
            .unwrap();

        let buyer_row = UserRepository::new(pool.clone())
            .get_user_by_id(buyer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buyer_row.monthly_earnings, Decimal::ZERO);

        let refused = ledger.request_withdrawal(buyer, dec!(1)).await;
        assert!(matches!(
            refused,
            Err(LedgerError::InsufficientBalance { available, .. }) if available == Decimal::ZERO
        ));

        // Tier 3 pays 6% on store purchases.
        let withdrawal = ledger.request_withdrawal(referrer, dec!(6)).await.unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn withdrawals_count_against_the_balance(pool: PgPool) {
        seed(&pool).await;
        let trader = insert_user(&pool, 1, None).await;
        let ledger = LedgerRepository::new(pool.clone());
        ledger
            .record_cashback(&[row(trader, dec!(30), SourceType::Cashback)])
            .await
            .unwrap();

        ledger.request_withdrawal(trader, dec!(20)).await.unwrap();
        let second = ledger.request_withdrawal(trader, dec!(20)).await;
        assert!(matches!(
            second,
            Err(LedgerError::InsufficientBalance { available, .. }) if available == dec!(10)
        ));
        assert!(matches!(
            ledger.request_withdrawal(trader, Decimal::ZERO).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(ledger.list_withdrawals(trader).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn unknown_user_rolls_back_the_batch(pool: PgPool) {
        seed(&pool).await;
        let trader = insert_user(&pool, 1, None).await;
        let stranger = Uuid::new_v4();
        let ledger = LedgerRepository::new(pool.clone());

        let result = ledger
            .record_cashback(&[
                row(trader, dec!(10), SourceType::Cashback),
                row(stranger, dec!(10), SourceType::Cashback),
            ])
            .await;

        assert!(matches!(result, Err(LedgerError::UserNotFound(id)) if id == stranger));
        assert!(ledger.list_transactions(trader).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn lists_referrals(pool: PgPool) {
        let referrer = insert_user(&pool, 1, None).await;
        let first = insert_user(&pool, 1, Some(referrer)).await;
        let second = insert_user(&pool, 1, Some(referrer)).await;
        insert_user(&pool, 1, None).await;

        let mut referrals: Vec<Uuid> = UserRepository::new(pool)
            .list_referrals(referrer)
            .await
            .unwrap()
            .into_iter()
            .map(|referral| referral.id)
            .collect();
        referrals.sort();
        let mut expected = vec![first, second];
        expected.sort();

        assert_eq!(referrals, expected);
    }
}

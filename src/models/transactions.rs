use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "transaction_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Cashback,
    Store,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct CashbackTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: String,
    pub cashback_amount: Decimal,
    pub date: chrono::NaiveDate,
    pub source_type: SourceType,
    pub referral_bonus_to: Option<Uuid>,
    pub referral_bonus_amount: Option<Decimal>,
    pub source_user_id: Option<Uuid>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewCashbackTransaction {
    pub user_id: Uuid,
    pub account_id: String,
    pub cashback_amount: Decimal,
    pub date: chrono::NaiveDate,
    pub source_type: SourceType,
}

/// Referral fields fixed at creation time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferralBonus {
    pub to: Uuid,
    pub amount: Decimal,
}

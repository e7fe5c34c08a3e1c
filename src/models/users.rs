use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::levels::ClientLevel;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type, clap::ValueEnum,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub level: i32,
    pub monthly_earnings: Decimal,
    pub referred_by: Option<Uuid>,
    pub role: Role,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: Uuid,
    pub email: String,
    pub level: i32,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserLevel {
    pub user_id: Uuid,
    pub monthly_earnings: Decimal,
    pub current: ClientLevel,
    pub next: Option<ClientLevel>,
    pub progress: Decimal,
    pub earnings_needed: Decimal,
}

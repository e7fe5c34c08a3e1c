use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A loyalty tier. `id` is the stable tier rank, starting at 1.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct ClientLevel {
    pub id: i32,
    pub name: String,
    pub required_total: Decimal,
    pub advantage_referral_cashback: Decimal,
    pub advantage_referral_store: Decimal,
    pub advantage_product_discount: Decimal,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LevelSeed {
    pub levels: Vec<ClientLevel>,
}

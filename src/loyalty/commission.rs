use rust_decimal::Decimal;

use crate::models::{levels::ClientLevel, transactions::SourceType};

/// `amount * advantage / 100`, with the advantage picked by source. Not rounded.
/// `None` when the product overflows.
pub fn referral_commission(
    amount: Decimal,
    referrer_level: &ClientLevel,
    source: SourceType,
) -> Option<Decimal> {
    let advantage = match source {
        SourceType::Cashback => referrer_level.advantage_referral_cashback,
        SourceType::Store => referrer_level.advantage_referral_store,
    };

    amount.checked_mul(advantage)?.checked_div(Decimal::ONE_HUNDRED)
}

pub fn discounted_price(price: Decimal, level: &ClientLevel) -> Option<Decimal> {
    let discount = price
        .checked_mul(level.advantage_product_discount)?
        .checked_div(Decimal::ONE_HUNDRED)?;

    price.checked_sub(discount)
}

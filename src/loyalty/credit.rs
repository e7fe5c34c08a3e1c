use rust_decimal::Decimal;

use super::{commission::referral_commission, levels::promoted_level, levels::resolve_level};
use crate::models::{
    levels::ClientLevel,
    transactions::{ReferralBonus, SourceType},
    users::User,
};

/// Largest amount a single cashback or withdrawal row may carry.
pub const MAX_TRANSACTION_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Amount must be positive and at most {}.", MAX_TRANSACTION_AMOUNT)]
pub struct AmountOutOfRange;

/// A user's earnings and level after a credit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Credit {
    pub user_id: uuid::Uuid,
    pub monthly_earnings: Decimal,
    pub level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CreditPlan {
    pub bonus: Option<ReferralBonus>,
    pub earner: Option<Credit>,
    pub referrer: Option<Credit>,
}

pub fn check_amount(amount: Decimal) -> Result<(), AmountOutOfRange> {
    if amount <= Decimal::ZERO || amount > MAX_TRANSACTION_AMOUNT {
        return Err(AmountOutOfRange);
    }
    Ok(())
}

/// What one cashback row does to the earner and their referrer.
///
/// Cashback rows credit the earner; store rows are purchases and only pay the
/// referrer. The referrer's bonus uses their level as it is now.
pub fn plan_credit(
    levels: &[ClientLevel],
    earner: &User,
    referrer: Option<&User>,
    amount: Decimal,
    source: SourceType,
) -> Result<CreditPlan, AmountOutOfRange> {
    check_amount(amount)?;

    let mut plan = CreditPlan::default();
    if source == SourceType::Cashback {
        plan.earner = Some(credit(levels, earner, amount)?);
    }

    let Some(referrer) = referrer.filter(|referrer| referrer.id != earner.id) else {
        return Ok(plan);
    };
    let Some(resolved) = resolve_level(levels, referrer.level) else {
        return Ok(plan);
    };

    let commission = referral_commission(amount, resolved.current, source).ok_or(AmountOutOfRange)?;
    plan.bonus = Some(ReferralBonus {
        to: referrer.id,
        amount: commission,
    });
    plan.referrer = Some(credit(levels, referrer, commission)?);

    Ok(plan)
}

fn credit(levels: &[ClientLevel], user: &User, amount: Decimal) -> Result<Credit, AmountOutOfRange> {
    let monthly_earnings = user
        .monthly_earnings
        .checked_add(amount)
        .ok_or(AmountOutOfRange)?;

    Ok(Credit {
        user_id: user.id,
        monthly_earnings,
        level: promoted_level(levels, user.level, monthly_earnings),
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::loyalty::levels::tests::table;
    use crate::models::users::Role;

    fn user(level: i32, monthly_earnings: Decimal, referred_by: Option<Uuid>) -> User {
        let joined = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();
        User {
            id: Uuid::new_v4(),
            email: "trader@example.com".to_string(),
            level,
            monthly_earnings,
            referred_by,
            role: Role::User,
            created_at: joined,
            updated_at: joined,
        }
    }

    #[test]
    fn cashback_credits_earner_and_pays_referrer() {
        let levels = table();
        let referrer = user(2, dec!(10), None);
        let earner = user(1, dec!(40), Some(referrer.id));

        let plan = plan_credit(&levels, &earner, Some(&referrer), dec!(80), SourceType::Cashback).unwrap();

        // Tier 2 pays 10% on cashback.
        assert_eq!(
            plan.bonus,
            Some(ReferralBonus {
                to: referrer.id,
                amount: dec!(8),
            })
        );
        assert_eq!(
            plan.earner,
            Some(Credit {
                user_id: earner.id,
                monthly_earnings: dec!(120),
                level: 2,
            })
        );
        assert_eq!(
            plan.referrer,
            Some(Credit {
                user_id: referrer.id,
                monthly_earnings: dec!(18),
                level: 2,
            })
        );
    }

    #[test]
    fn store_purchase_only_pays_referrer() {
        let levels = table();
        let referrer = user(3, dec!(600), None);
        let buyer = user(1, dec!(0), Some(referrer.id));

        let plan = plan_credit(&levels, &buyer, Some(&referrer), dec!(50), SourceType::Store).unwrap();

        assert_eq!(plan.earner, None);
        // Tier 3 pays 6% on store purchases.
        assert_eq!(plan.bonus.map(|bonus| bonus.amount), Some(dec!(3)));
        assert_eq!(plan.referrer.map(|credit| credit.monthly_earnings), Some(dec!(603)));
    }

    #[test]
    fn bonus_promotes_referrer() {
        let levels = table();
        let referrer = user(2, dec!(495), None);
        let earner = user(1, dec!(0), Some(referrer.id));

        let plan = plan_credit(&levels, &earner, Some(&referrer), dec!(100), SourceType::Cashback).unwrap();

        assert_eq!(plan.referrer.map(|credit| credit.level), Some(3));
        assert_eq!(plan.earner.map(|credit| credit.level), Some(2));
    }

    #[test]
    fn credit_never_demotes() {
        let levels = table();
        let earner = user(4, dec!(0), None);

        let plan = plan_credit(&levels, &earner, None, dec!(5), SourceType::Cashback).unwrap();

        assert_eq!(plan.earner.map(|credit| credit.level), Some(4));
    }

    #[test]
    fn no_referrer_means_no_bonus() {
        let levels = table();
        let earner = user(1, dec!(0), None);

        let plan = plan_credit(&levels, &earner, None, dec!(5), SourceType::Cashback).unwrap();
        assert_eq!(plan.bonus, None);
        assert_eq!(plan.referrer, None);

        let mut own = user(1, dec!(0), None);
        own.referred_by = Some(own.id);
        let plan = plan_credit(&levels, &own, Some(&own), dec!(5), SourceType::Cashback).unwrap();
        assert_eq!(plan.bonus, None);
    }

    #[test]
    fn amounts_out_of_range_are_rejected() {
        let levels = table();
        let referrer = user(1, dec!(0), None);
        let earner = user(1, dec!(0), Some(referrer.id));

        for amount in [dec!(0), dec!(-1), MAX_TRANSACTION_AMOUNT + dec!(0.01), Decimal::MAX] {
            assert_eq!(
                plan_credit(&levels, &earner, Some(&referrer), amount, SourceType::Cashback),
                Err(AmountOutOfRange)
            );
        }
        assert!(plan_credit(&levels, &earner, None, MAX_TRANSACTION_AMOUNT, SourceType::Store).is_ok());
    }

    #[test]
    fn saturated_earnings_are_rejected() {
        let levels = table();
        let earner = user(1, Decimal::MAX, None);

        assert_eq!(
            plan_credit(&levels, &earner, None, dec!(1), SourceType::Cashback),
            Err(AmountOutOfRange)
        );
    }
}

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    transactions::{CashbackTransaction, SourceType},
    withdrawals::{Withdrawal, WithdrawalStatus},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total_cashback: Decimal,
    pub total_referral_earnings: Decimal,
    pub total_withdrawn: Decimal,
    pub pending_withdrawals: Decimal,
    pub available_balance: Decimal,
}

/// Folds a user's fetched ledger rows into totals.
///
/// `transactions` may mix the user's own cashback with rows where the user only
/// received the referral bonus; each side is counted by its own column. Store
/// rows are the user's purchases, so only their referral bonus counts.
pub fn summarize(
    user_id: Uuid,
    transactions: &[CashbackTransaction],
    withdrawals: &[Withdrawal],
) -> LedgerSummary {
    let mut summary = LedgerSummary::default();

    for tx in transactions {
        if tx.user_id == user_id && tx.source_type == SourceType::Cashback {
            summary.total_cashback += tx.cashback_amount;
        }
        if tx.referral_bonus_to == Some(user_id) {
            summary.total_referral_earnings += tx.referral_bonus_amount.unwrap_or_default();
        }
    }

    for withdrawal in withdrawals.iter().filter(|w| w.user_id == user_id) {
        match withdrawal.status {
            WithdrawalStatus::Completed => summary.total_withdrawn += withdrawal.amount,
            WithdrawalStatus::Pending => summary.pending_withdrawals += withdrawal.amount,
            WithdrawalStatus::Rejected => {}
        }
    }

    summary.available_balance = summary.total_cashback + summary.total_referral_earnings
        - summary.total_withdrawn
        - summary.pending_withdrawals;

    summary
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;

    use super::*;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn cashback(user_id: Uuid, amount: Decimal, bonus: Option<(Uuid, Decimal)>) -> CashbackTransaction {
        CashbackTransaction {
            id: Uuid::new_v4(),
            user_id,
            account_id: "MT5-1001".to_string(),
            cashback_amount: amount,
            date: timestamp().date(),
            source_type: SourceType::Cashback,
            referral_bonus_to: bonus.map(|(to, _)| to),
            referral_bonus_amount: bonus.map(|(_, amount)| amount),
            source_user_id: bonus.map(|_| user_id),
            created_at: timestamp(),
        }
    }

    fn store_purchase(user_id: Uuid, amount: Decimal, bonus: Option<(Uuid, Decimal)>) -> CashbackTransaction {
        CashbackTransaction {
            source_type: SourceType::Store,
            ..cashback(user_id, amount, bonus)
        }
    }

    fn withdrawal(user_id: Uuid, amount: Decimal, status: WithdrawalStatus) -> Withdrawal {
        Withdrawal {
            id: Uuid::new_v4(),
            user_id,
            amount,
            status,
            requested_at: timestamp(),
        }
    }

    #[test]
    fn totals_and_available_balance() {
        let me = Uuid::new_v4();
        let friend = Uuid::new_v4();

        let transactions = vec![
            cashback(me, dec!(120.50), None),
            cashback(me, dec!(30), None),
            cashback(friend, dec!(200), Some((me, dec!(20)))),
        ];
        let withdrawals = vec![
            withdrawal(me, dec!(50), WithdrawalStatus::Completed),
            withdrawal(me, dec!(25), WithdrawalStatus::Pending),
            withdrawal(me, dec!(999), WithdrawalStatus::Rejected),
        ];

        let summary = summarize(me, &transactions, &withdrawals);

        assert_eq!(summary.total_cashback, dec!(150.50));
        assert_eq!(summary.total_referral_earnings, dec!(20));
        assert_eq!(summary.total_withdrawn, dec!(50));
        assert_eq!(summary.pending_withdrawals, dec!(25));
        assert_eq!(summary.available_balance, dec!(95.50));
    }

    #[test]
    fn referrer_view_excludes_referred_cashback() {
        let me = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let transactions = vec![cashback(friend, dec!(200), Some((me, dec!(20))))];

        let mine = summarize(me, &transactions, &[]);
        let theirs = summarize(friend, &transactions, &[]);

        assert_eq!(mine.total_cashback, Decimal::ZERO);
        assert_eq!(mine.available_balance, dec!(20));
        assert_eq!(theirs.total_cashback, dec!(200));
        assert_eq!(theirs.total_referral_earnings, Decimal::ZERO);
    }

    #[test]
    fn store_purchases_are_not_withdrawable() {
        let buyer = Uuid::new_v4();
        let referrer = Uuid::new_v4();
        let transactions = vec![store_purchase(buyer, dec!(100), Some((referrer, dec!(4))))];

        let bought = summarize(buyer, &transactions, &[]);
        let referred = summarize(referrer, &transactions, &[]);

        assert_eq!(bought.total_cashback, Decimal::ZERO);
        assert_eq!(bought.available_balance, Decimal::ZERO);
        assert_eq!(referred.total_referral_earnings, dec!(4));
        assert_eq!(referred.available_balance, dec!(4));
    }
}

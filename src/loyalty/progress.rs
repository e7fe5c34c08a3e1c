use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::levels::ClientLevel;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Progress {
    /// Percentage towards the next tier, within `0..=100`.
    pub percent: Decimal,
    pub earnings_needed: Decimal,
}

impl Progress {
    const COMPLETE: Progress = Progress {
        percent: Decimal::ONE_HUNDRED,
        earnings_needed: Decimal::ZERO,
    };
}

/// Progress towards `next`. A missing next tier or a non-positive threshold
/// counts as complete.
pub fn progress(monthly_earnings: Decimal, next: Option<&ClientLevel>) -> Progress {
    let Some(next) = next else {
        return Progress::COMPLETE;
    };
    if next.required_total <= Decimal::ZERO {
        return Progress::COMPLETE;
    }

    // Overflow only happens far past the threshold (or far below it).
    let overflowed = if monthly_earnings.is_sign_negative() {
        Decimal::ZERO
    } else {
        Decimal::ONE_HUNDRED
    };
    let percent = monthly_earnings
        .checked_div(next.required_total)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(overflowed)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let earnings_needed = next
        .required_total
        .checked_sub(monthly_earnings)
        .unwrap_or(Decimal::MAX)
        .max(Decimal::ZERO);

    Progress {
        percent,
        earnings_needed,
    }
}

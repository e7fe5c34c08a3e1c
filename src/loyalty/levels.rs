use std::collections::HashSet;

use rust_decimal::Decimal;

use super::LevelError;
use crate::models::levels::ClientLevel;

const MAX_PERCENT: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedLevel<'a> {
    pub current: &'a ClientLevel,
    pub next: Option<&'a ClientLevel>,
}

/// Looks up the user's stored level and the one after it.
///
/// An unknown level id silently falls back to the first tier. `next` is keyed on
/// the stored id, so a user already at (or past) the last rank has no next tier.
/// Returns `None` only for an empty table.
pub fn resolve_level(levels: &[ClientLevel], user_level_id: i32) -> Option<ResolvedLevel<'_>> {
    let current = levels
        .iter()
        .find(|level| level.id == user_level_id)
        .or_else(|| levels.first())?;

    let at_max = usize::try_from(user_level_id).is_ok_and(|id| id >= levels.len());
    let next = if at_max {
        None
    } else {
        user_level_id
            .checked_add(1)
            .and_then(|next_id| levels.iter().find(|level| level.id == next_id))
    };

    Some(ResolvedLevel { current, next })
}

/// Highest tier whose threshold is covered by `earnings`, or the first tier.
pub fn level_for_earnings(levels: &[ClientLevel], earnings: Decimal) -> Option<&ClientLevel> {
    levels
        .iter()
        .filter(|level| level.required_total <= earnings)
        .max_by(|a, b| a.required_total.cmp(&b.required_total))
        .or_else(|| levels.first())
}

/// Level after new earnings were credited. Users are promoted, never demoted.
pub fn promoted_level(levels: &[ClientLevel], current_level_id: i32, earnings: Decimal) -> i32 {
    level_for_earnings(levels, earnings).map_or(current_level_id, |level| level.id.max(current_level_id))
}

/// Checks a whole table: ids 1..=N in order, thresholds strictly increasing.
pub fn validate_table(levels: &[ClientLevel]) -> Result<(), LevelError> {
    let mut previous: Option<&ClientLevel> = None;

    for (index, level) in levels.iter().enumerate() {
        let expected = index as i32 + 1;
        if level.id != expected {
            return Err(LevelError::NonContiguous {
                expected,
                found: level.id,
            });
        }
        validate_row(level)?;

        if let Some(previous) = previous {
            if level.required_total <= previous.required_total {
                return Err(LevelError::ThresholdNotIncreasing {
                    id: level.id,
                    previous: previous.id,
                });
            }
        }
        previous = Some(level);
    }

    Ok(())
}

/// Checks a batch of edited rows before anything is written.
pub fn validate_edits(rows: &[ClientLevel]) -> Result<(), LevelError> {
    if rows.is_empty() {
        return Err(LevelError::EmptyBatch);
    }

    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(row.id) {
            return Err(LevelError::DuplicateLevel(row.id));
        }
        validate_row(row)?;
    }

    Ok(())
}

fn validate_row(level: &ClientLevel) -> Result<(), LevelError> {
    if level.required_total < Decimal::ZERO {
        return Err(LevelError::NegativeThreshold(level.id));
    }

    let advantages = [
        ("advantage_referral_cashback", level.advantage_referral_cashback),
        ("advantage_referral_store", level.advantage_referral_store),
        ("advantage_product_discount", level.advantage_product_discount),
    ];
    for (field, value) in advantages {
        if value < Decimal::ZERO || value > MAX_PERCENT {
            return Err(LevelError::AdvantageOutOfRange {
                id: level.id,
                field,
            });
        }
    }

    Ok(())
}

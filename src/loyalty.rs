//! Tier resolution, progress, referral commission and ledger math.
//!
//! Everything here is pure and synchronous except the bulk apply loop, which
//! drives an async [`LevelWriter`] so the same loop serves Postgres and memory.

mod bulk;
mod commission;
mod credit;
mod ledger;
mod levels;
mod progress;

pub use bulk::{apply_sequential, BulkUpdateError, LevelWriter};
pub use commission::{discounted_price, referral_commission};
pub use credit::{
    check_amount, plan_credit, AmountOutOfRange, Credit, CreditPlan, MAX_TRANSACTION_AMOUNT,
};
pub use ledger::{summarize, LedgerSummary};
pub use levels::{
    level_for_earnings, promoted_level, resolve_level, validate_edits, validate_table,
    ResolvedLevel,
};
pub use progress::{progress, Progress};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevelError {
    #[error("No levels were submitted.")]
    EmptyBatch,
    #[error("Level {0} was submitted more than once.")]
    DuplicateLevel(i32),
    #[error("Level {0} does not exist.")]
    UnknownLevel(i32),
    #[error("Level ids must be contiguous from 1: expected {expected}, found {found}.")]
    NonContiguous { expected: i32, found: i32 },
    #[error("Level {0} has a negative required total.")]
    NegativeThreshold(i32),
    #[error("Level {id} must require more than level {previous}.")]
    ThresholdNotIncreasing { id: i32, previous: i32 },
    #[error("Level {id} has {field} outside 0..=100.")]
    AdvantageOutOfRange { id: i32, field: &'static str },
}

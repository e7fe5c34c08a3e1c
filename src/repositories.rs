pub mod levels;
pub mod transactions;
pub mod users;

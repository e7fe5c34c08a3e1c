pub mod loyalty;
pub mod models;
pub mod repositories;
pub mod services;
pub mod session;
pub mod settings;

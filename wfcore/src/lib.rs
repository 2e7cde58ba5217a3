pub mod ac;
pub mod approval;
pub mod audit;
pub mod condition;
pub mod document;
pub mod error;
pub mod platform;
pub mod workflow;

#[cfg(feature = "sqlx")]
mod row;

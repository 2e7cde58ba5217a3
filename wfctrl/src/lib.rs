pub mod error;
pub(crate) mod lock;
pub mod platform;

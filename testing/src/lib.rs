#[cfg(feature = "chrono")]
pub mod chrono;
pub mod core;
#[cfg(feature = "ctrl")]
pub mod ctrl;

/// Compile time check that a type may be shared across tasks.
pub fn is_send_sync<T: Send + Sync>() {}

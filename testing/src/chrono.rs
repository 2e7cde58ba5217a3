//! A clock that never moves, so persisted timestamps can be asserted.

use ::chrono::{
    DateTime,
    TimeZone,
};

pub struct Utc;

impl Utc {
    pub fn now() -> DateTime<::chrono::Utc> {
        ::chrono::Utc.timestamp_opt(1234567890, 0)
            .single()
            .expect("fixed timestamp is valid")
    }
}

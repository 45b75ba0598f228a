//! Cross-platform time utilities.
//!
//! `std::time::SystemTime::now()` panics on `wasm32-unknown-unknown`, so
//! anything that stamps identifiers with the current time goes through
//! [`now`].

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current system time.
#[cfg(not(target_arch = "wasm32"))]
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Returns the current system time.
#[cfg(target_arch = "wasm32")]
pub fn now() -> SystemTime {
    use web_time::web::SystemTimeExt;
    web_time::SystemTime::now().to_std()
}

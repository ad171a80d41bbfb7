//! Time-related abstractions.
//!
//! Sleeping and deadlines go through `tokio::time`, so tests that pause the
//! Tokio clock (`#[tokio::test(start_paused = true)]`) control every timer in
//! the workspace. Use [`now`] instead of `std::time::Instant::now()` for the
//! same reason.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, timeout, Interval, Sleep, Timeout};

/// Current monotonic instant as seen by the Tokio clock.
///
/// Honors a paused/advanced test clock when one is active.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Sleeps until `deadline` on the Tokio clock.
pub async fn sleep_until(deadline: Instant) {
    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
}

/// Returns the current time as milliseconds since UNIX_EPOCH.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

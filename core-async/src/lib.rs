//! Runtime abstraction layer for the playback core.
//!
//! All core-* crates spawn, sleep and synchronize through this crate instead
//! of naming Tokio directly, and receive their timers through the injectable
//! [`scheduler`] module so that time-driven logic can be tested on a fake
//! clock.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, deadlines and the Tokio-aware `now()`
//! - `sync`: Channels, locks and cancellation tokens
//! - `runtime`: Runtime construction for host entry points
//! - `scheduler`: One-shot timers delivered onto a serial queue
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod time;

pub use scheduler::{Fired, ManualScheduler, Scheduler, TimerId, TokioScheduler};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};

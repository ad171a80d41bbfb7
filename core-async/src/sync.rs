//! Synchronization primitives.
//!
//! Async-aware primitives come from `tokio::sync`; cooperative cancellation
//! uses `tokio_util`'s [`CancellationToken`].

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
pub use tokio_util::sync::{CancellationToken, DropGuard};

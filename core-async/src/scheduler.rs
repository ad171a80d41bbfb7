//! Injectable one-shot timer scheduling.
//!
//! Components that need deferred work (periodic polling, "fire at deadline"
//! actions) never spawn sleeping tasks themselves. They receive an
//! `Arc<dyn Scheduler<T>>` at construction and ask it to deliver a payload
//! `T` after a delay. Delivery is always *posted*: the scheduler hands a
//! [`Fired`] value back to whoever owns the serial event queue, and the queue
//! owner dispatches it. Nothing runs inside the timer itself.
//!
//! Two implementations are provided:
//!
//! - [`TokioScheduler`]: real timers on the Tokio clock. Each fired timer is
//!   passed to a `post` callback (usually an `mpsc` send onto the queue).
//! - [`ManualScheduler`]: a fake clock for deterministic tests. Time only moves
//!   when the test advances it, and due timers are popped one at a time.
//!
//! ## Cancellation race
//!
//! A timer can fire and be posted while the queue is busy, and then be
//! cancelled by the very command the queue is processing. To make such
//! in-flight deliveries harmless, consumers call [`Scheduler::acknowledge`]
//! before acting on a [`Fired`] value; it returns `false` for timers that were
//! cancelled after firing.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identity of one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A timer that reached its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub id: TimerId,
    pub deadline: Instant,
    pub payload: T,
}

/// Scheduling context injected into time-driven components.
pub trait Scheduler<T>: Send + Sync {
    /// Current instant on this scheduler's clock.
    fn now(&self) -> Instant;

    /// Deliver `payload` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, payload: T) -> TimerId;

    /// Cancel a pending (or fired but unacknowledged) timer.
    ///
    /// Returns `false` if the timer was unknown or already acknowledged.
    fn cancel(&self, id: TimerId) -> bool;

    /// Claim a fired timer before acting on it.
    ///
    /// Returns `false` if the timer was cancelled after it fired.
    fn acknowledge(&self, id: TimerId) -> bool;

    /// Number of timers that are scheduled or fired-but-unacknowledged.
    fn pending(&self) -> usize;
}

// ============================================================================
// Tokio-backed scheduler
// ============================================================================

type PostFn<T> = Arc<dyn Fn(Fired<T>) + Send + Sync>;

/// Real-time scheduler backed by Tokio timers.
pub struct TokioScheduler<T> {
    runtime: Handle,
    post: PostFn<T>,
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl<T: Send + 'static> TokioScheduler<T> {
    /// Create a scheduler on the current Tokio runtime.
    ///
    /// `post` is invoked from a timer task for every deadline reached; it must
    /// only enqueue the value, never process it.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime context.
    pub fn new<F>(post: F) -> Self
    where
        F: Fn(Fired<T>) + Send + Sync + 'static,
    {
        Self::with_handle(Handle::current(), post)
    }

    /// Create a scheduler that spawns its timers on `runtime`.
    pub fn with_handle<F>(runtime: Handle, post: F) -> Self
    where
        F: Fn(Fired<T>) + Send + Sync + 'static,
    {
        Self {
            runtime,
            post: Arc::new(post),
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> for TokioScheduler<T> {
    fn now(&self) -> Instant {
        crate::time::now()
    }

    fn schedule(&self, delay: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = self.now() + delay;
        let post = Arc::clone(&self.post);

        // Hold the lock across spawn + insert so an immediate fire can never
        // be acknowledged before it is registered.
        let mut timers = self.timers.lock();
        let handle = self.runtime.spawn(async move {
            crate::time::sleep_until(deadline).await;
            post(Fired {
                id,
                deadline,
                payload,
            });
        });
        timers.insert(id, handle);
        trace!(timer = %id, delay_ms = delay.as_millis() as u64, "timer scheduled");
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.timers.lock().remove(&id) {
            Some(handle) => {
                handle.abort();
                trace!(timer = %id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    fn acknowledge(&self, id: TimerId) -> bool {
        self.timers.lock().remove(&id).is_some()
    }

    fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl<T> Drop for TokioScheduler<T> {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
    }
}

impl<T> fmt::Debug for TokioScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.timers.lock().len())
            .finish()
    }
}

// ============================================================================
// Manual (fake clock) scheduler
// ============================================================================

struct ManualState<T> {
    now: Instant,
    next_id: u64,
    queue: BTreeMap<(Instant, u64), T>,
    deadlines: HashMap<u64, Instant>,
    in_flight: HashSet<u64>,
}

/// Deterministic scheduler driven by an explicit fake clock.
///
/// ```
/// use core_async::scheduler::{ManualScheduler, Scheduler};
/// use std::time::Duration;
///
/// let scheduler = ManualScheduler::new();
/// scheduler.schedule(Duration::from_millis(250), "tick");
///
/// let until = scheduler.now() + Duration::from_millis(300);
/// let fired = scheduler.pop_due(until).unwrap();
/// assert!(scheduler.acknowledge(fired.id));
/// assert_eq!(fired.payload, "tick");
/// ```
pub struct ManualScheduler<T> {
    state: Mutex<ManualState<T>>,
}

impl<T> ManualScheduler<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                next_id: 1,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Timers scheduled while handling the result are visible
    /// to the next call, so a loop over `pop_due` drives repeating timers.
    pub fn pop_due(&self, until: Instant) -> Option<Fired<T>> {
        let mut state = self.state.lock();
        let (&(deadline, raw), _) = state.queue.iter().next()?;
        if deadline > until {
            return None;
        }
        let payload = state.queue.remove(&(deadline, raw))?;
        state.deadlines.remove(&raw);
        state.in_flight.insert(raw);
        if deadline > state.now {
            state.now = deadline;
        }
        Some(Fired {
            id: TimerId(raw),
            deadline,
            payload,
        })
    }

    /// Move the clock forward to `at` without firing anything.
    /// Moving backwards is ignored.
    pub fn set_now(&self, at: Instant) {
        let mut state = self.state.lock();
        if at > state.now {
            state.now = at;
        }
    }

    /// Deadline of the earliest scheduled timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().queue.keys().next().map(|(at, _)| *at)
    }

    /// Whether `id` is still waiting for its deadline.
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.state.lock().deadlines.contains_key(&id.0)
    }
}

impl<T> Default for ManualScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Scheduler<T> for ManualScheduler<T> {
    fn now(&self) -> Instant {
        self.state.lock().now
    }

    fn schedule(&self, delay: Duration, payload: T) -> TimerId {
        let mut state = self.state.lock();
        let raw = state.next_id;
        state.next_id += 1;
        let deadline = state.now + delay;
        state.queue.insert((deadline, raw), payload);
        state.deadlines.insert(raw, deadline);
        TimerId(raw)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&id.0) {
            state.queue.remove(&(deadline, id.0));
            return true;
        }
        state.in_flight.remove(&id.0)
    }

    fn acknowledge(&self, id: TimerId) -> bool {
        self.state.lock().in_flight.remove(&id.0)
    }

    fn pending(&self) -> usize {
        let state = self.state.lock();
        state.queue.len() + state.in_flight.len()
    }
}

impl<T> fmt::Debug for ManualScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("scheduled", &state.queue.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

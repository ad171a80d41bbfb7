//! One-shot "pause at endpoint" deadline.
//!
//! At most one endpoint is armed per controller. Arming always cancels the
//! previous one, so of two quick `play()` calls only the second deadline
//! survives. The timer payload names the controller by registry key only.

use crate::types::{ControllerKey, TimerTask};
use core_async::scheduler::{Scheduler, TimerId};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedEndpoint {
    timer: TimerId,
    armed_at: Instant,
    fire_at: Instant,
}

#[derive(Debug, Default)]
pub struct EndpointScheduler {
    armed: Option<ArmedEndpoint>,
}

impl EndpointScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a deadline `remaining` from now, replacing any armed one.
    pub fn arm(
        &mut self,
        scheduler: &dyn Scheduler<TimerTask>,
        controller: ControllerKey,
        remaining: Duration,
    ) {
        self.cancel(scheduler);
        let armed_at = scheduler.now();
        let timer = scheduler.schedule(remaining, TimerTask::Endpoint { controller });
        trace!(%controller, timer = %timer, remaining_ms = remaining.as_millis() as u64, "endpoint armed");
        self.armed = Some(ArmedEndpoint {
            timer,
            armed_at,
            fire_at: armed_at + remaining,
        });
    }

    /// Cancel the armed deadline. Idempotent.
    pub fn cancel(&mut self, scheduler: &dyn Scheduler<TimerTask>) -> bool {
        match self.armed.take() {
            Some(armed) => {
                scheduler.cancel(armed.timer);
                trace!(timer = %armed.timer, "endpoint cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume the armed deadline if `fired` is its timer.
    pub fn take_fired(&mut self, fired: TimerId) -> bool {
        match self.armed {
            Some(armed) if armed.timer == fired => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed_at(&self) -> Option<Instant> {
        self.armed.map(|armed| armed.armed_at)
    }

    pub fn fire_at(&self) -> Option<Instant> {
        self.armed.map(|armed| armed.fire_at)
    }
}

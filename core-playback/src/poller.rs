//! Periodic position reporting.
//!
//! The poller owns one repeating timer. Every tick re-arms the timer first
//! and only then samples the decoder, so a failing read never breaks the
//! cadence. Sampling yields a position only while the active decoder is
//! playing; paused or ended decoders keep the timer warm without emitting.

use crate::decoder::DecoderHandle;
use crate::types::{ControllerKey, DecoderState, TimerTask};
use core_async::scheduler::{Scheduler, TimerId};
use std::time::Duration;
use tracing::warn;

#[derive(Debug)]
pub struct PositionPoller {
    interval: Duration,
    timer: Option<TimerId>,
}

impl PositionPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Arm the first tick. No-op when already running.
    pub fn start(&mut self, scheduler: &dyn Scheduler<TimerTask>, controller: ControllerKey) {
        if self.timer.is_none() {
            self.timer = Some(scheduler.schedule(self.interval, TimerTask::PositionTick { controller }));
        }
    }

    /// Handle a fired tick: re-arm and return `true`, or return `false` for
    /// a timer this poller no longer owns.
    pub fn on_tick(
        &mut self,
        fired: TimerId,
        scheduler: &dyn Scheduler<TimerTask>,
        controller: ControllerKey,
    ) -> bool {
        if self.timer != Some(fired) {
            return false;
        }
        self.timer = Some(scheduler.schedule(self.interval, TimerTask::PositionTick { controller }));
        true
    }

    pub fn cancel(&mut self, scheduler: &dyn Scheduler<TimerTask>) {
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
        }
    }

    /// Position in seconds to report for `active`, if it is playing.
    pub fn sample(active: &DecoderHandle) -> Option<f64> {
        if active.state() != DecoderState::Playing || !active.is_playing() {
            return None;
        }
        match active.position_ms() {
            Ok(ms) => Some(ms as f64 / 1000.0),
            Err(err) => {
                warn!(decoder = %active.id(), error = %err, "position read failed");
                None
            }
        }
    }
}

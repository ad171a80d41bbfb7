//! # Playback Controller
//!
//! State machine for one track: one active decoder, an optional staged
//! successor, the position poller and the endpoint deadline.
//!
//! The controller is synchronous and lock-free. It must be driven from a
//! single serial queue: caller commands, decoder signals (re-posted by the
//! listener, never invoked in place) and fired timers are applied one at a
//! time in arrival order. [`ControllerRegistry`](crate::registry::ControllerRegistry)
//! and the `core-service` actor provide that queue.
//!
//! ## Gapless swap
//!
//! ```text
//! active ──Completed──▶ successor Ready? ──yes──▶ promote (volume, start if looping)
//!                                  │                dispose old, report, prime next
//!                                  └──no───▶ Ended + Completion
//! ```
//!
//! When the platform chained the successor natively, the promotion only
//! records the start the platform already made, and only if the chained
//! decoder is the very one being promoted.

use crate::config::ControllerConfig;
use crate::decoder::DecoderHandle;
use crate::endpoint::EndpointScheduler;
use crate::error::{PlaybackError, Result};
use crate::poller::PositionPoller;
use crate::successor::GaplessSuccessor;
use crate::types::{AudioId, ControllerKey, DecoderState, Endpoint, TimerTask, Track, Volume};
use bridge_traits::decoder::{DecoderFactory, DecoderId, DecoderListener, DecoderSignal};
use bridge_traits::error::BridgeError;
use core_async::scheduler::{Scheduler, TimerId};
use core_runtime::events::{ErrorCode, EventSink, PlayerEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Collaborators injected into every controller.
#[derive(Clone)]
pub struct ControllerContext {
    pub decoder_factory: Arc<dyn DecoderFactory>,
    /// Receives this controller's decoder signals and re-posts them to the
    /// queue.
    pub listener: Arc<dyn DecoderListener>,
    pub scheduler: Arc<dyn Scheduler<TimerTask>>,
    pub events: Arc<dyn EventSink>,
    pub config: ControllerConfig,
}

/// Which of the controller's decoders a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Active,
    Successor,
}

pub struct PlaybackController {
    key: ControllerKey,
    track: Track,
    ctx: ControllerContext,
    /// `None` only after release.
    active: Option<DecoderHandle>,
    successor: GaplessSuccessor,
    poller: PositionPoller,
    endpoint: EndpointScheduler,
    volume: Volume,
    swaps: u64,
}

impl PlaybackController {
    /// Create the active decoder, start polling and, for gapless tracks,
    /// prime the first successor.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidConfig`] or
    /// [`PlaybackError::DecoderCreateFailed`]. A failing eager preparation
    /// is reported as an event instead.
    pub fn new(key: ControllerKey, track: Track, ctx: ControllerContext) -> Result<Self> {
        ctx.config.validate()?;

        let active = DecoderHandle::create(
            ctx.decoder_factory.as_ref(),
            track.source(),
            Arc::clone(&ctx.listener),
        )
        .map_err(PlaybackError::DecoderCreateFailed)?;

        let mut controller = Self {
            key,
            poller: PositionPoller::new(ctx.config.poll_interval),
            endpoint: EndpointScheduler::new(),
            successor: GaplessSuccessor::new(),
            active: Some(active),
            volume: Volume::default(),
            swaps: 0,
            track,
            ctx,
        };

        if controller.ctx.config.eager_prepare {
            controller.prepare_active();
        }
        controller
            .poller
            .start(controller.ctx.scheduler.as_ref(), controller.key);
        controller.prime_successor();

        info!(
            audio_id = %controller.track.audio_id(),
            controller = %key,
            loop_mode = ?controller.track.loop_mode(),
            gapless = controller.track.options().gapless,
            "controller created"
        );
        Ok(controller)
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn key(&self) -> ControllerKey {
        self.key
    }

    pub fn audio_id(&self) -> &AudioId {
        self.track.audio_id()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn is_released(&self) -> bool {
        self.active.is_none()
    }

    /// State of the active decoder, `Released` after release.
    pub fn state(&self) -> DecoderState {
        self.active
            .as_ref()
            .map_or(DecoderState::Released, DecoderHandle::state)
    }

    pub fn active_decoder_id(&self) -> Option<DecoderId> {
        self.active.as_ref().map(DecoderHandle::id)
    }

    pub fn successor_decoder_id(&self) -> Option<DecoderId> {
        self.successor.id()
    }

    pub fn successor_state(&self) -> Option<DecoderState> {
        self.successor.state()
    }

    /// Last volume set; applied to every decoder this controller installs.
    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Number of successor promotions so far.
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    /// When the armed endpoint will fire.
    pub fn endpoint_deadline(&self) -> Option<Instant> {
        self.endpoint.fire_at()
    }

    /// Duration of the active decoder, `None` until known.
    pub fn duration_seconds(&self) -> Result<Option<f64>> {
        let active = self.live()?;
        Ok(active.duration_ms().map(|ms| ms as f64 / 1000.0))
    }

    pub fn position_seconds(&self) -> Result<f64> {
        let active = self.live()?;
        let ms = active.position_ms()?;
        Ok(ms as f64 / 1000.0)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start or resume playback, optionally from the start, until
    /// `endpoint`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidEndpoint`] if a finite endpoint is not after
    /// the effective start position; nothing changes in that case.
    pub fn play(&mut self, from_start: bool, endpoint: Endpoint) -> Result<()> {
        let remaining = self.remaining_until(from_start, endpoint)?;

        let scheduler = Arc::clone(&self.ctx.scheduler);
        self.endpoint.cancel(scheduler.as_ref());

        let Some(active) = self.active.as_mut() else {
            return Err(self.released_error());
        };
        let state = active.state();
        let mut failure = None;

        if (from_start || state == DecoderState::Ended) && state.is_prepared() {
            if let Err(err) = active.seek_to(0, true) {
                failure = Some((ErrorCode::DecoderRuntimeError, err));
            }
        }

        let started = match active.state() {
            DecoderState::Idle => match active.prepare() {
                Ok(()) => {
                    active.defer_start();
                    true
                }
                Err(err) => {
                    failure = Some((ErrorCode::DecoderPrepareFailed, err));
                    false
                }
            },
            DecoderState::Preparing => {
                active.defer_start();
                true
            }
            _ => match active.start() {
                Ok(()) => true,
                Err(err) => {
                    failure = Some((ErrorCode::DecoderRuntimeError, err));
                    false
                }
            },
        };
        debug!(
            audio_id = %self.track.audio_id(),
            from_start,
            endpoint_ms = endpoint.to_wire(),
            deferred = active.start_deferred(),
            "play"
        );

        if let Some((code, err)) = failure {
            self.report_bridge(code, &err);
        }
        if let (true, Some(remaining)) = (started, remaining) {
            self.endpoint.arm(scheduler.as_ref(), self.key, remaining);
        }
        Ok(())
    }

    /// Pause in place. The poller keeps running; the endpoint is disarmed.
    pub fn pause(&mut self) -> Result<()> {
        self.live()?;
        self.endpoint.cancel(self.ctx.scheduler.as_ref());

        let result = match self.active.as_mut() {
            Some(active) => active.pause(),
            None => Ok(()),
        };
        debug!(audio_id = %self.track.audio_id(), "pause");
        if let Err(err) = result {
            self.report_bridge(ErrorCode::DecoderRuntimeError, &err);
        }
        Ok(())
    }

    /// Seek the active decoder. Negative positions clamp to zero.
    pub fn seek(&mut self, position_seconds: f64) -> Result<()> {
        self.live()?;
        if !position_seconds.is_finite() {
            return Err(PlaybackError::InvalidSeekPosition(position_seconds));
        }
        let position_ms = (position_seconds.max(0.0) * 1000.0).round() as u64;

        let result = match self.active.as_mut() {
            Some(active) => active.seek_to(position_ms, false),
            None => Ok(()),
        };
        debug!(audio_id = %self.track.audio_id(), position_ms, "seek");
        if let Err(err) = result {
            self.report_bridge(ErrorCode::DecoderRuntimeError, &err);
        }
        Ok(())
    }

    /// Store the sticky volume and apply it to the active and staged
    /// decoders.
    pub fn set_volume(&mut self, value: f64) -> Result<()> {
        self.live()?;
        let volume = Volume::new(value)?;
        self.volume = volume;

        let mut failures = Vec::new();
        if let Some(active) = self.active.as_mut() {
            if let Err(err) = active.set_volume(volume.as_gain()) {
                failures.push(err);
            }
        }
        if let Some(successor) = self.successor.handle_mut() {
            if let Err(err) = successor.set_volume(volume.as_gain()) {
                failures.push(err);
            }
        }
        for err in &failures {
            self.report_bridge(ErrorCode::DecoderRuntimeError, err);
        }
        Ok(())
    }

    /// Cancel every timer and dispose both decoders. Terminal.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::AlreadyReleased`] on a second call; nothing is
    /// disposed twice.
    pub fn release(&mut self) -> Result<()> {
        self.live()?;
        let scheduler = self.ctx.scheduler.as_ref();
        self.poller.cancel(scheduler);
        self.endpoint.cancel(scheduler);

        self.successor.discard(self.active.as_mut());
        if let Some(mut active) = self.active.take() {
            active.dispose();
        }
        info!(audio_id = %self.track.audio_id(), swaps = self.swaps, "controller released");
        Ok(())
    }

    // ========================================================================
    // Queue input
    // ========================================================================

    /// Apply a decoder signal. Signals from decoders this controller no
    /// longer owns are dropped.
    pub fn handle_signal(&mut self, signal: DecoderSignal) {
        let Some(role) = self.role_of(signal.decoder()) else {
            debug!(
                audio_id = %self.track.audio_id(),
                decoder = %signal.decoder(),
                signal = signal.kind(),
                "ignoring signal from stale decoder"
            );
            return;
        };

        match (role, signal) {
            (Role::Active, DecoderSignal::Prepared { .. }) => self.on_active_prepared(),
            (Role::Active, DecoderSignal::Completed { decoder }) => {
                if self.completion_is_stale() {
                    debug!(
                        audio_id = %self.track.audio_id(),
                        %decoder,
                        state = %self.state(),
                        "ignoring completion overtaken by a later command"
                    );
                    return;
                }
                self.on_active_completed()
            }
            (Role::Active, DecoderSignal::SeekComplete { .. }) => self.on_active_seek_complete(),
            (Role::Active, DecoderSignal::Error { code, message, .. }) => {
                self.on_active_error(code, message)
            }
            (Role::Successor, DecoderSignal::Prepared { .. }) => self.on_successor_prepared(),
            (Role::Successor, DecoderSignal::SeekComplete { .. }) => {
                if let Some(successor) = self.successor.handle_mut() {
                    successor.take_internal_seek();
                }
            }
            (Role::Successor, DecoderSignal::Error { code, message, .. }) => {
                self.on_successor_error(code, message)
            }
            (Role::Successor, DecoderSignal::Completed { decoder }) => {
                warn!(%decoder, "staged successor reported completion");
            }
        }
    }

    /// Apply a fired timer. Timers this controller no longer owns are
    /// dropped.
    pub fn handle_timer(&mut self, timer: TimerId, task: TimerTask) {
        if self.is_released() {
            return;
        }
        match task {
            TimerTask::PositionTick { .. } => {
                if !self.poller.on_tick(timer, self.ctx.scheduler.as_ref(), self.key) {
                    return;
                }
                let position = self.active.as_ref().and_then(PositionPoller::sample);
                if let Some(position_seconds) = position {
                    self.emit(PlayerEvent::Position {
                        audio_id: self.track.audio_id().to_string(),
                        position_seconds,
                    });
                }
            }
            TimerTask::Endpoint { .. } => {
                if !self.endpoint.take_fired(timer) {
                    debug!(timer = %timer, "ignoring superseded endpoint");
                    return;
                }
                info!(audio_id = %self.track.audio_id(), "endpoint reached");
                let result = match self.active.as_mut() {
                    Some(active) => active.pause(),
                    None => Ok(()),
                };
                if let Err(err) = result {
                    self.report_bridge(ErrorCode::DecoderRuntimeError, &err);
                }
                self.emit_completion();
            }
        }
    }

    // ========================================================================
    // Signal handlers
    // ========================================================================

    fn on_active_prepared(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.mark_prepared() {
            debug!(decoder = %active.id(), "duplicate prepared signal");
            return;
        }
        debug!(decoder = %active.id(), deferred = active.start_deferred(), "active prepared");
        if active.start_deferred() {
            if let Err(err) = active.start() {
                self.report_bridge(ErrorCode::DecoderRuntimeError, &err);
            }
        }
    }

    fn on_active_seek_complete(&mut self) {
        let internal = self
            .active
            .as_mut()
            .is_some_and(DecoderHandle::take_internal_seek);
        if !internal {
            self.emit(PlayerEvent::SeekComplete {
                audio_id: self.track.audio_id().to_string(),
            });
        }
    }

    fn on_active_error(&mut self, code: i32, message: String) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.state() == DecoderState::Preparing {
            active.mark_prepare_failed();
            self.endpoint.cancel(self.ctx.scheduler.as_ref());
            self.report(ErrorCode::DecoderPrepareFailed, code, message);
        } else {
            self.report(ErrorCode::DecoderRuntimeError, code, message);
        }
    }

    fn on_active_completed(&mut self) {
        let loop_mode = self.track.loop_mode();

        let Some(mut next) = self.successor.take_ready() else {
            self.on_completed_without_successor();
            return;
        };
        let Some(mut old) = self.active.take() else {
            return;
        };

        let natively_started = old.chained_to() == Some(next.id());
        let mut failures = Vec::new();
        if let Err(err) = next.set_volume(self.volume.as_gain()) {
            failures.push(err);
        }
        if natively_started {
            next.mark_started();
        } else if loop_mode.looping() {
            if let Err(err) = next.start() {
                failures.push(err);
            }
        }

        info!(
            audio_id = %self.track.audio_id(),
            from = %old.id(),
            to = %next.id(),
            natively_started,
            "successor promoted"
        );
        self.active = Some(next);
        old.dispose();
        self.swaps += 1;

        for err in &failures {
            self.report_bridge(ErrorCode::DecoderRuntimeError, err);
        }
        if !loop_mode.looping() {
            self.endpoint.cancel(self.ctx.scheduler.as_ref());
        }
        if loop_mode.reports_completion() {
            self.emit_completion();
        }
        self.prime_successor();
    }

    fn on_completed_without_successor(&mut self) {
        let loop_mode = self.track.loop_mode();
        let gapless = self.track.options().gapless;
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if loop_mode.looping() && !gapless {
            // Non-gapless loop: rewind and restart the same decoder.
            let result = active
                .seek_to(0, true)
                .and_then(|()| active.start());
            if let Err(err) = result {
                self.report_bridge(ErrorCode::DecoderRuntimeError, &err);
            }
            if loop_mode.reports_completion() {
                self.emit_completion();
            }
            return;
        }

        if gapless {
            warn!(
                audio_id = %self.track.audio_id(),
                successor = ?self.successor.state(),
                "natural end before successor was ready"
            );
        }
        active.mark_ended();
        self.endpoint.cancel(self.ctx.scheduler.as_ref());
        self.emit_completion();
    }

    fn on_successor_prepared(&mut self) {
        let chain = self.track.loop_mode().looping();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if let Err(err) = self.successor.on_prepared(active, chain) {
            self.report_error(&err);
        }
    }

    fn on_successor_error(&mut self, code: i32, message: String) {
        let state = self.successor.discard(self.active.as_mut());
        let kind = if state == Some(DecoderState::Preparing) {
            ErrorCode::DecoderPrepareFailed
        } else {
            ErrorCode::DecoderRuntimeError
        };
        self.report(kind, code, message);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn prepare_active(&mut self) {
        let result = match self.active.as_mut() {
            Some(active) => active.prepare(),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.report_bridge(ErrorCode::DecoderPrepareFailed, &err);
        }
    }

    fn prime_successor(&mut self) {
        if !self.track.options().gapless {
            return;
        }
        let result = self.successor.prime(
            self.ctx.decoder_factory.as_ref(),
            self.track.source(),
            Arc::clone(&self.ctx.listener),
            self.volume,
            self.active.as_mut(),
        );
        if let Err(err) = result {
            self.report_error(&err);
        }
    }

    /// Effective remaining time for a finite endpoint, validated before any
    /// side effect.
    fn remaining_until(&self, from_start: bool, endpoint: Endpoint) -> Result<Option<Duration>> {
        let active = self.live()?;
        let Endpoint::At(end) = endpoint else {
            return Ok(None);
        };

        let state = active.state();
        let position_ms = if from_start || !state.is_prepared() || state == DecoderState::Ended {
            0
        } else {
            active.position_ms().unwrap_or_else(|err| {
                warn!(decoder = %active.id(), error = %err, "position read failed, assuming 0");
                0
            })
        };

        let endpoint_ms = end.as_millis() as u64;
        if endpoint_ms <= position_ms {
            warn!(
                audio_id = %self.track.audio_id(),
                endpoint_ms,
                position_ms,
                "endpoint not after current position, no playback"
            );
            return Err(PlaybackError::InvalidEndpoint {
                endpoint_ms,
                position_ms,
            });
        }
        Ok(Some(Duration::from_millis(endpoint_ms - position_ms)))
    }

    /// A natural end only counts while the active decoder is playing the
    /// stretch that ended. A pause, an earlier end, or a rewind issued after
    /// the decoder posted the signal all make it stale.
    fn completion_is_stale(&self) -> bool {
        self.active.as_ref().map_or(true, |active| {
            active.state() != DecoderState::Playing || active.internal_seek_pending()
        })
    }

    fn role_of(&self, decoder: DecoderId) -> Option<Role> {
        if self.active_decoder_id() == Some(decoder) {
            Some(Role::Active)
        } else if self.successor.id() == Some(decoder) {
            Some(Role::Successor)
        } else {
            None
        }
    }

    fn live(&self) -> Result<&DecoderHandle> {
        self.active.as_ref().ok_or_else(|| self.released_error())
    }

    fn released_error(&self) -> PlaybackError {
        PlaybackError::AlreadyReleased(self.track.audio_id().clone())
    }

    fn emit(&self, event: PlayerEvent) {
        self.ctx.events.emit(event);
    }

    fn emit_completion(&self) {
        debug!(audio_id = %self.track.audio_id(), "completion");
        self.emit(PlayerEvent::Completion {
            audio_id: self.track.audio_id().to_string(),
        });
    }

    fn report(&self, code: ErrorCode, native_code: i32, message: String) {
        error!(
            audio_id = %self.track.audio_id(),
            code = %code,
            native_code,
            message = %message,
            "decoder error"
        );
        self.emit(PlayerEvent::Error {
            audio_id: self.track.audio_id().to_string(),
            code,
            native_code,
            message,
        });
    }

    fn report_bridge(&self, code: ErrorCode, err: &BridgeError) {
        self.report(code, err.code(), err.to_string());
    }

    fn report_error(&self, err: &PlaybackError) {
        let code = err.event_code().unwrap_or(ErrorCode::DecoderRuntimeError);
        self.report(code, err.native_code(), err.to_string());
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if !self.is_released() {
            let _ = self.release();
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("key", &self.key)
            .field("audio_id", self.track.audio_id())
            .field("active", &self.active)
            .field("successor", &self.successor)
            .field("volume", &self.volume)
            .field("swaps", &self.swaps)
            .finish()
    }
}

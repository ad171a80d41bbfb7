//! Controller-side wrapper around one platform decoder.
//!
//! [`DecoderHandle`] tracks the lifecycle state the platform does not expose
//! directly, remembers which seeks the controller issued for itself, and
//! guarantees that the underlying decoder is disposed exactly once.

use crate::types::DecoderState;
use bridge_traits::decoder::{AudioSource, Decoder, DecoderFactory, DecoderId, DecoderListener};
use bridge_traits::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct DecoderHandle {
    id: DecoderId,
    decoder: Box<dyn Decoder>,
    state: DecoderState,
    /// Seeks issued by the controller whose completion must not reach the
    /// caller.
    internal_seeks: u32,
    /// `play()` arrived while preparing; start once prepared.
    start_when_ready: bool,
    /// Decoder the platform will start natively at our natural end.
    chained_to: Option<DecoderId>,
    disposed: bool,
}

impl DecoderHandle {
    /// Create an idle decoder for `source` through the platform factory.
    pub fn create(
        factory: &dyn DecoderFactory,
        source: &AudioSource,
        listener: Arc<dyn DecoderListener>,
    ) -> Result<Self> {
        let id = DecoderId::next();
        let decoder = factory.create(id, source, listener)?;
        debug!(decoder = %id, source = %source.describe(), "decoder created");
        Ok(Self::from_parts(id, decoder))
    }

    /// Wrap an already created decoder.
    pub fn from_parts(id: DecoderId, decoder: Box<dyn Decoder>) -> Self {
        Self {
            id,
            decoder,
            state: DecoderState::Idle,
            internal_seeks: 0,
            start_when_ready: false,
            chained_to: None,
            disposed: false,
        }
    }

    pub fn id(&self) -> DecoderId {
        self.id
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn transition(&mut self, next: DecoderState) {
        if self.state != next {
            trace!(decoder = %self.id, from = %self.state, to = %next, "decoder state");
            self.state = next;
        }
    }

    /// Request asynchronous preparation. The state only changes if the
    /// platform accepted the request.
    pub fn prepare(&mut self) -> Result<()> {
        self.decoder.prepare()?;
        self.transition(DecoderState::Preparing);
        Ok(())
    }

    /// Record a `Prepared` signal. Returns `false` if the handle was not
    /// preparing.
    pub fn mark_prepared(&mut self) -> bool {
        if self.state != DecoderState::Preparing {
            return false;
        }
        self.transition(DecoderState::Ready);
        true
    }

    /// Return to `Idle` after a failed preparation.
    pub fn mark_prepare_failed(&mut self) {
        self.start_when_ready = false;
        self.transition(DecoderState::Idle);
    }

    pub fn start(&mut self) -> Result<()> {
        self.start_when_ready = false;
        self.decoder.start()?;
        self.transition(DecoderState::Playing);
        Ok(())
    }

    /// Record that the platform started this decoder itself (native
    /// chaining).
    pub fn mark_started(&mut self) {
        self.start_when_ready = false;
        self.transition(DecoderState::Playing);
    }

    /// Pause if playing and drop any deferred start.
    pub fn pause(&mut self) -> Result<()> {
        self.start_when_ready = false;
        if self.state == DecoderState::Playing {
            self.decoder.pause()?;
            self.transition(DecoderState::Paused);
        }
        Ok(())
    }

    pub fn defer_start(&mut self) {
        self.start_when_ready = true;
    }

    pub fn start_deferred(&self) -> bool {
        self.start_when_ready
    }

    /// Seek to `position_ms`. Internal seeks have their completion signal
    /// swallowed by [`take_internal_seek`](Self::take_internal_seek).
    pub fn seek_to(&mut self, position_ms: u64, internal: bool) -> Result<()> {
        self.decoder.seek_to(position_ms)?;
        if internal {
            self.internal_seeks += 1;
        }
        // A rewound decoder is no longer at its end.
        if self.state == DecoderState::Ended {
            self.transition(DecoderState::Paused);
        }
        Ok(())
    }

    /// Consume one outstanding internal seek, if any.
    pub fn take_internal_seek(&mut self) -> bool {
        if self.internal_seeks == 0 {
            return false;
        }
        self.internal_seeks -= 1;
        true
    }

    /// Whether a seek the controller issued for itself has not completed
    /// yet.
    pub fn internal_seek_pending(&self) -> bool {
        self.internal_seeks > 0
    }

    pub fn mark_ended(&mut self) {
        self.start_when_ready = false;
        self.transition(DecoderState::Ended);
    }

    pub fn set_volume(&mut self, gain: f32) -> Result<()> {
        self.decoder.set_volume(gain)
    }

    pub fn position_ms(&self) -> Result<u64> {
        self.decoder.current_position_ms()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.decoder.duration_ms()
    }

    pub fn is_playing(&self) -> bool {
        self.decoder.is_playing()
    }

    /// Ask the platform to start `next` at our natural end, or clear the
    /// request with `None`. Returns whether native chaining is in effect.
    pub fn chain_next(&mut self, next: Option<DecoderId>) -> Result<bool> {
        let accepted = self.decoder.chain_next(next)?;
        self.chained_to = if accepted { next } else { None };
        Ok(accepted)
    }

    pub fn chained_to(&self) -> Option<DecoderId> {
        self.chained_to
    }

    /// Release the platform decoder. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.decoder.dispose();
        self.transition(DecoderState::Released);
        debug!(decoder = %self.id, "decoder disposed");
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("internal_seeks", &self.internal_seeks)
            .field("start_when_ready", &self.start_when_ready)
            .field("chained_to", &self.chained_to)
            .finish()
    }
}

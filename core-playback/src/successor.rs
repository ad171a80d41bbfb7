//! Gapless successor slot.
//!
//! Holds at most one pre-staged decoder for the same source as the active
//! one. Priming creates the decoder, applies the controller's sticky volume
//! and requests preparation. When the `Prepared` signal for *this* decoder
//! arrives, it is rewound to zero, offered to the active decoder for native
//! chaining, and marked ready for promotion.
//!
//! A new priming request always disposes the previous occupant first and
//! withdraws it from the active decoder's chain, so a stale decoder can never
//! be promoted over a newer one.

use crate::decoder::DecoderHandle;
use crate::error::{PlaybackError, Result};
use crate::types::{DecoderState, Volume};
use bridge_traits::decoder::{AudioSource, DecoderFactory, DecoderId, DecoderListener};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct GaplessSuccessor {
    slot: Option<DecoderHandle>,
}

impl GaplessSuccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<DecoderId> {
        self.slot.as_ref().map(DecoderHandle::id)
    }

    pub fn state(&self) -> Option<DecoderState> {
        self.slot.as_ref().map(DecoderHandle::state)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == Some(DecoderState::Ready)
    }

    pub fn handle_mut(&mut self) -> Option<&mut DecoderHandle> {
        self.slot.as_mut()
    }

    /// Stage a fresh decoder for `source`, replacing any occupant.
    pub fn prime(
        &mut self,
        factory: &dyn DecoderFactory,
        source: &AudioSource,
        listener: Arc<dyn DecoderListener>,
        volume: Volume,
        active: Option<&mut DecoderHandle>,
    ) -> Result<DecoderId> {
        self.discard(active);

        let mut handle =
            DecoderHandle::create(factory, source, listener).map_err(PlaybackError::DecoderCreateFailed)?;
        handle.set_volume(volume.as_gain())?;
        handle
            .prepare()
            .map_err(|err| PlaybackError::DecoderPrepareFailed {
                code: err.code(),
                message: err.to_string(),
            })?;

        let id = handle.id();
        debug!(decoder = %id, "successor priming");
        self.slot = Some(handle);
        Ok(id)
    }

    /// Finish priming after the staged decoder reported `Prepared`.
    ///
    /// With `chain` set the decoder is offered to `active` for native
    /// chaining. Returns whether the platform accepted the chain. On error
    /// the slot is emptied.
    pub fn on_prepared(&mut self, active: &mut DecoderHandle, chain: bool) -> Result<bool> {
        let Some(handle) = self.slot.as_mut() else {
            return Ok(false);
        };
        if !handle.mark_prepared() {
            return Ok(false);
        }

        if let Err(err) = handle.seek_to(0, true) {
            self.slot = None;
            return Err(PlaybackError::DecoderRuntimeError {
                code: err.code(),
                message: err.to_string(),
            });
        }

        let id = handle.id();
        let chained = if chain {
            match active.chain_next(Some(id)) {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(decoder = %id, error = %err, "native chaining failed, falling back to manual swap");
                    false
                }
            }
        } else {
            false
        };
        debug!(decoder = %id, chained, "successor ready");
        Ok(chained)
    }

    /// Take the staged decoder if it is ready for promotion.
    pub fn take_ready(&mut self) -> Option<DecoderHandle> {
        if self.is_ready() {
            self.slot.take()
        } else {
            None
        }
    }

    /// Dispose the staged decoder, unchaining it from `active` first.
    /// Returns the state it was in.
    pub fn discard(&mut self, active: Option<&mut DecoderHandle>) -> Option<DecoderState> {
        let mut handle = self.slot.take()?;
        let state = handle.state();
        if let Some(active) = active {
            if active.chained_to() == Some(handle.id()) {
                if let Err(err) = active.chain_next(None) {
                    warn!(decoder = %active.id(), error = %err, "failed to clear native chain");
                }
            }
        }
        handle.dispose();
        debug!(decoder = %handle.id(), from = %state, "successor discarded");
        Some(state)
    }
}

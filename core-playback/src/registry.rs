//! # Controller Registry
//!
//! Generational arena of [`PlaybackController`]s, indexed by
//! [`ControllerKey`] and by [`AudioId`].
//!
//! Timers and decoder listeners only ever hold a `ControllerKey`. Releasing a
//! controller frees its slot and bumps the slot generation, so anything that
//! still carries the old key resolves to `None` and is dropped silently, even
//! after the slot is reused.
//!
//! Released audio ids are remembered until they are loaded again, so a
//! command on a released track fails with
//! [`PlaybackError::AlreadyReleased`] rather than looking like a typo.

use crate::config::ControllerConfig;
use crate::controller::{ControllerContext, PlaybackController};
use crate::error::{PlaybackError, Result};
use crate::types::{AudioId, ControllerKey, TimerTask, Track};
use bridge_traits::decoder::{DecoderFactory, DecoderListener, DecoderSignal};
use core_async::scheduler::{Fired, Scheduler};
use core_runtime::events::EventSink;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Supplies the decoder listener for a controller.
///
/// The listener must re-post signals tagged with `key` onto the queue that
/// drives the registry; it must never call into the registry in place.
pub trait ListenerProvider: Send + Sync {
    fn listener_for(&self, key: ControllerKey) -> Arc<dyn DecoderListener>;
}

/// Collaborators shared by every controller in a registry.
#[derive(Clone)]
pub struct RegistryContext {
    pub decoder_factory: Arc<dyn DecoderFactory>,
    pub scheduler: Arc<dyn Scheduler<TimerTask>>,
    pub events: Arc<dyn EventSink>,
    pub listeners: Arc<dyn ListenerProvider>,
    pub config: ControllerConfig,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    controller: Option<PlaybackController>,
}

pub struct ControllerRegistry {
    ctx: RegistryContext,
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_audio: HashMap<AudioId, ControllerKey>,
    released: HashSet<AudioId>,
}

impl ControllerRegistry {
    pub fn new(ctx: RegistryContext) -> Result<Self> {
        ctx.config.validate()?;
        Ok(Self {
            ctx,
            slots: Vec::new(),
            free: Vec::new(),
            by_audio: HashMap::new(),
            released: HashSet::new(),
        })
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler<TimerTask>> {
        &self.ctx.scheduler
    }

    pub fn len(&self) -> usize {
        self.by_audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_audio.is_empty()
    }

    pub fn contains(&self, audio_id: &AudioId) -> bool {
        self.by_audio.contains_key(audio_id)
    }

    pub fn audio_ids(&self) -> impl Iterator<Item = &AudioId> {
        self.by_audio.keys()
    }

    /// Create a controller for `track`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::DuplicateAudioId`] if the id is already loaded, or
    /// any construction error of [`PlaybackController::new`].
    pub fn load(&mut self, track: Track) -> Result<ControllerKey> {
        if self.by_audio.contains_key(track.audio_id()) {
            return Err(PlaybackError::DuplicateAudioId(track.audio_id().clone()));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    controller: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let key = ControllerKey::new(index, self.slots[index as usize].generation);

        let ctx = ControllerContext {
            decoder_factory: Arc::clone(&self.ctx.decoder_factory),
            listener: self.ctx.listeners.listener_for(key),
            scheduler: Arc::clone(&self.ctx.scheduler),
            events: Arc::clone(&self.ctx.events),
            config: self.ctx.config.clone(),
        };
        let audio_id = track.audio_id().clone();

        match PlaybackController::new(key, track, ctx) {
            Ok(controller) => {
                self.slots[index as usize].controller = Some(controller);
                self.released.remove(&audio_id);
                self.by_audio.insert(audio_id, key);
                Ok(key)
            }
            Err(err) => {
                self.free_slot(index);
                Err(err)
            }
        }
    }

    pub fn key_of(&self, audio_id: &AudioId) -> Option<ControllerKey> {
        self.by_audio.get(audio_id).copied()
    }

    pub fn get(&self, key: ControllerKey) -> Option<&PlaybackController> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.controller.as_ref())
    }

    pub fn get_mut(&mut self, key: ControllerKey) -> Option<&mut PlaybackController> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.controller.as_mut())
    }

    /// Whether `audio_id` was released and not loaded again since.
    pub fn is_released(&self, audio_id: &AudioId) -> bool {
        self.released.contains(audio_id)
    }

    /// Controller for `audio_id`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::AlreadyReleased`] for a released id,
    /// [`PlaybackError::UnknownAudio`] for an id never loaded.
    pub fn controller(&self, audio_id: &AudioId) -> Result<&PlaybackController> {
        self.key_of(audio_id)
            .and_then(|key| self.get(key))
            .ok_or_else(|| self.missing(audio_id))
    }

    /// Mutable controller for `audio_id`. Fails like
    /// [`controller`](Self::controller).
    pub fn controller_mut(&mut self, audio_id: &AudioId) -> Result<&mut PlaybackController> {
        let Some(key) = self.key_of(audio_id) else {
            return Err(self.missing(audio_id));
        };
        self.get_mut(key)
            .ok_or_else(|| PlaybackError::UnknownAudio(audio_id.clone()))
    }

    /// Release the controller for `audio_id` and free its slot.
    pub fn release(&mut self, audio_id: &AudioId) -> Result<()> {
        let Some(key) = self.by_audio.remove(audio_id) else {
            return Err(self.missing(audio_id));
        };
        self.released.insert(audio_id.clone());
        let controller = self.slots[key.index as usize].controller.take();
        self.free_slot(key.index);

        match controller {
            Some(mut controller) => controller.release(),
            None => Ok(()),
        }
    }

    /// Release every controller. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let ids: Vec<AudioId> = self.by_audio.keys().cloned().collect();
        let released = ids
            .iter()
            .filter(|audio_id| self.release(audio_id).is_ok())
            .count();
        if released > 0 {
            info!(released, "released all controllers");
        }
        released
    }

    /// Route a fired timer to its controller.
    ///
    /// Returns `false` if the timer was cancelled after firing or its
    /// controller is gone.
    pub fn dispatch_timer(&mut self, fired: Fired<TimerTask>) -> bool {
        if !self.ctx.scheduler.acknowledge(fired.id) {
            debug!(timer = %fired.id, "dropping cancelled timer");
            return false;
        }
        let key = fired.payload.controller();
        match self.get_mut(key) {
            Some(controller) => {
                controller.handle_timer(fired.id, fired.payload);
                true
            }
            None => {
                debug!(timer = %fired.id, controller = %key, "timer for released controller");
                false
            }
        }
    }

    /// Route a decoder signal to its controller.
    pub fn dispatch_signal(&mut self, key: ControllerKey, signal: DecoderSignal) -> bool {
        match self.get_mut(key) {
            Some(controller) => {
                controller.handle_signal(signal);
                true
            }
            None => {
                debug!(controller = %key, signal = signal.kind(), "signal for released controller");
                false
            }
        }
    }

    fn missing(&self, audio_id: &AudioId) -> PlaybackError {
        if self.released.contains(audio_id) {
            PlaybackError::AlreadyReleased(audio_id.clone())
        } else {
            PlaybackError::UnknownAudio(audio_id.clone())
        }
    }

    fn free_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.controller = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("loaded", &self.by_audio.len())
            .field("released", &self.released.len())
            .field("slots", &self.slots.len())
            .field("free", &self.free.len())
            .finish()
    }
}

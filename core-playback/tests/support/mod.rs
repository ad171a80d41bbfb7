//! Deterministic test harness: fake decoders driven by the `ManualScheduler`
//! clock, a signal queue standing in for the serial event queue, and an event
//! recorder.

#![allow(dead_code)]

use bridge_traits::decoder::{AudioSource, Decoder, DecoderFactory, DecoderId, DecoderListener, DecoderSignal};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bytes::Bytes;
use core_async::scheduler::{ManualScheduler, Scheduler};
use core_playback::{
    ControllerConfig, ControllerKey, ControllerRegistry, ListenerProvider, PlaybackController,
    RegistryContext, TimerTask, Track, TrackOptions,
};
use core_runtime::events::{EventSink, PlayerEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Clock = Arc<ManualScheduler<TimerTask>>;

// ============================================================================
// Fake decoder
// ============================================================================

/// How decoders created by the [`FakeFactory`] behave.
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub duration_ms: u64,
    /// Report `Prepared` as soon as `prepare()` is called.
    pub auto_prepare: bool,
    /// Report an `Error` with this code instead of `Prepared`.
    pub fail_prepare: Option<i32>,
    pub native_chaining: bool,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            auto_prepare: true,
            fail_prepare: None,
            native_chaining: false,
        }
    }
}

struct FakeState {
    id: DecoderId,
    behavior: FakeBehavior,
    listener: Arc<dyn DecoderListener>,
    prepared: bool,
    playing: bool,
    base_ms: u64,
    started_at: Instant,
    volume: f32,
    chained: Option<DecoderId>,
    disposed: u32,
    reads_after_dispose: u32,
    calls: Vec<&'static str>,
}

impl FakeState {
    fn position_at(&self, now: Instant) -> u64 {
        if self.playing {
            let elapsed = now.saturating_duration_since(self.started_at).as_millis() as u64;
            (self.base_ms + elapsed).min(self.behavior.duration_ms)
        } else {
            self.base_ms
        }
    }

    fn natural_end(&self) -> Option<Instant> {
        if !self.playing || self.disposed > 0 {
            return None;
        }
        let left = self.behavior.duration_ms.saturating_sub(self.base_ms);
        Some(self.started_at + Duration::from_millis(left))
    }
}

pub struct FakeDecoder {
    state: Arc<Mutex<FakeState>>,
    clock: Clock,
}

impl FakeDecoder {
    fn post(&self, signal: DecoderSignal) {
        let listener = Arc::clone(&self.state.lock().listener);
        listener.on_signal(signal);
    }
}

impl Decoder for FakeDecoder {
    fn prepare(&mut self) -> BridgeResult<()> {
        let (id, behavior) = {
            let mut state = self.state.lock();
            state.calls.push("prepare");
            (state.id, state.behavior.clone())
        };
        if let Some(code) = behavior.fail_prepare {
            self.post(DecoderSignal::Error {
                decoder: id,
                code,
                message: "unsupported media".to_string(),
            });
        } else if behavior.auto_prepare {
            self.state.lock().prepared = true;
            self.post(DecoderSignal::Prepared { decoder: id });
        }
        Ok(())
    }

    fn start(&mut self) -> BridgeResult<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.calls.push("start");
        if !state.prepared {
            return Err(BridgeError::OperationFailed("start before prepare".to_string()));
        }
        if !state.playing {
            state.playing = true;
            state.started_at = now;
        }
        Ok(())
    }

    fn pause(&mut self) -> BridgeResult<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.calls.push("pause");
        state.base_ms = state.position_at(now);
        state.playing = false;
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> BridgeResult<()> {
        let now = self.clock.now();
        let id = {
            let mut state = self.state.lock();
            state.calls.push("seek");
            state.base_ms = position_ms.min(state.behavior.duration_ms);
            state.started_at = now;
            state.id
        };
        self.post(DecoderSignal::SeekComplete { decoder: id });
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> BridgeResult<()> {
        self.state.lock().volume = volume;
        Ok(())
    }

    fn current_position_ms(&self) -> BridgeResult<u64> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.disposed > 0 {
            state.reads_after_dispose += 1;
            return Err(BridgeError::OperationFailed("disposed".to_string()));
        }
        Ok(state.position_at(now))
    }

    fn duration_ms(&self) -> Option<u64> {
        let state = self.state.lock();
        state.prepared.then_some(state.behavior.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn chain_next(&mut self, next: Option<DecoderId>) -> BridgeResult<bool> {
        let mut state = self.state.lock();
        if !state.behavior.native_chaining {
            return Ok(false);
        }
        state.chained = next;
        Ok(true)
    }

    fn dispose(&mut self) {
        let mut state = self.state.lock();
        state.disposed += 1;
        state.playing = false;
    }
}

/// Read-only view of one fake decoder.
#[derive(Clone)]
pub struct Probe(Arc<Mutex<FakeState>>);

impl Probe {
    pub fn id(&self) -> DecoderId {
        self.0.lock().id
    }
    pub fn volume(&self) -> f32 {
        self.0.lock().volume
    }
    pub fn disposed(&self) -> u32 {
        self.0.lock().disposed
    }
    pub fn is_playing(&self) -> bool {
        self.0.lock().playing
    }
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().calls.clone()
    }
    pub fn count(&self, call: &str) -> usize {
        self.0.lock().calls.iter().filter(|c| **c == call).count()
    }
    pub fn reads_after_dispose(&self) -> u32 {
        self.0.lock().reads_after_dispose
    }
    pub fn chained(&self) -> Option<DecoderId> {
        self.0.lock().chained
    }
}

pub struct FakeFactory {
    clock: Clock,
    behavior: Mutex<FakeBehavior>,
    decoders: Mutex<Vec<Arc<Mutex<FakeState>>>>,
    fail_create: AtomicBool,
}

impl FakeFactory {
    pub fn new(clock: Clock, behavior: FakeBehavior) -> Self {
        Self {
            clock,
            behavior: Mutex::new(behavior),
            decoders: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
        }
    }

    /// Behavior of decoders created from now on.
    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.decoders.lock().len()
    }

    pub fn probe(&self, id: DecoderId) -> Probe {
        let decoders = self.decoders.lock();
        let state = decoders
            .iter()
            .find(|state| state.lock().id == id)
            .expect("decoder was created by this factory");
        Probe(Arc::clone(state))
    }

    pub fn probes(&self) -> Vec<Probe> {
        self.decoders.lock().iter().cloned().map(Probe).collect()
    }

    /// Deliver a held-back `Prepared` signal.
    pub fn complete_prepare(&self, id: DecoderId) {
        let state = Arc::clone(&self.probe(id).0);
        let listener = {
            let mut state = state.lock();
            state.prepared = true;
            Arc::clone(&state.listener)
        };
        listener.on_signal(DecoderSignal::Prepared { decoder: id });
    }

    /// Report a runtime failure from `id`.
    pub fn fail(&self, id: DecoderId, code: i32) {
        let listener = Arc::clone(&self.probe(id).0.lock().listener);
        listener.on_signal(DecoderSignal::Error {
            decoder: id,
            code,
            message: "render failure".to_string(),
        });
    }

    /// Earliest natural end among playing decoders.
    fn next_natural_end(&self) -> Option<(Instant, DecoderId)> {
        self.decoders
            .lock()
            .iter()
            .filter_map(|state| {
                let state = state.lock();
                state.natural_end().map(|at| (at, state.id))
            })
            .min()
    }

    /// Reach the natural end of `id` now, starting its native chain target.
    /// The `Completed` signal stays queued until the next drain.
    pub fn finish(&self, id: DecoderId) {
        let now = self.clock.now();
        let (listener, chained) = {
            let state = self.probe(id).0;
            let mut state = state.lock();
            state.playing = false;
            state.base_ms = state.behavior.duration_ms;
            (Arc::clone(&state.listener), state.chained.take())
        };
        if let Some(next) = chained {
            let next = self.probe(next).0;
            let mut next = next.lock();
            if next.prepared && next.disposed == 0 {
                next.playing = true;
                next.started_at = now;
            }
        }
        listener.on_signal(DecoderSignal::Completed { decoder: id });
    }
}

impl DecoderFactory for FakeFactory {
    fn create(
        &self,
        id: DecoderId,
        _source: &AudioSource,
        listener: Arc<dyn DecoderListener>,
    ) -> BridgeResult<Box<dyn Decoder>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("decoder pool exhausted".to_string()));
        }
        let state = Arc::new(Mutex::new(FakeState {
            id,
            behavior: self.behavior.lock().clone(),
            listener,
            prepared: false,
            playing: false,
            base_ms: 0,
            started_at: self.clock.now(),
            volume: 1.0,
            chained: None,
            disposed: 0,
            reads_after_dispose: 0,
            calls: Vec::new(),
        }));
        self.decoders.lock().push(Arc::clone(&state));
        Ok(Box::new(FakeDecoder {
            state,
            clock: Arc::clone(&self.clock),
        }))
    }
}

// ============================================================================
// Queue + events
// ============================================================================

#[derive(Default)]
pub struct SignalQueue {
    queue: Mutex<VecDeque<(ControllerKey, DecoderSignal)>>,
}

struct QueueListener {
    key: ControllerKey,
    queue: Arc<SignalQueue>,
}

impl DecoderListener for QueueListener {
    fn on_signal(&self, signal: DecoderSignal) {
        self.queue.queue.lock().push_back((self.key, signal));
    }
}

/// `ListenerProvider` handing out listeners bound to one shared queue.
pub struct SharedQueue(pub Arc<SignalQueue>);

impl ListenerProvider for SharedQueue {
    fn listener_for(&self, key: ControllerKey) -> Arc<dyn DecoderListener> {
        Arc::new(QueueListener {
            key,
            queue: Arc::clone(&self.0),
        })
    }
}

/// Records every event with the fake-clock instant it was emitted at.
pub struct RecordingSink {
    clock: Clock,
    events: Mutex<Vec<(Instant, PlayerEvent)>>,
}

impl RecordingSink {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn all(&self) -> Vec<PlayerEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, PlayerEvent)> {
        self.events.lock().clone()
    }

    pub fn completions(&self) -> usize {
        self.count(|e| matches!(e, PlayerEvent::Completion { .. }))
    }

    pub fn seek_completes(&self) -> usize {
        self.count(|e| matches!(e, PlayerEvent::SeekComplete { .. }))
    }

    pub fn errors(&self) -> Vec<PlayerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.is_error())
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Instants of position events.
    pub fn position_times(&self) -> Vec<Instant> {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| matches!(e, PlayerEvent::Position { .. }))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|(_, e)| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PlayerEvent) {
        let now = self.clock.now();
        self.events.lock().push((now, event));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub clock: Clock,
    pub factory: Arc<FakeFactory>,
    pub events: Arc<RecordingSink>,
    pub signals: Arc<SignalQueue>,
    pub registry: ControllerRegistry,
    pub start: Instant,
}

impl Harness {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self::with_config(ControllerConfig::default(), behavior)
    }

    pub fn with_config(config: ControllerConfig, behavior: FakeBehavior) -> Self {
        let clock: Clock = Arc::new(ManualScheduler::new());
        let factory = Arc::new(FakeFactory::new(Arc::clone(&clock), behavior));
        let events = Arc::new(RecordingSink::new(Arc::clone(&clock)));
        let signals = Arc::new(SignalQueue::default());

        let registry = ControllerRegistry::new(RegistryContext {
            decoder_factory: factory.clone(),
            scheduler: clock.clone(),
            events: events.clone(),
            listeners: Arc::new(SharedQueue(Arc::clone(&signals))),
            config,
        })
        .expect("valid config");

        let start = clock.now();
        Self {
            clock,
            factory,
            events,
            signals,
            registry,
            start,
        }
    }

    /// Load a track and process the signals construction produced.
    pub fn load(&mut self, track: Track) -> ControllerKey {
        let key = self.registry.load(track).expect("track loads");
        self.drain_signals();
        key
    }

    pub fn controller(&self, audio_id: &str) -> &PlaybackController {
        self.registry
            .controller(&audio_id.into())
            .expect("controller loaded")
    }

    pub fn controller_mut(&mut self, audio_id: &str) -> &mut PlaybackController {
        self.registry
            .controller_mut(&audio_id.into())
            .expect("controller loaded")
    }

    /// Apply queued decoder signals in arrival order.
    pub fn drain_signals(&mut self) {
        loop {
            let next = self.signals.queue.lock().pop_front();
            match next {
                Some((key, signal)) => {
                    self.registry.dispatch_signal(key, signal);
                }
                None => break,
            }
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn elapsed(&self) -> Duration {
        self.now() - self.start
    }

    pub fn advance(&mut self, by: Duration) {
        let until = self.now() + by;
        self.advance_to(until);
    }

    /// Run timers and natural decoder ends in time order up to `until`.
    pub fn advance_to(&mut self, until: Instant) {
        self.drain_signals();
        loop {
            let timer = self.clock.next_deadline().filter(|at| *at <= until);
            let end = self.factory.next_natural_end().filter(|(at, _)| *at <= until);
            match (timer, end) {
                (None, None) => break,
                (timer, Some((at, id))) if timer.map_or(true, |t| at <= t) => {
                    self.clock.set_now(at);
                    self.factory.finish(id);
                }
                _ => {
                    if let Some(fired) = self.clock.pop_due(until) {
                        self.registry.dispatch_timer(fired);
                    }
                }
            }
            self.drain_signals();
        }
        self.clock.set_now(until);
    }
}

pub fn source() -> AudioSource {
    AudioSource::Bytes {
        data: Bytes::from_static(b"RIFF....WAVEfmt "),
        mime_hint: Some("audio/wav".to_string()),
    }
}

pub fn track(audio_id: &str, options: TrackOptions) -> Track {
    Track::new(audio_id, source()).with_options(options)
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

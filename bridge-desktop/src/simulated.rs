//! Simulated decoder backend.
//!
//! Renders nothing. Each decoder keeps a virtual playhead on the Tokio clock,
//! reports preparation after a configurable delay and reaches its natural
//! end after the configured duration. Under a paused Tokio runtime the whole
//! backend is deterministic, which makes it the default decoder for headless
//! desktop builds and for service-level tests.

use bridge_traits::decoder::{
    AudioSource, Decoder, DecoderFactory, DecoderId, DecoderListener, DecoderSignal,
};
use bridge_traits::error::{BridgeError, Result};
use core_async::task::JoinHandle;
use core_async::time::{self, Duration, Instant};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Behavior of decoders produced by a [`SimulatedDecoderFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedConfig {
    /// Length of every simulated source.
    pub duration: Duration,
    /// Delay between `prepare()` and the `Prepared` signal.
    pub prepare_delay: Duration,
    /// Accept `chain_next` requests and start the chained decoder at the
    /// natural end.
    pub native_chaining: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            prepare_delay: Duration::from_millis(20),
            native_chaining: true,
        }
    }
}

impl SimulatedConfig {
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    pub fn with_native_chaining(mut self, enabled: bool) -> Self {
        self.native_chaining = enabled;
        self
    }
}

struct Playhead {
    prepared: bool,
    playing: bool,
    disposed: bool,
    base_ms: u64,
    started_at: Instant,
    volume: f32,
    chained: Option<DecoderId>,
    /// Bumped on every transport change; stale end timers compare against it.
    epoch: u64,
    end_task: Option<JoinHandle<()>>,
    prepare_task: Option<JoinHandle<()>>,
}

impl Playhead {
    fn position_ms(&self, duration_ms: u64) -> u64 {
        if self.playing {
            let elapsed = time::now()
                .saturating_duration_since(self.started_at)
                .as_millis() as u64;
            (self.base_ms + elapsed).min(duration_ms)
        } else {
            self.base_ms
        }
    }

    fn abort_end(&mut self) {
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }
}

struct Voice {
    id: DecoderId,
    duration_ms: u64,
    listener: Arc<dyn DecoderListener>,
    head: Mutex<Playhead>,
}

/// Live voices by id, so a finishing voice can start its chained successor.
type Mixer = Mutex<HashMap<DecoderId, Weak<Voice>>>;

struct Shared {
    runtime: Handle,
    voices: Mixer,
}

impl Shared {
    /// Start `voice` rendering from its current base position.
    fn start_voice(self: &Arc<Self>, voice: &Arc<Voice>, head: &mut Playhead) {
        head.playing = true;
        head.started_at = time::now();
        self.schedule_end(voice, head);
    }

    fn schedule_end(self: &Arc<Self>, voice: &Arc<Voice>, head: &mut Playhead) {
        head.abort_end();
        head.epoch += 1;
        if !head.playing {
            return;
        }
        let remaining = voice.duration_ms.saturating_sub(head.base_ms);
        let deadline = head.started_at + Duration::from_millis(remaining);
        let epoch = head.epoch;
        let shared = Arc::clone(self);
        let voice = Arc::downgrade(voice);
        head.end_task = Some(self.runtime.spawn(async move {
            time::sleep_until(deadline).await;
            if let Some(voice) = voice.upgrade() {
                shared.finish(&voice, epoch);
            }
        }));
    }

    /// Natural end of `voice`.
    fn finish(self: &Arc<Self>, voice: &Arc<Voice>, epoch: u64) {
        let chained = {
            let mut head = voice.head.lock();
            if head.disposed || !head.playing || head.epoch != epoch {
                return;
            }
            head.playing = false;
            head.base_ms = voice.duration_ms;
            head.end_task = None;
            head.chained.take()
        };

        if let Some(next) = chained.and_then(|id| self.voice(id)) {
            let mut head = next.head.lock();
            if head.prepared && !head.disposed && !head.playing {
                self.start_voice(&next, &mut head);
                trace!(from = %voice.id, to = %next.id, "native chain started");
            }
        }
        debug!(decoder = %voice.id, "simulated decoder reached end");
        voice.listener.on_signal(DecoderSignal::Completed { decoder: voice.id });
    }

    fn voice(&self, id: DecoderId) -> Option<Arc<Voice>> {
        self.voices.lock().get(&id).and_then(Weak::upgrade)
    }
}

/// A decoder that keeps time but renders nothing.
pub struct SimulatedDecoder {
    voice: Arc<Voice>,
    shared: Arc<Shared>,
    prepare_delay: Duration,
    native_chaining: bool,
}

impl SimulatedDecoder {
    pub fn id(&self) -> DecoderId {
        self.voice.id
    }

    /// Last gain applied through [`Decoder::set_volume`].
    pub fn volume(&self) -> f32 {
        self.voice.head.lock().volume
    }

    fn ensure_live(&self) -> Result<()> {
        if self.voice.head.lock().disposed {
            return Err(BridgeError::OperationFailed(format!(
                "{} already disposed",
                self.voice.id
            )));
        }
        Ok(())
    }
}

impl Decoder for SimulatedDecoder {
    fn prepare(&mut self) -> Result<()> {
        self.ensure_live()?;
        let voice = Arc::downgrade(&self.voice);
        let delay = self.prepare_delay;
        let task = self.shared.runtime.spawn(async move {
            time::sleep(delay).await;
            let Some(voice) = voice.upgrade() else {
                return;
            };
            {
                let mut head = voice.head.lock();
                if head.disposed {
                    return;
                }
                head.prepared = true;
                head.prepare_task = None;
            }
            voice.listener.on_signal(DecoderSignal::Prepared { decoder: voice.id });
        });
        let mut head = self.voice.head.lock();
        if let Some(previous) = head.prepare_task.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.ensure_live()?;
        let mut head = self.voice.head.lock();
        if !head.prepared {
            return Err(BridgeError::Decoder {
                code: -38,
                message: "start called before prepared".to_string(),
            });
        }
        if !head.playing {
            self.shared.start_voice(&self.voice, &mut head);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;
        let mut head = self.voice.head.lock();
        head.base_ms = head.position_ms(self.voice.duration_ms);
        head.playing = false;
        self.shared.schedule_end(&self.voice, &mut head);
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.ensure_live()?;
        {
            let mut head = self.voice.head.lock();
            head.base_ms = position_ms.min(self.voice.duration_ms);
            head.started_at = time::now();
            self.shared.schedule_end(&self.voice, &mut head);
        }
        self.voice
            .listener
            .on_signal(DecoderSignal::SeekComplete { decoder: self.voice.id });
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.voice.head.lock().volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn current_position_ms(&self) -> Result<u64> {
        self.ensure_live()?;
        Ok(self.voice.head.lock().position_ms(self.voice.duration_ms))
    }

    fn duration_ms(&self) -> Option<u64> {
        let head = self.voice.head.lock();
        head.prepared.then_some(self.voice.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.voice.head.lock().playing
    }

    fn chain_next(&mut self, next: Option<DecoderId>) -> Result<bool> {
        if !self.native_chaining {
            return Ok(false);
        }
        self.ensure_live()?;
        self.voice.head.lock().chained = next;
        Ok(true)
    }

    fn dispose(&mut self) {
        {
            let mut head = self.voice.head.lock();
            if head.disposed {
                return;
            }
            head.disposed = true;
            head.playing = false;
            head.chained = None;
            head.abort_end();
            if let Some(task) = head.prepare_task.take() {
                task.abort();
            }
        }
        self.shared.voices.lock().remove(&self.voice.id);
        trace!(decoder = %self.voice.id, "simulated decoder disposed");
    }
}

impl Drop for SimulatedDecoder {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Factory for [`SimulatedDecoder`]s.
///
/// Decoders must be created from within a Tokio runtime; their timers run on
/// the runtime that was current at creation.
#[derive(Default)]
pub struct SimulatedDecoderFactory {
    config: SimulatedConfig,
    shared: Mutex<Option<Arc<Shared>>>,
}

impl SimulatedDecoderFactory {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            shared: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    /// Number of decoders created and not yet disposed.
    pub fn live_decoders(&self) -> usize {
        self.shared
            .lock()
            .as_ref()
            .map_or(0, |shared| shared.voices.lock().len())
    }

    fn shared(&self) -> Result<Arc<Shared>> {
        let mut slot = self.shared.lock();
        if let Some(shared) = slot.as_ref() {
            return Ok(Arc::clone(shared));
        }
        let runtime = Handle::try_current().map_err(|_| {
            BridgeError::NotAvailable("simulated decoders need a Tokio runtime".to_string())
        })?;
        let shared = Arc::new(Shared {
            runtime,
            voices: Mutex::new(HashMap::new()),
        });
        *slot = Some(Arc::clone(&shared));
        Ok(shared)
    }
}

impl DecoderFactory for SimulatedDecoderFactory {
    fn create(
        &self,
        id: DecoderId,
        source: &AudioSource,
        listener: Arc<dyn DecoderListener>,
    ) -> Result<Box<dyn Decoder>> {
        let empty = match source {
            AudioSource::Bytes { data, .. } => data.is_empty(),
            AudioSource::File { path } => path.as_os_str().is_empty(),
            AudioSource::Uri { uri } => uri.trim().is_empty(),
        };
        if empty {
            return Err(BridgeError::UnsupportedSource(source.describe()));
        }

        let shared = self.shared()?;
        let voice = Arc::new(Voice {
            id,
            duration_ms: self.config.duration.as_millis() as u64,
            listener,
            head: Mutex::new(Playhead {
                prepared: false,
                playing: false,
                disposed: false,
                base_ms: 0,
                started_at: time::now(),
                volume: 1.0,
                chained: None,
                epoch: 0,
                end_task: None,
                prepare_task: None,
            }),
        });
        shared.voices.lock().insert(id, Arc::downgrade(&voice));
        debug!(decoder = %id, source = %source.describe(), "simulated decoder created");

        Ok(Box::new(SimulatedDecoder {
            voice,
            shared,
            prepare_delay: self.config.prepare_delay,
            native_chaining: self.config.native_chaining,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelListener(mpsc::UnboundedSender<DecoderSignal>);

    impl DecoderListener for ChannelListener {
        fn on_signal(&self, signal: DecoderSignal) {
            let _ = self.0.send(signal);
        }
    }

    fn uri() -> AudioSource {
        AudioSource::Uri {
            uri: "asset:///rain.ogg".to_string(),
        }
    }

    fn create(
        factory: &SimulatedDecoderFactory,
    ) -> (DecoderId, Box<dyn Decoder>, mpsc::UnboundedReceiver<DecoderSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = DecoderId::next();
        let decoder = factory
            .create(id, &uri(), Arc::new(ChannelListener(tx)))
            .unwrap();
        (id, decoder, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_then_play_to_end() {
        let factory = SimulatedDecoderFactory::new(
            SimulatedConfig::default().with_duration(Duration::from_secs(2)),
        );
        let (id, mut decoder, mut rx) = create(&factory);
        assert_eq!(decoder.duration_ms(), None);
        assert!(decoder.start().is_err());

        decoder.prepare().unwrap();
        assert_eq!(rx.recv().await, Some(DecoderSignal::Prepared { decoder: id }));
        assert_eq!(decoder.duration_ms(), Some(2000));

        decoder.start().unwrap();
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(decoder.current_position_ms().unwrap(), 500);

        assert_eq!(rx.recv().await, Some(DecoderSignal::Completed { decoder: id }));
        assert!(!decoder.is_playing());
        assert_eq!(decoder.current_position_ms().unwrap(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_playhead() {
        let factory = SimulatedDecoderFactory::default();
        let (id, mut decoder, mut rx) = create(&factory);
        decoder.prepare().unwrap();
        rx.recv().await;

        decoder.start().unwrap();
        time::sleep(Duration::from_millis(300)).await;
        decoder.pause().unwrap();
        time::sleep(Duration::from_secs(20)).await;

        assert_eq!(decoder.current_position_ms().unwrap(), 300);
        assert!(rx.try_recv().is_err());

        decoder.seek_to(1500).unwrap();
        assert_eq!(rx.recv().await, Some(DecoderSignal::SeekComplete { decoder: id }));
        assert_eq!(decoder.current_position_ms().unwrap(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_chain_starts_successor() {
        let factory = SimulatedDecoderFactory::new(
            SimulatedConfig::default().with_duration(Duration::from_secs(1)),
        );
        let (first_id, mut first, mut first_rx) = create(&factory);
        let (second_id, mut second, mut second_rx) = create(&factory);
        first.prepare().unwrap();
        second.prepare().unwrap();
        first_rx.recv().await;
        second_rx.recv().await;

        assert!(first.chain_next(Some(second_id)).unwrap());
        first.start().unwrap();

        assert_eq!(
            first_rx.recv().await,
            Some(DecoderSignal::Completed { decoder: first_id })
        );
        assert!(second.is_playing());
        assert_eq!(second.current_position_ms().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chaining_can_be_disabled() {
        let factory =
            SimulatedDecoderFactory::new(SimulatedConfig::default().with_native_chaining(false));
        let (_, mut decoder, _rx) = create(&factory);
        assert!(!decoder.chain_next(Some(DecoderId::next())).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_silences_decoder() {
        let factory = SimulatedDecoderFactory::default();
        let (_, mut decoder, mut rx) = create(&factory);
        assert_eq!(factory.live_decoders(), 1);

        decoder.prepare().unwrap();
        decoder.dispose();
        decoder.dispose();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(factory.live_decoders(), 0);
        assert!(rx.try_recv().is_err());
        assert!(decoder.current_position_ms().is_err());
    }

    #[tokio::test]
    async fn test_empty_source_is_unsupported() {
        let factory = SimulatedDecoderFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = factory.create(
            DecoderId::next(),
            &AudioSource::Uri { uri: " ".to_string() },
            Arc::new(ChannelListener(tx)),
        );
        assert!(matches!(result, Err(BridgeError::UnsupportedSource(_))));
    }

    #[test]
    fn test_create_outside_runtime_is_not_available() {
        let factory = SimulatedDecoderFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = factory.create(DecoderId::next(), &uri(), Arc::new(ChannelListener(tx)));
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}

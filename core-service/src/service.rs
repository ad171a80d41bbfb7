use crate::actor::{Actor, Command, Message, QueueListeners, Reply};
use crate::error::{Result, ServiceError};
use core_async::scheduler::{Fired, TokioScheduler};
use core_async::sync::{broadcast, mpsc, oneshot, CancellationToken, DropGuard};
use core_async::task::JoinHandle;
use core_playback::{
    AudioId, ControllerConfig, ControllerRegistry, Endpoint, PlaybackError, RegistryContext,
    TimerTask, Track,
};
use core_runtime::events::{EventBus, EventStream, PlayerEvent};
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Builds and starts the playback queue.
///
/// ```ignore
/// let core = CoreConfig::builder().build()?;
/// let player = PlaybackService::new(core)
///     .with_controller_config(ControllerConfig::responsive())
///     .spawn()?;
///
/// player.load(Track::new("rain", source).with_options(TrackOptions::looping(LoopMode::Seamless))).await?;
/// player.play("rain", true, Endpoint::PlayToEnd).await?;
/// ```
pub struct PlaybackService {
    core: CoreConfig,
    controller: ControllerConfig,
}

impl PlaybackService {
    pub fn new(core: CoreConfig) -> Self {
        Self {
            core,
            controller: ControllerConfig::default(),
        }
    }

    pub fn with_controller_config(mut self, config: ControllerConfig) -> Self {
        self.controller = config;
        self
    }

    /// Start the queue task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InitializationFailed`] outside of a Tokio runtime,
    /// or a configuration error.
    pub fn spawn(self) -> Result<PlaybackHandle> {
        self.core.validate()?;
        let runtime = Handle::try_current().map_err(|err| {
            ServiceError::InitializationFailed(format!("no Tokio runtime: {err}"))
        })?;

        let (queue, inbox) = mpsc::unbounded_channel();
        let timer_queue = queue.clone();
        let scheduler = TokioScheduler::with_handle(runtime.clone(), move |fired: Fired<TimerTask>| {
            let _ = timer_queue.send(Message::Timer(fired));
        });

        let registry = ControllerRegistry::new(RegistryContext {
            decoder_factory: Arc::clone(&self.core.decoder_factory),
            scheduler: Arc::new(scheduler),
            events: Arc::new(self.core.event_bus.clone()),
            listeners: Arc::new(QueueListeners::new(queue.clone())),
            config: self.controller.clone(),
        })?;

        let id = Uuid::new_v4();
        let shutdown = CancellationToken::new();
        let actor = Actor::new(registry, inbox, shutdown.clone());
        let task = runtime.spawn(actor.run().instrument(info_span!("playback_service", service_id = %id)));

        info!(
            service_id = %id,
            poll_interval_ms = self.controller.poll_interval.as_millis() as u64,
            eager_prepare = self.controller.eager_prepare,
            "playback service spawned"
        );

        Ok(PlaybackHandle {
            inner: Arc::new(Inner {
                id,
                queue,
                events: self.core.event_bus,
                _guard: shutdown.clone().drop_guard(),
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        })
    }
}

struct Inner {
    id: Uuid,
    queue: mpsc::UnboundedSender<Message>,
    events: EventBus,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Stops the queue once the last handle is dropped.
    _guard: DropGuard,
}

/// Cloneable async front-end of a running [`PlaybackService`].
///
/// Every call is posted to the queue and answered in order. Validation
/// failures come back as errors; decoder failures arrive as
/// [`PlayerEvent::Error`] on the event bus.
#[derive(Clone)]
pub struct PlaybackHandle {
    inner: Arc<Inner>,
}

impl PlaybackHandle {
    pub fn service_id(&self) -> Uuid {
        self.inner.id
    }

    pub fn is_running(&self) -> bool {
        !self.inner.shutdown.is_cancelled() && !self.inner.queue.is_closed()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Every event of every loaded track.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    /// Events of one track.
    pub fn subscribe_audio(&self, audio_id: impl Into<AudioId>) -> EventStream {
        self.inner.events.subscribe_audio(audio_id.into().as_str())
    }

    pub async fn load(&self, track: Track) -> Result<()> {
        self.request(|reply| Command::Load { track, reply }).await
    }

    pub async fn play(
        &self,
        audio_id: impl Into<AudioId>,
        from_start: bool,
        endpoint: Endpoint,
    ) -> Result<()> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Play {
            audio_id,
            from_start,
            endpoint,
            reply,
        })
        .await
    }

    /// [`play`](Self::play) with a wire endpoint in milliseconds, where
    /// `-1` plays to the end.
    pub async fn play_until(
        &self,
        audio_id: impl Into<AudioId>,
        from_start: bool,
        endpoint_ms: i64,
    ) -> Result<()> {
        let endpoint = Endpoint::from_wire(endpoint_ms)?;
        self.play(audio_id, from_start, endpoint).await
    }

    pub async fn pause(&self, audio_id: impl Into<AudioId>) -> Result<()> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Pause { audio_id, reply }).await
    }

    pub async fn seek(&self, audio_id: impl Into<AudioId>, position_seconds: f64) -> Result<()> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Seek {
            audio_id,
            position_seconds,
            reply,
        })
        .await
    }

    pub async fn set_volume(&self, audio_id: impl Into<AudioId>, volume: f64) -> Result<()> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::SetVolume {
            audio_id,
            volume,
            reply,
        })
        .await
    }

    pub async fn volume(&self, audio_id: impl Into<AudioId>) -> Result<f64> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Volume { audio_id, reply }).await
    }

    /// Track duration in seconds, `None` until the decoder knows it.
    pub async fn duration_seconds(&self, audio_id: impl Into<AudioId>) -> Result<Option<f64>> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Duration { audio_id, reply }).await
    }

    pub async fn position_seconds(&self, audio_id: impl Into<AudioId>) -> Result<f64> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Position { audio_id, reply }).await
    }

    pub async fn release(&self, audio_id: impl Into<AudioId>) -> Result<()> {
        let audio_id = audio_id.into();
        self.request(|reply| Command::Release { audio_id, reply }).await
    }

    /// Release every loaded track. Returns how many were released.
    pub async fn release_all(&self) -> Result<usize> {
        self.request(|reply| Command::ReleaseAll { reply }).await
    }

    /// Stop the queue, releasing every controller, and wait for it to exit.
    /// Later calls return immediately.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown.cancel();
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|err| ServiceError::TaskFailed(err.to_string()))?;
            info!(service_id = %self.inner.id, "playback service shut down");
        }
        Ok(())
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        if self.inner.shutdown.is_cancelled() {
            return Err(PlaybackError::ServiceStopped.into());
        }
        let (reply, response) = oneshot::channel();
        self.inner
            .queue
            .send(Message::Command(command(reply)))
            .map_err(|_| PlaybackError::ServiceStopped)?;
        let result = response.await.map_err(|_| PlaybackError::ServiceStopped)?;
        Ok(result?)
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("service_id", &self.inner.id)
            .field("running", &self.is_running())
            .finish()
    }
}

//! The serial event queue.
//!
//! One Tokio task owns the [`ControllerRegistry`] and drains a single
//! unbounded channel. Caller commands, decoder signals and fired timers all
//! arrive on that channel and are applied one at a time, so controller state
//! needs no locks.

use bridge_traits::decoder::{DecoderListener, DecoderSignal};
use core_async::scheduler::Fired;
use core_async::sync::{mpsc, oneshot, CancellationToken};
use core_playback::{
    AudioId, ControllerKey, ControllerRegistry, Endpoint, ListenerProvider, PlaybackController,
    Result as PlaybackResult, TimerTask, Track,
};
use std::sync::Arc;
use tracing::{debug, info, trace};

pub(crate) type Reply<T> = oneshot::Sender<PlaybackResult<T>>;

/// Everything the queue processes.
pub(crate) enum Message {
    Command(Command),
    Signal {
        key: ControllerKey,
        signal: DecoderSignal,
    },
    Timer(Fired<TimerTask>),
}

pub(crate) enum Command {
    Load {
        track: Track,
        reply: Reply<()>,
    },
    Play {
        audio_id: AudioId,
        from_start: bool,
        endpoint: Endpoint,
        reply: Reply<()>,
    },
    Pause {
        audio_id: AudioId,
        reply: Reply<()>,
    },
    Seek {
        audio_id: AudioId,
        position_seconds: f64,
        reply: Reply<()>,
    },
    SetVolume {
        audio_id: AudioId,
        volume: f64,
        reply: Reply<()>,
    },
    Volume {
        audio_id: AudioId,
        reply: Reply<f64>,
    },
    Duration {
        audio_id: AudioId,
        reply: Reply<Option<f64>>,
    },
    Position {
        audio_id: AudioId,
        reply: Reply<f64>,
    },
    Release {
        audio_id: AudioId,
        reply: Reply<()>,
    },
    ReleaseAll {
        reply: Reply<usize>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "load",
            Command::Play { .. } => "play",
            Command::Pause { .. } => "pause",
            Command::Seek { .. } => "seek",
            Command::SetVolume { .. } => "set_volume",
            Command::Volume { .. } => "volume",
            Command::Duration { .. } => "duration",
            Command::Position { .. } => "position",
            Command::Release { .. } => "release",
            Command::ReleaseAll { .. } => "release_all",
        }
    }
}

/// Re-posts one controller's decoder signals onto the queue.
struct QueueListener {
    key: ControllerKey,
    queue: mpsc::UnboundedSender<Message>,
}

impl DecoderListener for QueueListener {
    fn on_signal(&self, signal: DecoderSignal) {
        if self
            .queue
            .send(Message::Signal {
                key: self.key,
                signal,
            })
            .is_err()
        {
            trace!(controller = %self.key, "queue closed, dropping decoder signal");
        }
    }
}

pub(crate) struct QueueListeners {
    queue: mpsc::UnboundedSender<Message>,
}

impl QueueListeners {
    pub(crate) fn new(queue: mpsc::UnboundedSender<Message>) -> Self {
        Self { queue }
    }
}

impl ListenerProvider for QueueListeners {
    fn listener_for(&self, key: ControllerKey) -> Arc<dyn DecoderListener> {
        Arc::new(QueueListener {
            key,
            queue: self.queue.clone(),
        })
    }
}

pub(crate) struct Actor {
    registry: ControllerRegistry,
    inbox: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
}

impl Actor {
    pub(crate) fn new(
        registry: ControllerRegistry,
        inbox: mpsc::UnboundedReceiver<Message>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            inbox,
            shutdown,
        }
    }

    /// Drain the queue until shutdown, then release every controller.
    pub(crate) async fn run(mut self) {
        info!("playback service started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle(message),
                    None => break,
                },
            }
        }

        let released = self.registry.release_all();
        self.inbox.close();
        info!(released, "playback service stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Command(command) => self.handle_command(command),
            Message::Signal { key, signal } => {
                self.registry.dispatch_signal(key, signal);
            }
            Message::Timer(fired) => {
                self.registry.dispatch_timer(fired);
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        debug!(command = command.name(), "command");
        match command {
            Command::Load { track, reply } => {
                let _ = reply.send(self.registry.load(track).map(|_| ()));
            }
            Command::Play {
                audio_id,
                from_start,
                endpoint,
                reply,
            } => {
                let result = self.with_controller(&audio_id, |c| c.play(from_start, endpoint));
                let _ = reply.send(result);
            }
            Command::Pause { audio_id, reply } => {
                let _ = reply.send(self.with_controller(&audio_id, PlaybackController::pause));
            }
            Command::Seek {
                audio_id,
                position_seconds,
                reply,
            } => {
                let result = self.with_controller(&audio_id, |c| c.seek(position_seconds));
                let _ = reply.send(result);
            }
            Command::SetVolume {
                audio_id,
                volume,
                reply,
            } => {
                let result = self.with_controller(&audio_id, |c| c.set_volume(volume));
                let _ = reply.send(result);
            }
            Command::Volume { audio_id, reply } => {
                let result = self
                    .registry
                    .controller(&audio_id)
                    .map(|c| c.volume().get());
                let _ = reply.send(result);
            }
            Command::Duration { audio_id, reply } => {
                let result = self
                    .registry
                    .controller(&audio_id)
                    .and_then(PlaybackController::duration_seconds);
                let _ = reply.send(result);
            }
            Command::Position { audio_id, reply } => {
                let result = self
                    .registry
                    .controller(&audio_id)
                    .and_then(PlaybackController::position_seconds);
                let _ = reply.send(result);
            }
            Command::Release { audio_id, reply } => {
                let _ = reply.send(self.registry.release(&audio_id));
            }
            Command::ReleaseAll { reply } => {
                let _ = reply.send(Ok(self.registry.release_all()));
            }
        }
    }

    fn with_controller<T>(
        &mut self,
        audio_id: &AudioId,
        f: impl FnOnce(&mut PlaybackController) -> PlaybackResult<T>,
    ) -> PlaybackResult<T> {
        let controller = self.registry.controller_mut(audio_id)?;
        f(controller)
    }
}

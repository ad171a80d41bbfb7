//! # Player Events
//!
//! Outbound notifications produced by playback controllers and the
//! plumbing that carries them to the host.
//!
//! ## Overview
//!
//! - [`PlayerEvent`]: the closed set of notifications a controller emits
//! - [`EventSink`]: the seam controllers emit through; must never block
//! - [`EventBus`]: `tokio::sync::broadcast` backed sink with many subscribers
//! - [`EventStream`]: receiver wrapper with optional filtering
//! - [`ChannelSink`]: lossless single-consumer sink over an unbounded `mpsc`
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ PlaybackController ├────────>│ EventBus  ├────────────>│ UI / host  │
//! └────────────────────┘         │(broadcast)│             └────────────┘
//!                                │           │  subscribe  ┌────────────┐
//!                                │           ├────────────>│ Telemetry  │
//!                                └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventSink, PlayerEvent};
//!
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(PlayerEvent::Completion {
//!     audio_id: "loop-1".to_string(),
//! });
//!
//! assert_eq!(rx.try_recv().unwrap().audio_id(), "loop-1");
//! ```
//!
//! Every event carries the `audio_id` of the controller it belongs to, so a
//! single bus can serve any number of controllers.

use core_async::sync::broadcast::error::{RecvError, SendError, TryRecvError};
use core_async::sync::{broadcast, mpsc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-subscriber buffer of the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event types
// ============================================================================

/// Stable classification attached to [`PlayerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The decoder could not be created for the track source.
    DecoderCreateFailed,
    /// The source could not be opened or prepared.
    DecoderPrepareFailed,
    /// A prepared decoder failed while rendering or on a control call.
    DecoderRuntimeError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DecoderCreateFailed => "decoder_create_failed",
            ErrorCode::DecoderPrepareFailed => "decoder_prepare_failed",
            ErrorCode::DecoderRuntimeError => "decoder_runtime_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification emitted by a playback controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Periodic position report while playing.
    Position {
        audio_id: String,
        position_seconds: f64,
    },
    /// Natural end of the track, a loop boundary in `Repeat` mode, or a
    /// reached endpoint.
    Completion { audio_id: String },
    /// A caller-requested seek has landed.
    SeekComplete { audio_id: String },
    /// Non-fatal decoder failure. `native_code` is the platform's numeric
    /// code (`-1` when the failure did not come from the platform).
    Error {
        audio_id: String,
        code: ErrorCode,
        native_code: i32,
        message: String,
    },
}

impl PlayerEvent {
    /// The controller this event belongs to.
    pub fn audio_id(&self) -> &str {
        match self {
            PlayerEvent::Position { audio_id, .. }
            | PlayerEvent::Completion { audio_id }
            | PlayerEvent::SeekComplete { audio_id }
            | PlayerEvent::Error { audio_id, .. } => audio_id,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerEvent::Position { .. } => "position",
            PlayerEvent::Completion { .. } => "completion",
            PlayerEvent::SeekComplete { .. } => "seek_complete",
            PlayerEvent::Error { .. } => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlayerEvent::Error { .. })
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for controller events.
///
/// Called from the serial playback queue. Implementations must return
/// immediately; queue the event elsewhere if delivery can block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

/// Broadcast event bus.
///
/// Subscribers that fall behind by more than the buffer size observe
/// `RecvError::Lagged` and skip ahead; position ticks are the usual victims.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it.
    ///
    /// Errors when nobody is subscribed.
    pub fn publish(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// New independent receiver of all future events. Past events are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Receiver limited to the events of one controller.
    pub fn subscribe_audio(&self, audio_id: impl Into<String>) -> EventStream {
        let audio_id = audio_id.into();
        EventStream::new(self.subscribe()).filter(move |event| event.audio_id() == audio_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: PlayerEvent) {
        // No subscribers is not an error for a controller.
        let _ = self.sender.send(event);
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Lossless single-consumer sink.
///
/// Use when every position tick matters (recording, tests). Events emitted
/// after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelSink {
    /// Sink plus the receiving end the host drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PlayerEvent) {
        let _ = self.sender.send(event);
    }
}

// ============================================================================
// Streams
// ============================================================================

type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// Broadcast receiver with an optional predicate.
pub struct EventStream {
    receiver: broadcast::Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &PlayerEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if this stream fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event without waiting; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

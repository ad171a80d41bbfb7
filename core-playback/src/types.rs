//! Domain types shared by the playback components.

use crate::error::{PlaybackError, Result};
use bridge_traits::decoder::AudioSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Wire value of [`Endpoint::PlayToEnd`].
pub const PLAY_TO_END_MS: i64 = -1;

/// Opaque identity of a loaded track, unique within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioId(String);

impl AudioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AudioId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AudioId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What happens when the active decoder reaches its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Play once; completion is reported at the end.
    #[default]
    Off,
    /// Loop; completion is reported at every loop boundary.
    Repeat,
    /// Loop; loop boundaries are not reported.
    Seamless,
}

impl LoopMode {
    pub fn looping(&self) -> bool {
        !matches!(self, LoopMode::Off)
    }

    /// Whether a natural end produces a completion event.
    pub fn reports_completion(&self) -> bool {
        !matches!(self, LoopMode::Seamless)
    }
}

/// Per-track playback flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackOptions {
    #[serde(default)]
    pub loop_mode: LoopMode,
    /// Carried for the host's audio-focus policy; the controller does not
    /// act on it.
    #[serde(default)]
    pub play_in_background: bool,
    /// Keep a prepared successor decoder staged for gapless continuation.
    #[serde(default)]
    pub gapless: bool,
}

impl TrackOptions {
    /// Gapless looping in the given mode.
    pub fn looping(mode: LoopMode) -> Self {
        Self {
            loop_mode: mode,
            play_in_background: false,
            gapless: mode.looping(),
        }
    }

    pub fn with_background(mut self, play_in_background: bool) -> Self {
        self.play_in_background = play_in_background;
        self
    }

    pub fn with_gapless(mut self, gapless: bool) -> Self {
        self.gapless = gapless;
        self
    }
}

/// Immutable description of what a controller plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    audio_id: AudioId,
    source: AudioSource,
    #[serde(default)]
    options: TrackOptions,
}

impl Track {
    pub fn new(audio_id: impl Into<AudioId>, source: AudioSource) -> Self {
        Self {
            audio_id: audio_id.into(),
            source,
            options: TrackOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TrackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn audio_id(&self) -> &AudioId {
        &self.audio_id
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn options(&self) -> &TrackOptions {
        &self.options
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.options.loop_mode
    }
}

/// Where `play()` stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Natural end of media drives completion.
    PlayToEnd,
    /// Pause and report completion at this media position.
    At(Duration),
}

impl Endpoint {
    pub fn at_millis(ms: u64) -> Self {
        Endpoint::At(Duration::from_millis(ms))
    }

    /// Decode the wire representation, where [`PLAY_TO_END_MS`] means
    /// play to end.
    pub fn from_wire(ms: i64) -> Result<Self> {
        match ms {
            PLAY_TO_END_MS => Ok(Endpoint::PlayToEnd),
            ms if ms >= 0 => Ok(Endpoint::at_millis(ms as u64)),
            ms => Err(PlaybackError::InvalidEndpointValue(ms)),
        }
    }

    pub fn to_wire(&self) -> i64 {
        match self {
            Endpoint::PlayToEnd => PLAY_TO_END_MS,
            Endpoint::At(at) => at.as_millis() as i64,
        }
    }
}

/// Normalized output gain.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Volume(f64);

impl Volume {
    pub const MAX: Volume = Volume(1.0);

    /// Accepts finite values in `[0.0, 1.0]`.
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PlaybackError::InvalidVolume(value))
        }
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Value handed to decoders.
    pub fn as_gain(&self) -> f32 {
        self.0 as f32
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<f64> for Volume {
    type Error = PlaybackError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Volume> for f64 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

/// Lifecycle of one decoder handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderState {
    Idle,
    Preparing,
    Ready,
    Playing,
    Paused,
    Ended,
    Released,
}

impl DecoderState {
    /// Whether the decoder finished preparation and has not been released.
    pub fn is_prepared(&self) -> bool {
        matches!(
            self,
            DecoderState::Ready | DecoderState::Playing | DecoderState::Paused | DecoderState::Ended
        )
    }
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecoderState::Idle => "idle",
            DecoderState::Preparing => "preparing",
            DecoderState::Ready => "ready",
            DecoderState::Playing => "playing",
            DecoderState::Paused => "paused",
            DecoderState::Ended => "ended",
            DecoderState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Generational index of a controller in the registry.
///
/// Keys of released controllers never resolve again, even after their
/// slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerKey {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ControllerKey {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ControllerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Payload of every timer a controller schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerTask {
    PositionTick { controller: ControllerKey },
    Endpoint { controller: ControllerKey },
}

impl TimerTask {
    pub fn controller(&self) -> ControllerKey {
        match self {
            TimerTask::PositionTick { controller } | TimerTask::Endpoint { controller } => {
                *controller
            }
        }
    }
}

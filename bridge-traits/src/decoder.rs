//! Decoder bridge traits and supporting types.
//!
//! A [`Decoder`] is the opaque platform capability that decodes and renders a
//! single audio source (ExoPlayer / MediaPlayer on Android, AVAudioPlayer on
//! iOS, a software pipeline on desktop). The core never inspects how audio is
//! produced; it only drives the decoder through the control methods below and
//! reacts to the [`DecoderSignal`]s the decoder reports back through its
//! [`DecoderListener`].
//!
//! ## Callback model
//!
//! Preparation and seeking are asynchronous at the platform layer. A decoder
//! acknowledges the request immediately and later reports the outcome as a
//! signal. Listeners must not run controller logic in place: the core's
//! listener implementations re-post every signal onto the owning controller's
//! serial queue, so a decoder may invoke the listener from any thread.

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DECODER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one decoder instance.
///
/// Identities are never reused, which lets the core discard callbacks from a
/// decoder that has already been swapped out or disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DecoderId(u64);

impl DecoderId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        Self(NEXT_DECODER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an identity from its raw value (e.g. received over FFI).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DecoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoder-{}", self.0)
    }
}

/// Where a decoder reads its encoded audio from.
///
/// Loading the bytes or resolving the file is the host's business; the core
/// only carries the descriptor to the [`DecoderFactory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSource {
    /// Encoded audio already held in memory.
    Bytes {
        data: Bytes,
        /// Optional container/codec hint such as `audio/mpeg`.
        mime_hint: Option<String>,
    },
    /// Local file accessible to the host runtime.
    File { path: PathBuf },
    /// Any URI the platform decoder understands (asset, content, http).
    Uri { uri: String },
}

impl AudioSource {
    /// Returns `true` if the encoded audio is already in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self, AudioSource::Bytes { .. })
    }

    /// Returns the encoded size in bytes, if known without I/O.
    pub fn estimated_size(&self) -> Option<usize> {
        match self {
            AudioSource::Bytes { data, .. } => Some(data.len()),
            _ => None,
        }
    }

    /// Short human readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Bytes { data, mime_hint } => match mime_hint {
                Some(mime) => format!("{} bytes ({})", data.len(), mime),
                None => format!("{} bytes", data.len()),
            },
            // File name only; full paths can reveal the user's home directory.
            AudioSource::File { path } => match path.file_name() {
                Some(name) => format!("file {}", name.to_string_lossy()),
                None => "file".to_string(),
            },
            AudioSource::Uri { uri } => format!("uri {}", uri),
        }
    }
}

/// Low-level notifications reported by a decoder.
///
/// This is a closed set: every platform callback maps onto exactly one
/// variant, and every variant names the decoder it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum DecoderSignal {
    /// Asynchronous preparation finished; the decoder can start.
    Prepared { decoder: DecoderId },
    /// Natural end of media was reached.
    Completed { decoder: DecoderId },
    /// A previously requested seek has landed.
    SeekComplete { decoder: DecoderId },
    /// The decoder failed. During preparation this means the source could
    /// not be opened; afterwards it is a runtime decode/render failure.
    Error {
        decoder: DecoderId,
        code: i32,
        message: String,
    },
}

impl DecoderSignal {
    /// The decoder that emitted this signal.
    pub fn decoder(&self) -> DecoderId {
        match self {
            DecoderSignal::Prepared { decoder }
            | DecoderSignal::Completed { decoder }
            | DecoderSignal::SeekComplete { decoder }
            | DecoderSignal::Error { decoder, .. } => *decoder,
        }
    }

    /// Variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DecoderSignal::Prepared { .. } => "prepared",
            DecoderSignal::Completed { .. } => "completed",
            DecoderSignal::SeekComplete { .. } => "seek_complete",
            DecoderSignal::Error { .. } => "error",
        }
    }
}

/// Receiver for decoder callbacks.
///
/// Implementations must be cheap and non-blocking; they are typically called
/// from platform audio threads.
pub trait DecoderListener: Send + Sync {
    fn on_signal(&self, signal: DecoderSignal);
}

/// Control surface of one platform decoder instance.
///
/// Control calls return quickly. `prepare` and `seek_to` only *request* the
/// operation; their completion is reported as [`DecoderSignal::Prepared`] and
/// [`DecoderSignal::SeekComplete`] respectively.
pub trait Decoder: Send {
    /// Begin asynchronous preparation of the source given at creation.
    fn prepare(&mut self) -> Result<()>;

    /// Start or resume rendering. Only valid once prepared.
    fn start(&mut self) -> Result<()>;

    /// Pause rendering, keeping the current position.
    fn pause(&mut self) -> Result<()>;

    /// Request an asynchronous seek to `position_ms`.
    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Set output gain in `[0.0, 1.0]`.
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Current playback position in milliseconds.
    fn current_position_ms(&self) -> Result<u64>;

    /// Total duration in milliseconds, if known (usually after preparation).
    fn duration_ms(&self) -> Option<u64>;

    /// Whether audio is currently being rendered.
    fn is_playing(&self) -> bool;

    /// Register (or clear, with `None`) the decoder that should start
    /// automatically when this one reaches its natural end.
    ///
    /// Returns `Ok(true)` if the platform supports native chaining and
    /// accepted the request. The default implementation reports that
    /// chaining is unsupported, in which case the core starts the successor
    /// itself when it receives [`DecoderSignal::Completed`].
    fn chain_next(&mut self, next: Option<DecoderId>) -> Result<bool> {
        let _ = next;
        Ok(false)
    }

    /// Release all native resources. Called exactly once by the core.
    fn dispose(&mut self);
}

/// Constructs platform decoders.
pub trait DecoderFactory: Send + Sync {
    /// Create a decoder for `source` that reports its signals to `listener`
    /// tagged with `id`. The returned decoder is idle (not yet prepared).
    fn create(
        &self,
        id: DecoderId,
        source: &AudioSource,
        listener: Arc<dyn DecoderListener>,
    ) -> Result<Box<dyn Decoder>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_ids_are_unique_and_increasing() {
        let a = DecoderId::next();
        let b = DecoderId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(DecoderId::from_raw(a.as_u64()), a);
        assert!(a.to_string().starts_with("decoder-"));
    }

    #[test]
    fn audio_source_classification() {
        let bytes = AudioSource::Bytes {
            data: Bytes::from_static(&[1, 2, 3]),
            mime_hint: Some("audio/wav".to_string()),
        };
        assert!(bytes.is_in_memory());
        assert_eq!(bytes.estimated_size(), Some(3));
        assert_eq!(bytes.describe(), "3 bytes (audio/wav)");

        let file = AudioSource::File {
            path: "/tmp/loop.ogg".into(),
        };
        assert!(!file.is_in_memory());
        assert_eq!(file.estimated_size(), None);
        assert_eq!(file.describe(), "file loop.ogg");

        let uri = AudioSource::Uri {
            uri: "asset:///click.mp3".to_string(),
        };
        assert_eq!(uri.describe(), "uri asset:///click.mp3");
    }

    #[test]
    fn signal_exposes_decoder_identity() {
        let id = DecoderId::from_raw(42);
        let signals = [
            DecoderSignal::Prepared { decoder: id },
            DecoderSignal::Completed { decoder: id },
            DecoderSignal::SeekComplete { decoder: id },
            DecoderSignal::Error {
                decoder: id,
                code: 1,
                message: "boom".to_string(),
            },
        ];
        for signal in &signals {
            assert_eq!(signal.decoder(), id);
        }
        assert_eq!(signals[3].kind(), "error");
    }

    #[test]
    fn signal_wire_format() {
        let signal = DecoderSignal::Error {
            decoder: DecoderId::from_raw(7),
            code: -38,
            message: "bad state".to_string(),
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["signal"], "error");
        assert_eq!(json["decoder"], 7);
        assert_eq!(json["code"], -38);
    }

    struct Stub;

    impl Decoder for Stub {
        fn prepare(&mut self) -> Result<()> {
            Ok(())
        }
        fn start(&mut self) -> Result<()> {
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        fn seek_to(&mut self, _position_ms: u64) -> Result<()> {
            Ok(())
        }
        fn set_volume(&mut self, _volume: f32) -> Result<()> {
            Ok(())
        }
        fn current_position_ms(&self) -> Result<u64> {
            Ok(0)
        }
        fn duration_ms(&self) -> Option<u64> {
            None
        }
        fn is_playing(&self) -> bool {
            false
        }
        fn dispose(&mut self) {}
    }

    #[test]
    fn chaining_is_unsupported_by_default() {
        let mut stub = Stub;
        assert!(!stub.chain_next(Some(DecoderId::next())).unwrap());
    }
}

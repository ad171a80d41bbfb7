//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform-specific pieces it drives. Each trait represents a capability the
//! core requires but that is implemented differently per platform (desktop,
//! Android, iOS).
//!
//! ## Traits
//!
//! ### Audio
//! - [`Decoder`](decoder::Decoder) - One native decoder/renderer instance
//! - [`DecoderFactory`](decoder::DecoderFactory) - Creates decoders for an [`AudioSource`](decoder::AudioSource)
//! - [`DecoderListener`](decoder::DecoderListener) - Receives [`DecoderSignal`](decoder::DecoderSignal)s
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Simulated decoder |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert native failures into
//! [`BridgeError::Decoder`](error::BridgeError::Decoder) with the platform's
//! numeric code so the core can surface it unchanged to callers.
//!
//! ## Thread Safety
//!
//! Decoders are `Send` (owned by exactly one controller, moved onto its
//! queue); factories and listeners are `Send + Sync` because they are shared.

pub mod decoder;
pub mod error;
pub mod log;

pub use error::BridgeError;

pub use decoder::{AudioSource, Decoder, DecoderFactory, DecoderId, DecoderListener, DecoderSignal};
pub use log::{LogEntry, LogLevel, LoggerSink, MemoryLogger};

//! # Playback Module
//!
//! Gapless single-track playback on top of opaque platform decoders.
//!
//! ## Overview
//!
//! This module handles:
//! - The per-track state machine ([`PlaybackController`])
//! - Position reporting on a fixed cadence ([`PositionPoller`])
//! - Pause-at-endpoint deadlines ([`EndpointScheduler`])
//! - Pre-buffered successor decoders for gapless loops ([`GaplessSuccessor`])
//! - A generational arena of controllers ([`ControllerRegistry`])
//!
//! Everything here is synchronous. Time comes from an injected
//! [`Scheduler`](core_async::scheduler::Scheduler), decoder callbacks arrive
//! as [`DecoderSignal`](bridge_traits::decoder::DecoderSignal) values, and
//! events leave through an [`EventSink`](core_runtime::events::EventSink).
//! `core-service` runs all of it on one Tokio task.

pub mod config;
pub mod controller;
pub mod decoder;
pub mod endpoint;
pub mod error;
pub mod poller;
pub mod registry;
pub mod successor;
pub mod types;

#[cfg(test)]
mod mocks;

pub use config::ControllerConfig;
pub use controller::{ControllerContext, PlaybackController};
pub use decoder::DecoderHandle;
pub use endpoint::EndpointScheduler;
pub use error::{PlaybackError, Result};
pub use poller::PositionPoller;
pub use registry::{ControllerRegistry, ListenerProvider, RegistryContext};
pub use successor::GaplessSuccessor;
pub use types::{
    AudioId, ControllerKey, DecoderState, Endpoint, LoopMode, TimerTask, Track, TrackOptions, Volume,
    PLAY_TO_END_MS,
};

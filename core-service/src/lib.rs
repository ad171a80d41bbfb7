//! # Playback Service
//!
//! Hosts the playback controllers on a single Tokio task.
//!
//! [`PlaybackService::spawn`] wires the configured decoder factory, a
//! Tokio-backed timer scheduler and the event bus into a
//! [`ControllerRegistry`](core_playback::ControllerRegistry), then starts the
//! queue task. Callers talk to it through the cloneable [`PlaybackHandle`];
//! decoder callbacks and fired timers are posted onto the same queue, so
//! every controller sees one ordered stream of inputs.
//!
//! Desktop builds enable the `desktop-shims` feature, which lets
//! `CoreConfig` fall back to the simulated decoder backend from
//! `bridge-desktop` when no factory is supplied.

mod actor;
pub mod error;
mod service;

pub use error::{Result, ServiceError};
pub use service::{PlaybackHandle, PlaybackService};

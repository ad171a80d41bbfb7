//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback crates:
//! - Logging and tracing bootstrap
//! - Configuration with fail-fast capability checks
//! - Outbound player events and the event bus
//!
//! ## Overview
//!
//! `core-playback` emits through the [`EventSink`](events::EventSink) seam
//! defined here, and `core-service` wires a [`CoreConfig`](config::CoreConfig)
//! into a running playback queue. Hosts call
//! [`init_logging`](logging::init_logging) once at start-up.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{ChannelSink, ErrorCode, EventBus, EventSink, EventStream, PlayerEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};

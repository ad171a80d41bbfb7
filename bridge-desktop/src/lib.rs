//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - [`SimulatedDecoderFactory`]: a clock-accurate decoder backend that
//!   renders nothing. It drives headless builds and service tests, and is the
//!   factory `core-runtime` injects when none is configured.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{SimulatedConfig, SimulatedDecoderFactory};
//! use std::time::Duration;
//!
//! let factory = SimulatedDecoderFactory::new(
//!     SimulatedConfig::default().with_duration(Duration::from_secs(30)),
//! );
//! ```

mod simulated;

pub use simulated::{SimulatedConfig, SimulatedDecoder, SimulatedDecoderFactory};

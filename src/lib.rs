//! Workspace façade crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`, `bridge-desktop`). Host
//! applications can depend on `audiofile-workspace` and enable the documented
//! features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
#[cfg(any(feature = "desktop-shims", feature = "playback-only"))]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_service as service;

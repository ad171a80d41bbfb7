//! # Core Configuration Module
//!
//! Builder for [`CoreConfig`], the set of capabilities and settings a
//! playback service is started with.
//!
//! ## Required Capabilities
//!
//! - `DecoderFactory` - creates one platform decoder per audio source
//!
//! When the `desktop-shims` feature is enabled and no factory is supplied,
//! the desktop `SimulatedDecoderFactory` is injected. Without the feature a
//! missing factory fails fast with [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .decoder_factory(Arc::new(MyPlatformDecoders::new()))
//!     .event_buffer_size(512)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::{EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use bridge_traits::decoder::DecoderFactory;
use std::fmt;
use std::sync::Arc;

/// Largest accepted event buffer. Larger buffers only hide a stalled
/// subscriber.
pub const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Capabilities and settings for a playback service.
#[derive(Clone)]
pub struct CoreConfig {
    /// Creates decoders for track sources.
    pub decoder_factory: Arc<dyn DecoderFactory>,
    /// Bus every controller emits through. Hosts may share one bus between
    /// several services.
    pub event_bus: EventBus,
    /// Per-subscriber buffer of a bus created by the builder.
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("decoder_factory", &"<dyn DecoderFactory>")
            .field("event_bus", &self.event_bus)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks settings that the builder cannot enforce by construction.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_decoder_factory() -> Result<Arc<dyn DecoderFactory>> {
    use bridge_desktop::SimulatedDecoderFactory;

    let factory: Arc<dyn DecoderFactory> = Arc::new(SimulatedDecoderFactory::default());
    Ok(factory)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_decoder_factory() -> Result<Arc<dyn DecoderFactory>> {
    Err(Error::CapabilityMissing {
        capability: "DecoderFactory".to_string(),
        message: "A DecoderFactory is required to create platform decoders. \
                 Desktop: enable the 'desktop-shims' feature to use the simulated decoder. \
                 Mobile: inject the platform decoder factory (ExoPlayer/AVAudioPlayer)."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    decoder_factory: Option<Arc<dyn DecoderFactory>>,
    event_bus: Option<EventBus>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the platform decoder factory.
    pub fn decoder_factory(mut self, factory: Arc<dyn DecoderFactory>) -> Self {
        self.decoder_factory = Some(factory);
        self
    }

    /// Uses an existing bus instead of creating one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Buffer size of the bus created by [`build`](Self::build).
    /// Ignored when a bus is supplied.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no decoder factory is available
    /// - [`Error::Config`] for out-of-range settings
    pub fn build(self) -> Result<CoreConfig> {
        let decoder_factory = match self.decoder_factory {
            Some(factory) => factory,
            None => provide_default_decoder_factory()?,
        };

        let event_buffer_size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);

        let config = CoreConfig {
            decoder_factory,
            event_bus: self
                .event_bus
                .unwrap_or_else(|| EventBus::new(event_buffer_size)),
            event_buffer_size,
        };

        config.validate()?;

        Ok(config)
    }
}

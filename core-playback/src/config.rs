//! # Controller Configuration
//!
//! Tunables shared by every controller of a playback service.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest accepted polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest accepted polling interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Playback controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between position reports while playing.
    ///
    /// Default: 250 ms (about four reports per second).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Prepare the active decoder as soon as the controller is created
    /// instead of on the first `play()`.
    ///
    /// Default: true.
    #[serde(default = "default_eager_prepare")]
    pub eager_prepare: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            eager_prepare: default_eager_prepare(),
        }
    }
}

impl ControllerConfig {
    /// Frequent position reports for scrubbing UIs.
    pub fn responsive() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    /// Sparse position reports and lazy preparation for background or
    /// battery-sensitive playback.
    pub fn low_power() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            eager_prepare: false,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(PlaybackError::InvalidConfig(format!(
                "poll_interval must be at least {:?}",
                MIN_POLL_INTERVAL
            )));
        }

        if self.poll_interval > MAX_POLL_INTERVAL {
            return Err(PlaybackError::InvalidConfig(format!(
                "poll_interval must not exceed {:?}",
                MAX_POLL_INTERVAL
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_eager_prepare() -> bool {
    true
}

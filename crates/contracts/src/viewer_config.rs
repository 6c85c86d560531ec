//! Viewer configuration contracts shared by the loader, the core and the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ViewerConfig {
    /// Procedure namespace, e.g. `livetiming.service`
    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    /// Live delay settings
    #[serde(default)]
    #[validate(nested)]
    pub delay: DelayConfig,

    /// Recorded session playback settings
    #[serde(default)]
    #[validate(nested)]
    pub playback: PlaybackConfig,

    /// Synthetic system message settings
    #[serde(default)]
    #[validate(nested)]
    pub messages: SystemMessageConfig,
}

fn default_namespace() -> String {
    "livetiming.service".to_string()
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            delay: DelayConfig::default(),
            playback: PlaybackConfig::default(),
            messages: SystemMessageConfig::default(),
        }
    }
}

/// Delay buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DelayConfig {
    /// Release tick cadence in milliseconds
    #[validate(range(min = 1))]
    pub release_interval_ms: u64,
    /// Largest delay a user may select
    #[validate(range(min = 1))]
    pub max_seconds: u32,
    /// Delay applied when a live service is chosen
    pub initial_seconds: u32,
}

impl DelayConfig {
    pub fn release_interval(&self) -> Duration {
        Duration::from_millis(self.release_interval_ms)
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            release_interval_ms: 1000,
            max_seconds: 300,
            initial_seconds: 0,
        }
    }
}

/// Playback scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Ticker cadence in milliseconds
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,
    /// Virtual seconds advanced per step; a step is due after the same
    /// amount of wall time
    #[validate(range(min = 1))]
    pub step_seconds: u32,
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(u64::from(self.step_seconds))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            step_seconds: 10,
        }
    }
}

/// Category and type of locally generated messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SystemMessageConfig {
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub message_type: String,
}

impl Default for SystemMessageConfig {
    fn default() -> Self {
        Self {
            category: "System".to_string(),
            message_type: "system".to_string(),
        }
    }
}

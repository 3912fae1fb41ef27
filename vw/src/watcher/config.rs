//! Watcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the VersionWatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms", rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Run the first check immediately instead of after one interval
    #[serde(default = "default_immediate")]
    pub immediate: bool,

    /// Maximum number of checks; negative means unbounded
    #[serde(default = "default_max_checks", rename = "max-checks")]
    pub max_checks: i64,

    /// Coordination channel name
    #[serde(default = "default_channel_name", rename = "channel-name")]
    pub channel_name: String,
}

fn default_poll_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_immediate() -> bool {
    true
}

fn default_max_checks() -> i64 {
    -1
}

fn default_channel_name() -> String {
    "version-watch".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            immediate: default_immediate(),
            max_checks: default_max_checks(),
            channel_name: default_channel_name(),
        }
    }
}

impl WatcherConfig {
    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Iteration bound for the poll loop; `None` when unbounded.
    pub fn max_iterations(&self) -> Option<u32> {
        u32::try_from(self.max_checks).ok()
    }
}

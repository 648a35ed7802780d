//! Cache and loader configuration.

use crate::ConfigError;
use std::time::Duration;

/// Configuration shared by the store, sequencer and loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cached entities younger than this are served without a fetch.
    pub freshness_threshold: Duration,
    /// Window used to collapse bursts of task-cluster requests.
    pub cluster_debounce: Duration,
    /// Maximum number of cluster points requested.
    pub cluster_points: u32,
    /// When false, task-cluster requests resolve with nothing.
    pub clusters_enabled: bool,
    /// When false, ancillary fetches (project, comments, actions) are skipped.
    pub follow_ups_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_threshold: Duration::from_secs(60),
            cluster_debounce: Duration::from_millis(800),
            cluster_points: 25,
            clusters_enabled: true,
            follow_ups_enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_freshness_threshold(mut self, threshold: Duration) -> Self {
        self.freshness_threshold = threshold;
        self
    }

    pub fn with_cluster_debounce(mut self, window: Duration) -> Self {
        self.cluster_debounce = window;
        self
    }

    pub fn with_cluster_points(mut self, points: u32) -> Self {
        self.cluster_points = points;
        self
    }

    pub fn with_clusters_enabled(mut self, enabled: bool) -> Self {
        self.clusters_enabled = enabled;
        self
    }

    pub fn with_follow_ups(mut self, enabled: bool) -> Self {
        self.follow_ups_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster_points".to_string(),
                value: self.cluster_points.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

//! Stream synchronizer configuration

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncEngineConfig {
    /// Frame backlog above which a waiting frame is released unpaired
    #[serde(default = "default_frame_queue_limit")]
    pub frame_queue_limit: usize,

    /// Gaze backlog above which the oldest samples are dropped
    #[serde(default = "default_gaze_queue_limit")]
    pub gaze_queue_limit: usize,

    /// Largest timestamp difference treated as simultaneous, seconds
    #[serde(default = "default_tolerance")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub tolerance: f64,

    /// Consumer polling cadence, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1, max = 1000))]
    pub poll_interval_ms: u64,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            frame_queue_limit: default_frame_queue_limit(),
            gaze_queue_limit: default_gaze_queue_limit(),
            tolerance: default_tolerance(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_frame_queue_limit() -> usize {
    20
}

fn default_gaze_queue_limit() -> usize {
    200
}

fn default_tolerance() -> f64 {
    0.005
}

fn default_poll_interval_ms() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncEngineConfig::default();
        assert_eq!(config.frame_queue_limit, 20);
        assert_eq!(config.gaze_queue_limit, 200);
        assert_eq!(config.tolerance, 0.005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        let config = SyncEngineConfig {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: SyncEngineConfig = serde_json::from_str(r#"{"tolerance": 0.01}"#).unwrap();
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.frame_queue_limit, 20);
    }
}

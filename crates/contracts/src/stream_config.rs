//! Construction parameters for the two producer streams

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Video transport parameters, passed to the remote server at launch
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VideoStreamConfig {
    /// Longest output dimension in pixels (0 = device native)
    #[serde(default)]
    pub max_size: u32,

    /// Target encoder bitrate in bits per second
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,

    /// Frame-rate cap (0 = uncapped)
    #[serde(default)]
    pub max_fps: u32,

    /// Total budget for opening the video tunnel, milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Delay between tunnel-open attempts, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Ask the server to prefix every packet with a 12-byte PTS/length header
    #[serde(default = "default_true")]
    pub send_frame_meta: bool,

    /// Device encoder name (server default when unset)
    #[serde(default)]
    pub encoder_name: Option<String>,

    /// Video codec requested from the server
    #[serde(default)]
    pub codec: Option<VideoCodecName>,

    /// Crop region `width:height:x:y`
    #[serde(default)]
    pub crop: Option<String>,

    /// Keep the device awake while mirroring
    #[serde(default)]
    pub stay_awake: bool,

    /// Control-channel round trips used for the clock-offset estimate
    #[serde(default = "default_offset_samples")]
    #[validate(range(min = 1, max = 10000))]
    pub offset_samples: u32,

    /// Server protocol version passed on the command line
    #[serde(default = "default_server_version")]
    #[validate(length(min = 1))]
    pub server_version: String,
}

impl Default for VideoStreamConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            bit_rate: default_bit_rate(),
            max_fps: 0,
            connection_timeout_ms: default_connection_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            send_frame_meta: true,
            encoder_name: None,
            codec: None,
            crop: None,
            stay_awake: false,
            offset_samples: default_offset_samples(),
            server_version: default_server_version(),
        }
    }
}

impl VideoStreamConfig {
    /// Number of tunnel-open attempts allowed by the timeout
    pub fn connect_attempts(&self) -> u64 {
        self.connection_timeout_ms / self.poll_interval_ms.max(1)
    }
}

fn default_bit_rate() -> u32 {
    8_000_000
}

fn default_connection_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_offset_samples() -> u32 {
    100
}

fn default_server_version() -> String {
    "2.7".to_string()
}

fn default_true() -> bool {
    true
}

/// Codecs the mirroring server can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodecName {
    H264,
    H265,
    Av1,
}

impl VideoCodecName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Av1 => "av1",
        }
    }
}

/// Where gaze samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeSourceKind {
    /// Synthetic samples on the local clock
    #[default]
    Mock,
    /// Newline-delimited JSON samples over TCP
    JsonLines,
}

/// Gaze stream parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GazeConfig {
    #[serde(default)]
    pub source: GazeSourceKind,

    /// `host:port` of the sample feed
    #[serde(default)]
    pub address: Option<String>,

    /// Sample rate of the mock source
    #[serde(default = "default_gaze_rate_hz")]
    #[validate(range(min = 1.0, max = 2000.0))]
    pub rate_hz: f64,

    /// Clock offset reported by the source, milliseconds
    #[serde(default)]
    pub offset_ms: f64,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            source: GazeSourceKind::Mock,
            address: None,
            rate_hz: default_gaze_rate_hz(),
            offset_ms: 0.0,
        }
    }
}

fn default_gaze_rate_hz() -> f64 {
    200.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_defaults() {
        let config = VideoStreamConfig::default();
        assert_eq!(config.bit_rate, 8_000_000);
        assert_eq!(config.connection_timeout_ms, 5000);
        assert!(config.send_frame_meta);
        assert_eq!(config.connect_attempts(), 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_offset_samples_rejected() {
        let config = VideoStreamConfig {
            offset_samples: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_codec_name_deserializes_lowercase() {
        let codec: VideoCodecName = serde_json::from_str("\"h265\"").unwrap();
        assert_eq!(codec, VideoCodecName::H265);
        assert_eq!(codec.as_str(), "h265");
    }
}

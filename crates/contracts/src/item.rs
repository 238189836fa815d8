//! Timestamped stream items
//!
//! The two payload kinds that travel through the ingestion queues, plus the
//! coded units that precede decoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An item paired with its offset-corrected local timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedItem<T> {
    /// Local wall-clock time in seconds
    pub timestamp: f64,

    /// Stream payload
    pub payload: T,
}

impl<T> TimestampedItem<T> {
    pub fn new(timestamp: f64, payload: T) -> Self {
        Self { timestamp, payload }
    }

    /// Absolute time difference to another item, in seconds
    #[inline]
    pub fn delta(&self, other_timestamp: f64) -> f64 {
        (self.timestamp - other_timestamp).abs()
    }
}

/// Queued video frame
pub type FrameItem = TimestampedItem<VideoFrame>;

/// Queued gaze sample
pub type GazeItem = TimestampedItem<GazeSample>;

/// Layout of [`VideoFrame::data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// Packed 8-bit BGR, `width * height * 3` bytes
    Bgr24,
    /// Packed 8-bit RGB, `width * height * 3` bytes
    Rgb24,
    /// Still-compressed access unit (Annex-B), left for a downstream decoder
    Coded,
}

/// Decoded (or pass-through) video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub data: Bytes,
}

impl VideoFrame {
    /// Whether `data` holds raster pixels
    pub fn is_raster(&self) -> bool {
        !matches!(self.format, FrameFormat::Coded)
    }
}

/// One coded unit produced by a codec parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedPacket {
    /// Annex-B bytes including the start code
    pub data: Bytes,

    /// NAL unit type, if the packet carries one
    pub nal_type: Option<u8>,

    /// Independently decodable unit
    pub keyframe: bool,
}

/// Gaze sample as produced by the eye tracker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// Tracker clock, unix seconds
    pub timestamp_unix_seconds: f64,

    /// Gaze point in scene-camera pixels
    pub x: f64,
    pub y: f64,

    /// Whether the headset is being worn
    #[serde(default = "default_worn")]
    pub worn: bool,
}

fn default_worn() -> bool {
    true
}

/// Information read during the video handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeInfo {
    /// Device name, NUL padding trimmed
    pub device_name: String,

    /// Initial video width
    pub width: u16,

    /// Initial video height
    pub height: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_delta_is_symmetric() {
        let item = TimestampedItem::new(1.0, ());
        assert!((item.delta(1.002) - 0.002).abs() < 1e-12);
        assert!((item.delta(0.998) - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_gaze_sample_worn_defaults_true() {
        let json = r#"{"timestamp_unix_seconds": 12.5, "x": 1.0, "y": 2.0}"#;
        let sample: GazeSample = serde_json::from_str(json).unwrap();
        assert!(sample.worn);
        assert_eq!(sample.timestamp_unix_seconds, 12.5);
    }

    #[test]
    fn test_coded_frame_is_not_raster() {
        let frame = VideoFrame {
            width: 4,
            height: 2,
            format: FrameFormat::Coded,
            data: Bytes::from_static(&[0, 0, 0, 1, 0x65]),
        };
        assert!(!frame.is_raster());
    }
}

//! FileSink - appends pairs to `pairs.jsonl`, optionally dumping frames
//!
//! Layout under `base_path`:
//!
//! ```text
//! pairs.jsonl
//! frames/00000042.png     raster frames
//! frames/00000043.h264    coded access units
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use contracts::{
    ContractError, DataSink, FrameFormat, GazeSample, MatchOutcome, SyncedPair, VideoFrame,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

const PAIRS_FILE: &str = "pairs.jsonl";
const FRAMES_DIR: &str = "frames";

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub base_path: PathBuf,
    /// Also write the frame of every pair
    pub write_frames: bool,
}

impl FileSinkConfig {
    /// Reads `base_path` (default `./output`) and `write_frames` (default false)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let write_frames = params
            .get("write_frames")
            .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes"));

        Self {
            base_path,
            write_frames,
        }
    }
}

/// One line of `pairs.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRecord {
    pub pair_id: u64,
    /// Wall-clock time the sink wrote the record (RFC 3339)
    pub recorded_at: String,
    pub outcome: Option<MatchOutcome>,
    pub frame_timestamp: Option<f64>,
    pub gaze_timestamp: Option<f64>,
    pub time_delta: Option<f64>,
    pub gaze: Option<GazeSample>,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frame_format: Option<FrameFormat>,
    /// Path of the dumped frame, relative to `base_path`
    pub frame_file: Option<String>,
    pub frame_backlog: usize,
    pub gaze_backlog: usize,
    pub gaze_dropped_total: u64,
}

impl PairRecord {
    fn new(pair: &SyncedPair, frame_file: Option<String>) -> Self {
        let frame = pair.frame.as_ref();
        Self {
            pair_id: pair.pair_id,
            recorded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            outcome: pair.meta.outcome,
            frame_timestamp: frame.map(|f| f.timestamp),
            gaze_timestamp: pair.gaze.as_ref().map(|g| g.timestamp),
            time_delta: pair.meta.time_delta,
            gaze: pair.gaze.as_ref().map(|g| g.payload),
            frame_width: frame.map(|f| f.payload.width),
            frame_height: frame.map(|f| f.payload.height),
            frame_format: frame.map(|f| f.payload.format),
            frame_file,
            frame_backlog: pair.meta.frame_backlog,
            gaze_backlog: pair.meta.gaze_backlog,
            gaze_dropped_total: pair.meta.gaze_dropped_total,
        }
    }
}

/// Sink that persists pairs to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create the output directory and open `pairs.jsonl` for appending
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        if config.write_frames {
            fs::create_dir_all(config.base_path.join(FRAMES_DIR))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.base_path.join(PAIRS_FILE))?;

        Ok(Self {
            name: name.into(),
            config,
            writer: BufWriter::new(file),
        })
    }

    pub fn from_params(name: impl Into<String>, params: &HashMap<String, String>) -> io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    fn write_pair(&mut self, pair: &SyncedPair) -> io::Result<()> {
        let frame_file = match (&pair.frame, self.config.write_frames) {
            (Some(frame), true) => Some(self.save_frame(pair.pair_id, &frame.payload)?),
            _ => None,
        };

        let record = PairRecord::new(pair, frame_file);
        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")
    }

    /// Returns the path relative to `base_path`
    fn save_frame(&self, pair_id: u64, frame: &VideoFrame) -> io::Result<String> {
        let extension = if frame.is_raster() { "png" } else { "h264" };
        let relative = format!("{FRAMES_DIR}/{pair_id:08}.{extension}");
        let path = self.config.base_path.join(&relative);

        match frame.format {
            FrameFormat::Rgb24 => save_png(&path, frame, &frame.data)?,
            FrameFormat::Bgr24 => {
                let mut rgb = frame.data.to_vec();
                for pixel in rgb.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                save_png(&path, frame, &rgb)?
            }
            FrameFormat::Coded => fs::write(&path, &frame.data)?,
        }
        Ok(relative)
    }

    fn persist_pair(&mut self, pair: &SyncedPair) -> Result<(), ContractError> {
        self.write_pair(pair).map_err(|e| {
            error!(sink = %self.name, pair_id = pair.pair_id, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

fn save_png(path: &Path, frame: &VideoFrame, rgb: &[u8]) -> io::Result<()> {
    image::save_buffer(path, rgb, frame.width, frame.height, image::ColorType::Rgb8)
        .map_err(io::Error::other)
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, pair),
        fields(sink = %self.name, pair_id = pair.pair_id)
    )]
    async fn write(&mut self, pair: &SyncedPair) -> Result<(), ContractError> {
        self.persist_pair(pair)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, path = %self.config.base_path.display(), "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{PairMeta, TimestampedItem};
    use tempfile::tempdir;

    fn pair_with_frame(pair_id: u64, format: FrameFormat, data: Vec<u8>) -> SyncedPair {
        SyncedPair {
            pair_id,
            frame: Some(TimestampedItem::new(
                10.0,
                VideoFrame {
                    width: 2,
                    height: 1,
                    format,
                    data: Bytes::from(data),
                },
            )),
            gaze: Some(TimestampedItem::new(
                10.004,
                GazeSample {
                    timestamp_unix_seconds: 10.004,
                    x: 640.0,
                    y: 360.0,
                    worn: true,
                },
            )),
            meta: PairMeta {
                outcome: Some(MatchOutcome::Matched),
                time_delta: Some(0.004),
                frame_backlog: 0,
                gaze_backlog: 3,
                gaze_dropped_total: 0,
            },
        }
    }

    fn config(dir: &Path, write_frames: bool) -> FileSinkConfig {
        FileSinkConfig {
            base_path: dir.to_path_buf(),
            write_frames,
        }
    }

    #[tokio::test]
    async fn test_pairs_are_appended_as_jsonl() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new("disk", config(dir.path(), false)).unwrap();

        sink.write(&pair_with_frame(1, FrameFormat::Coded, vec![0, 0, 0, 1, 0x65]))
            .await
            .unwrap();
        sink.write(&pair_with_frame(2, FrameFormat::Coded, vec![0, 0, 0, 1, 0x41]))
            .await
            .unwrap();
        sink.close().await.unwrap();

        let text = fs::read_to_string(dir.path().join(PAIRS_FILE)).unwrap();
        let records: Vec<PairRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pair_id, 1);
        assert_eq!(records[0].outcome, Some(MatchOutcome::Matched));
        assert_eq!(records[0].gaze.map(|g| g.x), Some(640.0));
        assert_eq!(records[1].frame_file, None);
        assert!(!dir.path().join(FRAMES_DIR).exists());
    }

    #[tokio::test]
    async fn test_bgr_frame_saved_as_rgb_png() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new("disk", config(dir.path(), true)).unwrap();

        // Two pixels: pure blue then pure red, in BGR order.
        let bgr = vec![255, 0, 0, 0, 0, 255];
        sink.write(&pair_with_frame(7, FrameFormat::Bgr24, bgr)).await.unwrap();
        sink.close().await.unwrap();

        let png = image::open(dir.path().join("frames/00000007.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(png.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(png.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[tokio::test]
    async fn test_coded_frame_saved_raw() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new("disk", config(dir.path(), true)).unwrap();

        let unit = vec![0, 0, 0, 1, 0x65, 0x88];
        sink.write(&pair_with_frame(3, FrameFormat::Coded, unit.clone()))
            .await
            .unwrap();
        sink.close().await.unwrap();

        assert_eq!(fs::read(dir.path().join("frames/00000003.h264")).unwrap(), unit);
        let line = fs::read_to_string(dir.path().join(PAIRS_FILE)).unwrap();
        let record: PairRecord = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(record.frame_file.as_deref(), Some("frames/00000003.h264"));
    }

    #[test]
    fn test_config_from_params() {
        let params = HashMap::from([
            ("base_path".to_string(), "/tmp/out".to_string()),
            ("write_frames".to_string(), "true".to_string()),
        ]);
        let config = FileSinkConfig::from_params(&params);
        assert_eq!(config.base_path, PathBuf::from("/tmp/out"));
        assert!(config.write_frames);
        assert!(!FileSinkConfig::from_params(&HashMap::new()).write_frames);
    }
}

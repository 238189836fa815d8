//! Pipeline statistics.

use std::fmt;
use std::time::Duration;

use contracts::HandshakeInfo;
use dispatcher::MetricsSnapshot;
use mirror_client::RecordingSummary;
use observability::SyncMetricsAggregator;
use sync_engine::SyncStats;

/// Why the polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Ctrl-C or SIGTERM
    #[default]
    Signal,
    /// `--max-pairs` reached
    MaxPairs,
    /// `--timeout` elapsed
    Timeout,
    /// The video stream stopped or disconnected
    VideoEnded,
    /// The dispatcher went away
    DispatcherClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signal => "shutdown signal",
            Self::MaxPairs => "pair limit reached",
            Self::Timeout => "timeout",
            Self::VideoEnded => "video stream ended",
            Self::DispatcherClosed => "dispatcher closed",
        })
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Outputs sent to the dispatcher
    pub pairs_dispatched: u64,

    /// Frames that entered the frame queue
    pub frames_received: u64,

    /// Gaze samples that entered the gaze queue
    pub gaze_received: u64,

    pub duration: Duration,

    pub stop_reason: StopReason,

    /// Handshake of the mirrored device
    pub device: Option<HandshakeInfo>,

    pub video_offset_ms: f64,

    pub gaze_offset_ms: f64,

    pub active_sinks: usize,

    /// Synchronizer counters
    pub sync: SyncStats,

    /// Per-pair aggregates
    pub sync_metrics: SyncMetricsAggregator,

    /// Final counters of every sink
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    pub recording: Option<RecordingSummary>,
}

impl PipelineStats {
    /// Dispatched pairs per second
    pub fn pairs_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.pairs_dispatched as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of frames that found a gaze sample, in percent
    pub fn pair_rate(&self) -> f64 {
        let frames = self.sync.frames_emitted();
        if frames > 0 {
            self.sync.pairs() as f64 / frames as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        if let Some(device) = &self.device {
            println!(
                "   ├─ Device: {} ({}x{})",
                device.device_name, device.width, device.height
            );
        }
        println!("   ├─ Stopped by: {}", self.stop_reason);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames received: {}", self.frames_received);
        println!("   ├─ Gaze samples received: {}", self.gaze_received);
        println!("   ├─ Pairs dispatched: {}", self.pairs_dispatched);
        println!("   ├─ Pairs/s: {:.2}", self.pairs_per_second());
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n🕒 Clock Offsets");
        println!("   ├─ Video: {:.3} ms", self.video_offset_ms);
        println!("   └─ Gaze: {:.3} ms", self.gaze_offset_ms);

        println!("\n📈 Synchronizer");
        println!("   ├─ Calls: {}", self.sync.calls);
        println!(
            "   ├─ Paired frames: {} ({:.2}%)",
            self.sync.pairs(),
            self.pair_rate()
        );
        println!("   ├─ Crossed matches: {}", self.sync.crossed);
        println!("   ├─ Released without gaze: {}", self.sync.forced_release);
        println!("   ├─ Gaze ahead of frame: {}", self.sync.gaze_ahead);
        println!("   ├─ Gaze skipped: {}", self.sync.gaze_skipped);
        println!("   └─ Gaze dropped (backpressure): {}", self.sync.gaze_dropped);

        let summary = self.sync_metrics.summary();
        println!("\n📐 Pair Quality");
        println!("   ├─ Delta (ms): {}", summary.delta_ms);
        println!("   ├─ Frame backlog: {}", summary.frame_backlog);
        println!("   └─ Gaze backlog: {}", summary.gaze_backlog);

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, snapshot)) in self.sink_metrics.iter().enumerate() {
                let prefix = if i + 1 == self.sink_metrics.len() {
                    "└─"
                } else {
                    "├─"
                };
                println!("   {} {}: {}", prefix, name, snapshot);
            }
        }

        if let Some(recording) = &self.recording {
            println!("\n🎞  Recording");
            println!("   ├─ File: {}", recording.path.display());
            println!("   └─ Packets: {} ({} bytes)", recording.packets, recording.bytes);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            pairs_dispatched: 50,
            duration: Duration::from_secs(2),
            sync: SyncStats {
                matched: 30,
                crossed: 10,
                forced_release: 5,
                gaze_ahead: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!((stats.pairs_per_second() - 25.0).abs() < 1e-9);
        assert!((stats.pair_rate() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run_rates_are_zero() {
        let stats = PipelineStats::default();
        assert_eq!(stats.pairs_per_second(), 0.0);
        assert_eq!(stats.pair_rate(), 0.0);
        assert_eq!(stats.stop_reason.to_string(), "shutdown signal");
    }
}

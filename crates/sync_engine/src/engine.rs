//! Frame / gaze matching

use contracts::{MatchOutcome, SyncEngineConfig, SyncOutput, TimestampedItem};
use ingestion::{ingestion_queue, IngestionQueue, QueueProducer};
use tracing::{debug, instrument, trace};

use crate::stats::SyncStats;

/// How the comparison loop ended
enum Verdict {
    /// Within tolerance, or `crossed` when the gaze overtook a frame that was ahead
    Match { crossed: bool },
    /// No gaze left to compare against
    FrameWait,
    /// The gaze is later than the frame
    GazeWait,
}

/// Online matcher over two independently-clocked queues
///
/// Pull-driven: each [`next_match`](SyncEngine::next_match) call drains the
/// queues as far as needed and emits at most one frame. Never blocks.
pub struct SyncEngine<F, G> {
    config: SyncEngineConfig,
    frames: IngestionQueue<F>,
    gazes: IngestionQueue<G>,
    frame_producer: QueueProducer<F>,
    gaze_producer: QueueProducer<G>,
    current_frame: Option<TimestampedItem<F>>,
    current_gaze: Option<TimestampedItem<G>>,
    stats: SyncStats,
}

impl<F, G> SyncEngine<F, G> {
    pub fn new(config: SyncEngineConfig) -> Self {
        let (frame_producer, frames) = ingestion_queue("frame");
        let (gaze_producer, gazes) = ingestion_queue("gaze");
        Self {
            config,
            frames,
            gazes,
            frame_producer,
            gaze_producer,
            current_frame: None,
            current_gaze: None,
            stats: SyncStats::default(),
        }
    }

    /// Producer end of the frame queue
    pub fn frame_producer(&self) -> QueueProducer<F> {
        self.frame_producer.clone()
    }

    /// Producer end of the gaze queue
    pub fn gaze_producer(&self) -> QueueProducer<G> {
        self.gaze_producer.clone()
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// `(frames, gaze samples)` still queued, cursors excluded
    pub fn backlog(&self) -> (usize, usize) {
        (self.frames.len(), self.gazes.len())
    }

    pub fn current_frame(&self) -> Option<&TimestampedItem<F>> {
        self.current_frame.as_ref()
    }

    pub fn current_gaze(&self) -> Option<&TimestampedItem<G>> {
        self.current_gaze.as_ref()
    }

    /// Resolve the buffered frame against the gaze stream
    #[instrument(level = "trace", name = "sync_next_match", skip(self))]
    pub fn next_match(&mut self) -> SyncOutput<F, G> {
        if self.current_frame.is_none() {
            self.current_frame = self.frames.pop_front();
        }
        if self.current_gaze.is_none() {
            self.current_gaze = self.gazes.pop_front();
        }

        let mut output = SyncOutput::idle();
        if let Some(frame_ts) = self.current_frame.as_ref().map(|f| f.timestamp) {
            output = match self.compare(frame_ts) {
                Verdict::Match { crossed } => SyncOutput {
                    frame: self.current_frame.take(),
                    gaze: self.current_gaze.take(),
                    outcome: if crossed {
                        MatchOutcome::Crossed
                    } else {
                        MatchOutcome::Matched
                    },
                },
                Verdict::FrameWait => {
                    self.current_gaze = None;
                    if self.frames.len() > self.config.frame_queue_limit {
                        debug!(
                            frame_ts,
                            backlog = self.frames.len(),
                            "frame released unpaired, backlog over limit"
                        );
                        SyncOutput {
                            frame: self.current_frame.take(),
                            gaze: None,
                            outcome: MatchOutcome::ForcedRelease,
                        }
                    } else {
                        trace!(frame_ts, "frame waiting for gaze");
                        SyncOutput {
                            frame: None,
                            gaze: None,
                            outcome: MatchOutcome::FrameWaiting,
                        }
                    }
                }
                Verdict::GazeWait => SyncOutput {
                    frame: self.current_frame.take(),
                    gaze: None,
                    outcome: MatchOutcome::GazeAhead,
                },
            };
        }

        self.apply_gaze_backpressure();
        self.record(&output);
        output
    }

    fn compare(&mut self, frame_ts: f64) -> Verdict {
        let mut was_frame_ahead = false;
        while let Some(gaze_ts) = self.current_gaze.as_ref().map(|g| g.timestamp) {
            if (frame_ts - gaze_ts).abs() < self.config.tolerance {
                return Verdict::Match { crossed: false };
            }
            if frame_ts > gaze_ts {
                trace!(frame_ts, gaze_ts, "gaze behind frame, advancing");
                self.current_gaze = self.gazes.pop_front();
                self.stats.gaze_skipped += 1;
                was_frame_ahead = true;
            } else if was_frame_ahead {
                return Verdict::Match { crossed: true };
            } else {
                return Verdict::GazeWait;
            }
        }
        Verdict::FrameWait
    }

    /// Keep the gaze backlog at or under its limit; the cursor ends up on the last sample popped
    fn apply_gaze_backpressure(&mut self) {
        while self.gazes.len() > self.config.gaze_queue_limit {
            let Some(item) = self.gazes.pop_front() else {
                break;
            };
            if self.current_gaze.replace(item).is_some() {
                self.stats.gaze_dropped += 1;
            }
        }
    }

    fn record(&mut self, output: &SyncOutput<F, G>) {
        self.stats.record(output.outcome);
        metrics::counter!("gaze_sync_sync_outcomes_total", "outcome" => output.outcome.as_str())
            .increment(1);
        if let Some(delta) = output.time_delta() {
            metrics::histogram!("gaze_sync_match_delta_seconds").record(delta);
        }
        let (frame_backlog, gaze_backlog) = self.backlog();
        metrics::gauge!("gaze_sync_backlog", "stream" => "frame").set(frame_backlog as f64);
        metrics::gauge!("gaze_sync_backlog", "stream" => "gaze").set(gaze_backlog as f64);
    }
}

//! Synchronizer output
//!
//! `SyncOutput` is what one `next_match` call yields; `SyncedPair` is the
//! numbered, annotated form handed to the dispatcher.

use serde::{Deserialize, Serialize};

use crate::{FrameItem, GazeItem, TimestampedItem};

/// How a `next_match` call resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// No frame buffered; nothing to resolve
    Idle,
    /// Frame and gaze within tolerance
    Matched,
    /// Gaze overtook a frame that had been ahead (crossing tie-break)
    Crossed,
    /// No usable gaze yet; frame kept for the next call
    FrameWaiting,
    /// No usable gaze and the frame backlog is over its limit; frame released alone
    ForcedRelease,
    /// Gaze is ahead of the frame; frame released alone
    GazeAhead,
}

impl MatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Matched => "matched",
            Self::Crossed => "crossed",
            Self::FrameWaiting => "frame_waiting",
            Self::ForcedRelease => "forced_release",
            Self::GazeAhead => "gaze_ahead",
        }
    }

    /// Outcome that pairs a frame with a gaze sample
    pub fn is_pair(self) -> bool {
        matches!(self, Self::Matched | Self::Crossed)
    }
}

/// Result of one synchronizer call
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutput<F, G> {
    pub frame: Option<TimestampedItem<F>>,
    pub gaze: Option<TimestampedItem<G>>,
    pub outcome: MatchOutcome,
}

impl<F, G> SyncOutput<F, G> {
    pub fn idle() -> Self {
        Self {
            frame: None,
            gaze: None,
            outcome: MatchOutcome::Idle,
        }
    }

    /// Neither a frame nor a gaze sample was emitted
    pub fn is_empty(&self) -> bool {
        self.frame.is_none() && self.gaze.is_none()
    }

    /// `|frame.ts - gaze.ts|` when both are present
    pub fn time_delta(&self) -> Option<f64> {
        match (&self.frame, &self.gaze) {
            (Some(frame), Some(gaze)) => Some(frame.delta(gaze.timestamp)),
            _ => None,
        }
    }
}

/// Diagnostics attached to every dispatched pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairMeta {
    /// How the synchronizer resolved this output
    pub outcome: Option<MatchOutcome>,

    /// `|frame.ts - gaze.ts|` in seconds, for paired outputs
    pub time_delta: Option<f64>,

    /// Frames still queued after the call
    pub frame_backlog: usize,

    /// Gaze samples still queued after the call
    pub gaze_backlog: usize,

    /// Gaze samples discarded by backpressure so far
    pub gaze_dropped_total: u64,
}

/// Numbered synchronizer output sent to sinks
#[derive(Debug, Clone)]
pub struct SyncedPair {
    /// Monotonically increasing output number
    pub pair_id: u64,

    pub frame: Option<FrameItem>,

    pub gaze: Option<GazeItem>,

    pub meta: PairMeta,
}

impl SyncedPair {
    /// Timestamp of the frame, or of the gaze sample for gaze-only pairs
    pub fn timestamp(&self) -> Option<f64> {
        self.frame
            .as_ref()
            .map(|f| f.timestamp)
            .or_else(|| self.gaze.as_ref().map(|g| g.timestamp))
    }
}

//! Running synchronizer counters

use contracts::MatchOutcome;

/// Totals since the engine was created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// `next_match` calls
    pub calls: u64,
    pub idle: u64,
    pub matched: u64,
    pub crossed: u64,
    pub frame_waiting: u64,
    pub forced_release: u64,
    pub gaze_ahead: u64,
    /// Gaze samples passed over while catching up to a frame
    pub gaze_skipped: u64,
    /// Gaze samples discarded by backpressure
    pub gaze_dropped: u64,
}

impl SyncStats {
    pub(crate) fn record(&mut self, outcome: MatchOutcome) {
        self.calls += 1;
        let slot = match outcome {
            MatchOutcome::Idle => &mut self.idle,
            MatchOutcome::Matched => &mut self.matched,
            MatchOutcome::Crossed => &mut self.crossed,
            MatchOutcome::FrameWaiting => &mut self.frame_waiting,
            MatchOutcome::ForcedRelease => &mut self.forced_release,
            MatchOutcome::GazeAhead => &mut self.gaze_ahead,
        };
        *slot += 1;
    }

    /// Outputs that carried a frame
    pub fn frames_emitted(&self) -> u64 {
        self.matched + self.crossed + self.forced_release + self.gaze_ahead
    }

    /// Outputs that carried a frame and a gaze sample
    pub fn pairs(&self) -> u64 {
        self.matched + self.crossed
    }
}

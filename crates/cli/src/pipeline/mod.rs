//! Pipeline orchestration module.

mod orchestrator;
mod sources;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use sources::MockVideo;
pub use stats::{PipelineStats, StopReason};

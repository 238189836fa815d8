//! # Sync Engine
//!
//! 视频帧与注视样本的在线配对。
//!
//! 负责：
//! - 从两个摄取队列拉取数据，每次调用最多输出一帧
//! - 容差窗口内配对，以及"交叉"配对规则
//! - 帧积压超限时强制释放
//! - 注视队列丢弃最旧样本
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{SyncEngine, SyncEngineConfig};
//!
//! let mut engine: SyncEngine<VideoFrame, GazeSample> = SyncEngine::new(SyncEngineConfig::default());
//! let frames = engine.frame_producer();
//! let gazes = engine.gaze_producer();
//!
//! // hand the producers to the stream bridges, then poll
//! let output = engine.next_match();
//! if !output.is_empty() {
//!     // dispatch
//! }
//! ```

mod engine;
mod stats;

pub use engine::SyncEngine;
pub use stats::SyncStats;

pub use contracts::{MatchOutcome, SyncEngineConfig, SyncOutput};

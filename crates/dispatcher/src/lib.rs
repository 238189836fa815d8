//! # Dispatcher
//!
//! 配对结果分发模块。
//!
//! 负责：
//! - 消费 `SyncedPair`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞轮询主循环

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, SyncedPair};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, PairRecord};

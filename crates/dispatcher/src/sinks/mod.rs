//! Sink implementations

mod file;
mod log;

pub use self::file::{FileSink, FileSinkConfig, PairRecord};
pub use self::log::LogSink;

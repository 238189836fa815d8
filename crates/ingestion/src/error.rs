//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 队列消费端已关闭
    #[error("ingestion queue for {stream} is closed")]
    ChannelClosed {
        /// 流名称
        stream: String,
    },

    /// 客户端已启动
    #[error("gaze client for {source_name} is already started")]
    AlreadyStarted {
        /// 数据源名称
        source_name: String,
    },

    /// 接收线程 panic
    #[error("gaze receive thread panicked")]
    ThreadPanicked,

    /// 数据源错误
    #[error(transparent)]
    Source(#[from] ContractError),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn channel_closed(stream: impl Into<String>) -> Self {
        Self::ChannelClosed {
            stream: stream.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

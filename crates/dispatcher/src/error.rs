//! Dispatcher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened
    #[error("cannot open {sink_type} sink '{name}': {message}")]
    SinkCreation {
        name: String,
        sink_type: String,
        message: String,
    },

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_creation(
        name: impl Into<String>,
        sink_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SinkCreation {
            name: name.into(),
            sink_type: sink_type.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatcherError>;

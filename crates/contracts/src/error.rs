//! Errors shared by every crate in the pipeline

use thiserror::Error;

/// Failure anywhere between the session file and a sink
#[derive(Debug, Error)]
pub enum ContractError {
    /// Session file could not be decoded
    #[error("cannot parse session config: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Session file decoded but a value is out of range
    #[error("invalid session config at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Tunnel could not be opened, handshake mismatch, or the stream socket failed
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Control-channel response did not follow the protocol
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Gaze source failure
    #[error("gaze source '{source_name}' error: {message}")]
    GazeSource {
        source_name: String,
        message: String,
    },

    /// A sink rejected a pair
    #[error("sink '{sink_name}' failed to write: {message}")]
    SinkWrite { sink_name: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec and miscellaneous failures
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn gaze_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GazeSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

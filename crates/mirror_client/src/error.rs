//! Mirror client error types

use contracts::{ConnectionState, ContractError};
use thiserror::Error;

/// Errors raised while bootstrapping or streaming from the device
#[derive(Debug, Error)]
pub enum MirrorClientError {
    /// Tunnel not reachable, handshake mismatch, or the video socket failed
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Control-channel reply did not follow the protocol
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Pushing or launching the device-side server failed
    #[error("server deployment failed: {message}")]
    Server { message: String },

    /// Codec rejected a chunk or a packet
    #[error("codec '{codec}' error: {message}")]
    Codec { codec: String, message: String },

    /// Operation not allowed in the current lifecycle state
    #[error("operation '{operation}' not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// `start` or `run_blocking` was called twice
    #[error("client already started")]
    AlreadyStarted,

    /// Streaming thread panicked
    #[error("video stream thread panicked")]
    ThreadPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl MirrorClientError {
    /// Create connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create server deployment error
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create codec error
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// True for failures of the video transport itself
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<MirrorClientError> for ContractError {
    fn from(err: MirrorClientError) -> Self {
        match err {
            MirrorClientError::Connection { message } => ContractError::Connection { message },
            MirrorClientError::Protocol { message } => ContractError::Protocol { message },
            MirrorClientError::Io(e) => ContractError::Io(e),
            MirrorClientError::Contract(e) => e,
            other => ContractError::Other(other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, MirrorClientError>;

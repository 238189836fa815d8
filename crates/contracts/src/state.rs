//! Connection lifecycle of a stream client

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle state
///
/// `Idle → Connecting → Handshaking → Streaming → Stopped`, with `Disconnected`
/// as a second terminal state reached from `Streaming` on I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Handshaking = 2,
    Streaming = 3,
    Stopped = 4,
    Disconnected = 5,
}

impl ConnectionState {
    /// Whether the instance can never stream again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Disconnected)
    }

    /// One-directional transition table
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Idle, Connecting) | (Connecting, Handshaking) | (Handshaking, Streaming) => true,
            (Streaming, Disconnected) => true,
            (from, Stopped) => !from.is_terminal(),
            _ => false,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Handshaking,
            3 => Self::Streaming,
            4 => Self::Stopped,
            _ => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Atomically shared [`ConnectionState`]
#[derive(Debug)]
pub struct ConnectionStateCell(AtomicU8);

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self(AtomicU8::new(ConnectionState::Idle as u8))
    }
}

impl ConnectionStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` if the transition is legal; returns the previous state on success
    pub fn advance(&self, next: ConnectionState) -> Option<ConnectionState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                ConnectionState::from_u8(raw)
                    .can_transition_to(next)
                    .then_some(next as u8)
            })
            .ok()
            .map(ConnectionState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let cell = ConnectionStateCell::new();
        assert_eq!(cell.advance(ConnectionState::Connecting), Some(ConnectionState::Idle));
        assert!(cell.advance(ConnectionState::Handshaking).is_some());
        assert!(cell.advance(ConnectionState::Streaming).is_some());
        assert!(cell.advance(ConnectionState::Stopped).is_some());
        assert_eq!(cell.get(), ConnectionState::Stopped);
    }

    #[test]
    fn test_terminal_states_do_not_restart() {
        let cell = ConnectionStateCell::new();
        cell.advance(ConnectionState::Stopped);
        assert!(cell.advance(ConnectionState::Connecting).is_none());
        assert!(cell.advance(ConnectionState::Stopped).is_none());
        assert_eq!(cell.get(), ConnectionState::Stopped);
    }

    #[test]
    fn test_disconnected_only_from_streaming() {
        assert!(!ConnectionState::Handshaking.can_transition_to(ConnectionState::Disconnected));
        assert!(ConnectionState::Streaming.can_transition_to(ConnectionState::Disconnected));
        assert!(!ConnectionState::Disconnected.can_transition_to(ConnectionState::Stopped));
    }

    #[test]
    fn test_no_backwards_transition() {
        assert!(!ConnectionState::Streaming.can_transition_to(ConnectionState::Connecting));
        assert!(!ConnectionState::Handshaking.can_transition_to(ConnectionState::Idle));
    }
}

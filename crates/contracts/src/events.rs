//! Stream events and the per-kind subscriber registry
//!
//! Each stream kind has a closed event enum plus a field-less `*Kind`
//! discriminant that listeners register against.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::{CodedPacket, GazeSample, HandshakeInfo, VideoFrame};

/// Event with a discriminant usable as a subscription key
pub trait StreamEvent {
    type Kind: Copy + Eq + Hash + Send + Sync + std::fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Video transport event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoEventKind {
    Init,
    Frame,
    Packet,
    Disconnect,
}

/// Video transport events
#[derive(Debug, Clone)]
pub enum VideoEvent {
    /// Handshake completed
    Init(HandshakeInfo),

    /// Decoded frame, `pts` in device-clock seconds (0.0 without frame metadata)
    Frame { frame: VideoFrame, pts: f64 },

    /// Coded packet with its local sequence number
    Packet { packet: CodedPacket, sequence: u64 },

    /// Stream failed while alive
    Disconnect,
}

impl StreamEvent for VideoEvent {
    type Kind = VideoEventKind;

    fn kind(&self) -> VideoEventKind {
        match self {
            Self::Init(_) => VideoEventKind::Init,
            Self::Frame { .. } => VideoEventKind::Frame,
            Self::Packet { .. } => VideoEventKind::Packet,
            Self::Disconnect => VideoEventKind::Disconnect,
        }
    }
}

/// Gaze stream event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GazeEventKind {
    Sample,
}

/// Gaze stream events
#[derive(Debug, Clone)]
pub enum GazeEvent {
    Sample(GazeSample),
}

impl StreamEvent for GazeEvent {
    type Kind = GazeEventKind;

    fn kind(&self) -> GazeEventKind {
        match self {
            Self::Sample(_) => GazeEventKind::Sample,
        }
    }
}

/// Listener callback
///
/// Invoked on the producing stream's thread; keep it short.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`Subscribers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-kind listener registry
///
/// Listeners for one kind run in registration order. The registry can be
/// mutated from any thread, including from inside a listener.
pub struct Subscribers<E: StreamEvent> {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<E::Kind, Vec<(ListenerId, Listener<E>)>>>,
}

impl<E: StreamEvent> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<E: StreamEvent> Subscribers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`
    pub fn subscribe(&self, kind: E::Kind, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.lock();
        listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Remove a listener; returns false when it was not registered for `kind`
    pub fn unsubscribe(&self, kind: E::Kind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    /// Number of listeners registered for `kind`
    pub fn count(&self, kind: E::Kind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every listener of its kind
    pub fn publish(&self, event: &E) {
        // Snapshot so listeners may (un)subscribe without deadlocking.
        let snapshot: Vec<Listener<E>> = self
            .lock()
            .get(&event.kind())
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in snapshot {
            listener(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<E::Kind, Vec<(ListenerId, Listener<E>)>>> {
        // A panicking listener never runs under this lock, so poisoning is benign.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

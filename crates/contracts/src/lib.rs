//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: data items,
//! stream events, capability traits and configuration structures.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Every queued item carries local wall-clock time (seconds, f64)
//! - Device and tracker timestamps are translated with a per-stream [`ClockOffset`]
//!   (milliseconds) before they enter an ingestion queue

mod blueprint;
mod capabilities;
mod clock;
mod error;
mod events;
mod item;
mod sink;
mod state;
mod stream_config;
mod sync;
mod sync_engine_config;

pub use blueprint::*;
pub use capabilities::*;
pub use clock::{unix_time_ms, unix_time_s, ClockOffset};
pub use error::*;
pub use events::*;
pub use item::*;
pub use sink::*;
pub use state::{ConnectionState, ConnectionStateCell};
pub use stream_config::*;
pub use sync::*;
pub use sync_engine_config::*;

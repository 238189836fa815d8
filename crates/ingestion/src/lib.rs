//! # Ingestion
//!
//! Moves items from the two stream clients into the synchronizer.
//!
//! Responsibilities:
//! - Unbounded FIFO queues with a cloneable producer end
//! - Offset-correcting listeners from stream events into those queues
//! - Gaze stream client over the `GazeSource` capability
//! - Mock and JSON-lines gaze sources
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{gaze_listener, ingestion_queue, GazeStreamClient, MockGazeSource};
//! use contracts::GazeEventKind;
//!
//! let (producer, queue) = ingestion_queue("gaze");
//! let client = GazeStreamClient::new(Arc::new(MockGazeSource::new(Default::default())));
//! client.subscribe(GazeEventKind::Sample, gaze_listener(producer, client.offset()));
//! client.start()?;
//! ```

mod bridge;
mod counters;
mod error;
mod gaze_client;
mod jsonl;
mod mock;
mod queue;

pub use bridge::{frame_listener, gaze_listener};
pub use counters::{IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use gaze_client::{GazeStreamClient, GAZE_THREAD_NAME};
pub use jsonl::{parse_line, JsonLinesGazeSource};
pub use mock::{MockGazeConfig, MockGazeSource};
pub use queue::{ingestion_queue, IngestionQueue, QueueProducer};

//! Unbounded FIFO hand-off between a producer thread and the synchronizer

use std::sync::Arc;

use async_channel::{unbounded, Receiver, Sender, TryRecvError};
use contracts::TimestampedItem;
use metrics::{counter, gauge};
use tracing::trace;

use crate::error::{IngestionError, Result};
use crate::counters::IngestionMetrics;

/// Create a connected producer / queue pair for `stream`
pub fn ingestion_queue<T>(stream: &'static str) -> (QueueProducer<T>, IngestionQueue<T>) {
    let (tx, rx) = unbounded();
    let metrics = Arc::new(IngestionMetrics::new());
    (
        QueueProducer {
            stream,
            tx,
            metrics: Arc::clone(&metrics),
        },
        IngestionQueue {
            stream,
            rx,
            metrics,
        },
    )
}

/// Tail end of an ingestion queue; cheap to clone
pub struct QueueProducer<T> {
    stream: &'static str,
    tx: Sender<TimestampedItem<T>>,
    metrics: Arc<IngestionMetrics>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream,
            tx: self.tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> QueueProducer<T> {
    /// Append at the tail; fails only when the queue has been dropped
    pub fn push(&self, item: TimestampedItem<T>) -> Result<()> {
        let timestamp = item.timestamp;
        match self.tx.try_send(item) {
            Ok(()) => {
                self.metrics.record_received();
                let len = self.tx.len();
                self.metrics.update_queue_len(len);
                counter!("gaze_sync_items_received_total", "stream" => self.stream).increment(1);
                gauge!("gaze_sync_queue_depth", "stream" => self.stream).set(len as f64);
                trace!(stream = self.stream, timestamp, "item enqueued");
                Ok(())
            }
            Err(_) => {
                self.metrics.record_dropped();
                counter!("gaze_sync_items_dropped_total", "stream" => self.stream).increment(1);
                Err(IngestionError::channel_closed(self.stream))
            }
        }
    }

    pub fn stream(&self) -> &'static str {
        self.stream
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// Head end of an ingestion queue, owned by the synchronizer
pub struct IngestionQueue<T> {
    stream: &'static str,
    rx: Receiver<TimestampedItem<T>>,
    metrics: Arc<IngestionMetrics>,
}

impl<T> IngestionQueue<T> {
    /// Remove the head without blocking
    pub fn pop_front(&mut self) -> Option<TimestampedItem<T>> {
        match self.rx.try_recv() {
            Ok(item) => {
                self.metrics.update_queue_len(self.rx.len());
                Some(item)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn stream(&self) -> &'static str {
        self.stream
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }
}

//! Event → queue bridges
//!
//! Listeners that stamp each item with `device time + offset` and push it
//! into an ingestion queue. The offset is read at enqueue time.

use std::sync::Arc;

use contracts::{ClockOffset, GazeEvent, GazeSample, Listener, TimestampedItem, VideoEvent, VideoFrame};
use tracing::debug;

use crate::queue::QueueProducer;

/// Listener for `VideoEventKind::Frame`
pub fn frame_listener(
    producer: QueueProducer<VideoFrame>,
    offset: Arc<ClockOffset>,
) -> Listener<VideoEvent> {
    Arc::new(move |event: &VideoEvent| {
        if let VideoEvent::Frame { frame, pts } = event {
            let timestamp = pts + offset.seconds();
            if let Err(e) = producer.push(TimestampedItem::new(timestamp, frame.clone())) {
                debug!(error = %e, "frame dropped");
            }
        }
    })
}

/// Listener for `GazeEventKind::Sample`
pub fn gaze_listener(
    producer: QueueProducer<GazeSample>,
    offset: Arc<ClockOffset>,
) -> Listener<GazeEvent> {
    Arc::new(move |event: &GazeEvent| {
        let GazeEvent::Sample(sample) = event;
        let timestamp = sample.timestamp_unix_seconds + offset.seconds();
        if let Err(e) = producer.push(TimestampedItem::new(timestamp, *sample)) {
            debug!(error = %e, "gaze sample dropped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ingestion_queue;
    use bytes::Bytes;
    use contracts::FrameFormat;

    #[test]
    fn test_frame_timestamp_includes_offset() {
        let (tx, mut rx) = ingestion_queue("frame");
        let offset = Arc::new(ClockOffset::new(250.0));
        let listener = frame_listener(tx, Arc::clone(&offset));

        let frame = VideoFrame {
            width: 2,
            height: 2,
            format: FrameFormat::Coded,
            data: Bytes::from_static(&[1, 2, 3]),
        };
        listener(&VideoEvent::Frame {
            frame: frame.clone(),
            pts: 10.0,
        });
        listener(&VideoEvent::Disconnect);

        // offset changes are picked up by later items
        offset.set_ms(-500.0);
        listener(&VideoEvent::Frame { frame, pts: 10.0 });

        let first = rx.pop_front().unwrap();
        assert!((first.timestamp - 10.25).abs() < 1e-9);
        let second = rx.pop_front().unwrap();
        assert!((second.timestamp - 9.5).abs() < 1e-9);
        assert!(rx.pop_front().is_none());
    }

    #[test]
    fn test_gaze_timestamp_includes_offset() {
        let (tx, mut rx) = ingestion_queue("gaze");
        let listener = gaze_listener(tx, Arc::new(ClockOffset::new(-20.0)));
        listener(&GazeEvent::Sample(GazeSample {
            timestamp_unix_seconds: 100.0,
            x: 3.0,
            y: 4.0,
            worn: true,
        }));
        let item = rx.pop_front().unwrap();
        assert!((item.timestamp - 99.98).abs() < 1e-9);
        assert_eq!(item.payload.x, 3.0);
    }
}

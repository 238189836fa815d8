//! Gaze stream client
//!
//! Receives samples from a [`GazeSource`] on a dedicated thread and
//! republishes them to subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use contracts::{
    ClockOffset, GazeEvent, GazeEventKind, GazeSource, Listener, ListenerId, Subscribers,
};
use metrics::{counter, gauge};
use tracing::{debug, error, info, instrument, trace};

use crate::error::{IngestionError, Result};

pub const GAZE_THREAD_NAME: &str = "gaze-stream";

struct GazeShared {
    source: Arc<dyn GazeSource>,
    subscribers: Subscribers<GazeEvent>,
    alive: AtomicBool,
    offset: Arc<ClockOffset>,
}

/// Eye-tracker client
pub struct GazeStreamClient {
    shared: Arc<GazeShared>,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl GazeStreamClient {
    pub fn new(source: Arc<dyn GazeSource>) -> Self {
        Self {
            shared: Arc::new(GazeShared {
                source,
                subscribers: Subscribers::new(),
                alive: AtomicBool::new(false),
                offset: Arc::new(ClockOffset::default()),
            }),
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, kind: GazeEventKind, listener: Listener<GazeEvent>) -> ListenerId {
        self.shared.subscribers.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, kind: GazeEventKind, id: ListenerId) -> bool {
        self.shared.subscribers.unsubscribe(kind, id)
    }

    /// Tracker clock offset (`local - tracker`); zero until started
    pub fn offset(&self) -> Arc<ClockOffset> {
        Arc::clone(&self.shared.offset)
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub fn source_name(&self) -> &str {
        self.shared.source.name()
    }

    fn claim(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(IngestionError::AlreadyStarted {
                source_name: self.shared.source.name().to_string(),
            });
        }
        self.shared.alive.store(true, Ordering::Release);
        Ok(())
    }

    /// Estimate the offset, then receive on a background thread
    pub fn start(&self) -> Result<()> {
        self.claim()?;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(GAZE_THREAD_NAME.to_string())
            .spawn(move || shared.run())
            .inspect_err(|_| self.shared.alive.store(false, Ordering::Release))?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Same as [`start`](Self::start) on the caller's thread
    pub fn run_blocking(&self) -> Result<()> {
        self.claim()?;
        self.shared.run()
    }

    /// Close the source and join the receive thread
    ///
    /// Returns the receive error if the stream ended on a failure.
    #[instrument(name = "gaze_client_stop", skip(self), fields(source = %self.shared.source.name()))]
    pub fn stop(&self) -> Result<()> {
        self.shared.alive.store(false, Ordering::Release);
        self.shared.source.close();

        let mut worker = lock(&self.worker);
        match worker.take() {
            Some(handle) if handle.thread().id() == thread::current().id() => {
                // left for the owner's stop to join
                debug!("stop called from the gaze thread, not joining");
                *worker = Some(handle);
                Ok(())
            }
            Some(handle) => {
                drop(worker);
                handle.join().unwrap_or(Err(IngestionError::ThreadPanicked))
            }
            None => Ok(()),
        }
    }
}

impl Drop for GazeStreamClient {
    fn drop(&mut self) {
        if self.is_alive() || lock(&self.worker).is_some() {
            if let Err(e) = self.stop() {
                debug!(error = %e, "gaze error discarded on drop");
            }
        }
    }
}

impl GazeShared {
    fn run(&self) -> Result<()> {
        let name = self.source.name().to_string();
        match self.source.estimate_offset_ms() {
            Ok(offset_ms) => {
                self.offset.set_ms(offset_ms);
                gauge!("gaze_sync_clock_offset_ms", "stream" => "gaze").set(offset_ms);
                info!(source = %name, offset_ms, "gaze clock offset set");
            }
            Err(e) => {
                let was_alive = self.alive.swap(false, Ordering::AcqRel);
                error!(source = %name, error = %e, "gaze offset estimation failed");
                return if was_alive { Err(e.into()) } else { Ok(()) };
            }
        }

        while self.alive.load(Ordering::Acquire) {
            match self.source.receive_sample() {
                Ok(sample) => {
                    trace!(timestamp = sample.timestamp_unix_seconds, "gaze sample received");
                    self.subscribers.publish(&GazeEvent::Sample(sample));
                }
                Err(e) if self.alive.swap(false, Ordering::AcqRel) => {
                    error!(source = %name, error = %e, "gaze stream failed");
                    counter!("gaze_sync_stream_disconnects_total", "stream" => "gaze")
                        .increment(1);
                    return Err(e.into());
                }
                Err(e) => {
                    debug!(source = %name, error = %e, "gaze receive interrupted by stop");
                }
            }
        }
        debug!(source = %name, "gaze stream loop exited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGazeConfig, MockGazeSource};
    use contracts::{ContractError, GazeSample};
    use std::sync::mpsc;
    use std::time::Duration;

    fn sample(t: f64) -> GazeSample {
        GazeSample {
            timestamp_unix_seconds: t,
            x: 1.0,
            y: 2.0,
            worn: true,
        }
    }

    #[test]
    fn test_publishes_scripted_samples_in_order() {
        let source = Arc::new(MockGazeSource::scripted(
            vec![sample(1.0), sample(2.0), sample(3.0)],
            12.5,
        ));
        let client = GazeStreamClient::new(source);

        let (tx, rx) = mpsc::channel();
        client.subscribe(
            GazeEventKind::Sample,
            Arc::new(move |GazeEvent::Sample(s): &GazeEvent| {
                let _ = tx.send(s.timestamp_unix_seconds);
            }),
        );
        client.start().unwrap();

        let got: Vec<f64> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
        assert_eq!(client.offset().ms(), 12.5);

        client.stop().unwrap();
        assert!(!client.is_alive());
        client.stop().unwrap();
    }

    #[test]
    fn test_second_start_fails() {
        let client = GazeStreamClient::new(Arc::new(MockGazeSource::new(MockGazeConfig::default())));
        client.start().unwrap();
        assert!(matches!(
            client.start(),
            Err(IngestionError::AlreadyStarted { .. })
        ));
        client.stop().unwrap();
    }

    struct FailingSource;

    impl GazeSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn receive_sample(&self) -> std::result::Result<GazeSample, ContractError> {
            Err(ContractError::gaze_source("failing", "tracker unplugged"))
        }

        fn estimate_offset_ms(&self) -> std::result::Result<f64, ContractError> {
            Ok(0.0)
        }

        fn close(&self) {}
    }

    #[test]
    fn test_receive_error_surfaces_from_stop() {
        let client = GazeStreamClient::new(Arc::new(FailingSource));
        client.start().unwrap();
        // the loop ends on its own after the first failure
        for _ in 0..100 {
            if !client.is_alive() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let err = client.stop().unwrap_err();
        assert!(err.to_string().contains("tracker unplugged"));
    }

    #[test]
    fn test_stop_from_listener_leaves_join_to_owner() {
        let source = Arc::new(MockGazeSource::scripted(vec![sample(1.0), sample(2.0)], 0.0));
        let client = Arc::new(GazeStreamClient::new(source));
        let listener_done = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::channel();
        let weak = Arc::downgrade(&client);
        let done = Arc::clone(&listener_done);
        client.subscribe(
            GazeEventKind::Sample,
            Arc::new(move |_: &GazeEvent| {
                if let Some(client) = weak.upgrade() {
                    let _ = tx.send(client.stop().is_ok());
                    thread::sleep(Duration::from_millis(100));
                    done.store(true, Ordering::SeqCst);
                }
            }),
        );
        client.start().unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        // the receive thread is still inside the listener here
        client.stop().unwrap();
        assert!(listener_done.load(Ordering::SeqCst));
        assert!(!client.is_alive());
    }
}

//! Dispatcher - fans synchronized pairs out to every configured sink

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{SinkConfig, SinkType, SyncedPair};

use crate::error::{DispatcherError, Result};
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builds a [`Dispatcher`] from sink configurations
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<SyncedPair>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<SyncedPair>) -> Self {
        Self { config, input_rx }
    }

    /// Create every sink and spawn its worker
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sink_count = self.config.sinks.len())
    )]
    pub fn build(self) -> Result<Dispatcher> {
        let handles = self
            .config
            .sinks
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>>>()?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::from_params(&config.name, &config.params),
            config.queue_capacity,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, "file", e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Consumes pairs from one channel and copies each to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<SyncedPair>,
}

impl Dispatcher {
    /// Dispatcher over pre-built handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<SyncedPair>) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Counters for every sink
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the input channel closes, then drain and close every sink
    ///
    /// Returns the final counters of each sink.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!("Dispatcher started");

        let mut pair_count: u64 = 0;
        while let Some(pair) = self.input_rx.recv().await {
            pair_count += 1;
            self.dispatch_pair(pair);

            if pair_count % 100 == 0 {
                debug!(pairs = pair_count, "Dispatcher progress");
            }
        }

        info!(pairs = pair_count, "Dispatcher input closed, shutting down");

        let metrics_handles: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), std::sync::Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        metrics_handles
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect()
    }

    /// Spawn [`Dispatcher::run`] on the current runtime
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch_pair(&self, pair: SyncedPair) {
        // The last sink takes ownership; the others get clones.
        let Some((last, rest)) = self.handles.split_last() else {
            return;
        };
        for handle in rest {
            handle.try_send(pair.clone());
        }
        last.try_send(pair);
    }
}

/// Build a dispatcher straight from sink configurations
pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<SyncedPair>,
) -> Result<Dispatcher> {
    DispatcherBuilder::new(DispatcherConfig { sinks: sink_configs }, input_rx).build()
}

//! Pipeline orchestrator - wires the two streams, the synchronizer and the dispatcher.
//!
//! The video and gaze clients run on their own threads and feed the
//! synchronizer's queues through bridge listeners. This task polls the
//! synchronizer every `sync.poll_interval_ms` and forwards every non-empty
//! output to the dispatcher as a numbered [`SyncedPair`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{
    GazeEventKind, GazeSample, PairMeta, SessionBlueprint, SyncedPair, VideoEvent, VideoEventKind,
    VideoFrame,
};
use ingestion::{frame_listener, gaze_listener, GazeStreamClient};
use mirror_client::{AnnexBCodec, PacketRecorder, VideoStreamClient};
use observability::record_pair_metrics;
use sync_engine::SyncEngine;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use super::sources::{self, MockVideo};
use super::{PipelineStats, StopReason};
use crate::error::CliError;

const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: SessionBlueprint,

    /// Stream from an in-memory device and synthetic gaze
    pub mock: Option<MockVideo>,

    /// Stop after this many pairs
    pub max_pairs: Option<u64>,

    /// Stop after this long
    pub timeout: Option<Duration>,

    /// Capacity of the pair channel to the dispatcher
    pub buffer_size: usize,

    /// Prometheus port
    pub metrics_port: Option<u16>,

    /// Annex-B output for the coded video stream
    pub record: Option<PathBuf>,
}

type FrameGazeEngine = SyncEngine<VideoFrame, GazeSample>;

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves or a stop condition is met
    #[instrument(name = "pipeline_run", skip_all, fields(mock = self.config.mock.is_some()))]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        // Stream sources
        let mock = self.config.mock;
        let device = blueprint.device.clone();
        let executor = tokio::task::spawn_blocking(move || sources::video_executor(&device, mock))
            .await
            .context("Device selection task failed")??;
        let gaze_source = sources::gaze_source(&blueprint.gaze, mock.is_some())?;

        let video = Arc::new(VideoStreamClient::new(
            executor,
            Box::new(AnnexBCodec::new()),
            blueprint.video.clone(),
            blueprint.device.server_jar.clone(),
        ));
        let gaze = Arc::new(GazeStreamClient::new(gaze_source));

        // Synchronizer and bridges
        let mut engine = FrameGazeEngine::new(blueprint.sync.clone());
        let frame_metrics = engine.frame_producer().metrics();
        let gaze_metrics = engine.gaze_producer().metrics();

        video.subscribe(
            VideoEventKind::Frame,
            frame_listener(engine.frame_producer(), video.offset()),
        );
        gaze.subscribe(
            GazeEventKind::Sample,
            gaze_listener(engine.gaze_producer(), gaze.offset()),
        );

        let video_ended = Arc::new(AtomicBool::new(false));
        let ended_flag = Arc::clone(&video_ended);
        video.subscribe(
            VideoEventKind::Disconnect,
            Arc::new(move |_: &VideoEvent| ended_flag.store(true, Ordering::Release)),
        );
        video.subscribe(
            VideoEventKind::Init,
            Arc::new(|event: &VideoEvent| {
                if let VideoEvent::Init(handshake) = event {
                    info!(
                        device = %handshake.device_name,
                        width = handshake.width,
                        height = handshake.height,
                        "Video handshake complete"
                    );
                }
            }),
        );

        let recorder = match &self.config.record {
            Some(path) => {
                let recorder = PacketRecorder::create(path)
                    .with_context(|| format!("Failed to create recording {}", path.display()))?;
                video.subscribe(VideoEventKind::Packet, recorder.listener());
                Some(recorder)
            }
            None => None,
        };

        // Dispatcher
        let (pair_tx, pair_rx) = mpsc::channel::<SyncedPair>(self.config.buffer_size.max(1));
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - pairs will only be counted");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), pair_rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();

        video.start().context("Failed to start video stream")?;
        gaze.start().context("Failed to start gaze stream")?;
        info!(
            device = %blueprint.device.serial.as_deref().unwrap_or("auto"),
            gaze = %gaze.source_name(),
            sinks = blueprint.sinks.len(),
            "Streams started"
        );

        // Polling loop
        let mut stats = PipelineStats {
            active_sinks: blueprint.sinks.len(),
            ..Default::default()
        };
        let mut ticker =
            tokio::time::interval(Duration::from_millis(blueprint.sync.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => break StopReason::Signal,
                _ = ticker.tick() => {}
            }

            if let Some(reason) = self.drain(&mut engine, &pair_tx, &mut stats).await {
                break reason;
            }
            if video_ended.load(Ordering::Acquire) || video.state().is_terminal() {
                // frames queued after the drain above still get a chance to pair
                if let Some(reason) = self.drain(&mut engine, &pair_tx, &mut stats).await {
                    break reason;
                }
                break StopReason::VideoEnded;
            }
            if self
                .config
                .timeout
                .is_some_and(|timeout| start_time.elapsed() >= timeout)
            {
                break StopReason::Timeout;
            }
        };

        // Shutdown
        info!(reason = %reason, pairs = stats.pairs_dispatched, "Stopping pipeline");
        // both stops join a reader thread
        let (video_result, gaze_result) = {
            let video = Arc::clone(&video);
            let gaze = Arc::clone(&gaze);
            tokio::task::spawn_blocking(move || (video.stop(), gaze.stop()))
                .await
                .context("Stream shutdown task failed")?
        };
        if let Err(e) = gaze_result {
            warn!(error = %e, "Gaze stream ended with an error");
        }

        stats.stop_reason = reason;
        stats.device = video.handshake();
        stats.video_offset_ms = video.offset().ms();
        stats.gaze_offset_ms = gaze.offset().ms();
        stats.sync = engine.stats().clone();
        stats.frames_received = frame_metrics.snapshot().items_received;
        stats.gaze_received = gaze_metrics.snapshot().items_received;

        drop(pair_tx);
        match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(sink_metrics)) => stats.sink_metrics = sink_metrics,
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not drain in time"),
        }

        if let Some(recorder) = recorder {
            stats.recording = Some(recorder.finish().context("Failed to finish recording")?);
        }
        stats.duration = start_time.elapsed();

        if let Err(e) = video_result {
            if stats.pairs_dispatched == 0 {
                return Err(CliError::pipeline_execution(format!(
                    "video stream failed before any pair was produced: {e}"
                ))
                .into());
            }
            warn!(error = %e, "Video stream ended with an error");
        }

        info!(
            pairs = stats.pairs_dispatched,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }

    /// Call `next_match` until it yields nothing, forwarding every output
    async fn drain(
        &self,
        engine: &mut FrameGazeEngine,
        pair_tx: &mpsc::Sender<SyncedPair>,
        stats: &mut PipelineStats,
    ) -> Option<StopReason> {
        loop {
            let output = engine.next_match();
            if output.is_empty() {
                return None;
            }

            let (frame_backlog, gaze_backlog) = engine.backlog();
            let meta = PairMeta {
                outcome: Some(output.outcome),
                time_delta: output.time_delta(),
                frame_backlog,
                gaze_backlog,
                gaze_dropped_total: engine.stats().gaze_dropped,
            };
            let pair_id = stats.pairs_dispatched;
            record_pair_metrics(&meta, pair_id);
            stats.sync_metrics.update(&meta);
            debug!(
                pair_id,
                outcome = output.outcome.as_str(),
                delta_ms = meta.time_delta.map(|d| d * 1000.0),
                "Pair produced"
            );

            let pair = SyncedPair {
                pair_id,
                frame: output.frame,
                gaze: output.gaze,
                meta,
            };
            if pair_tx.send(pair).await.is_err() {
                return Some(StopReason::DispatcherClosed);
            }
            stats.pairs_dispatched += 1;

            if self
                .config
                .max_pairs
                .is_some_and(|max| stats.pairs_dispatched >= max)
            {
                return Some(StopReason::MaxPairs);
            }
        }
    }
}

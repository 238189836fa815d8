//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需真机与眼动仪）

#[cfg(test)]
mod contract_tests {
    use contracts::{MatchOutcome, SessionBlueprint};

    #[test]
    fn test_default_blueprint_roundtrips_through_loader() {
        let blueprint = SessionBlueprint::default();
        let toml = config_loader::ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = config_loader::ConfigLoader::load_from_str(
            &toml,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(reloaded.device.adb_port, blueprint.device.adb_port);
        assert_eq!(reloaded.sync.tolerance, blueprint.sync.tolerance);
    }

    #[test]
    fn test_outcome_wire_names() {
        let json = serde_json::to_string(&MatchOutcome::ForcedRelease).unwrap();
        assert_eq!(json, "\"forced_release\"");
        assert_eq!(MatchOutcome::ForcedRelease.as_str(), "forced_release");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::{
        GazeEventKind, GazeSample, MatchOutcome, PairMeta, SinkConfig, SinkType, SyncEngineConfig,
        SyncedPair, VideoEvent, VideoEventKind, VideoFrame, VideoStreamConfig,
    };
    use dispatcher::{create_dispatcher, PairRecord};
    use ingestion::{frame_listener, gaze_listener, GazeStreamClient, MockGazeSource};
    use mirror_client::{h264_script, AnnexBCodec, MockDevice, MockDeviceConfig, VideoStreamClient};
    use observability::SyncMetricsAggregator;
    use sync_engine::SyncEngine;
    use tokio::sync::mpsc;

    /// Device time of the first frame, milliseconds
    const FIRST_PTS_MS: u64 = 1_700_000_000_000;
    const FRAME_INTERVAL_MS: u64 = 40;

    /// Parameter sets, then `frames` slices stamped every 40 ms of device time
    fn timed_script(frames: usize) -> Vec<mirror_client::MockPacket> {
        let mut script = h264_script(frames);
        for (i, packet) in script.iter_mut().skip(2).enumerate() {
            packet.pts_ms = Some(FIRST_PTS_MS + i as u64 * FRAME_INTERVAL_MS);
        }
        script
    }

    /// One gaze sample `lag_ms` after every frame
    fn gaze_script(frames: usize, lag_ms: f64) -> Vec<GazeSample> {
        (0..frames)
            .map(|i| GazeSample {
                timestamp_unix_seconds: (FIRST_PTS_MS + i as u64 * FRAME_INTERVAL_MS) as f64
                    * 0.001
                    + lag_ms * 0.001,
                x: i as f64,
                y: 0.5,
                worn: true,
            })
            .collect()
    }

    fn file_sink(dir: &Path) -> SinkConfig {
        SinkConfig {
            name: "disk".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 100,
            params: HashMap::from([("base_path".to_string(), dir.display().to_string())]),
        }
    }

    fn video_client(packets: Vec<mirror_client::MockPacket>) -> VideoStreamClient {
        let device = MockDevice::new(MockDeviceConfig {
            packets,
            packet_interval: Duration::from_millis(2),
            close_after_script: true,
            ..Default::default()
        });
        VideoStreamClient::new(
            Arc::new(device),
            Box::new(AnnexBCodec::new()),
            VideoStreamConfig {
                offset_samples: 10,
                ..Default::default()
            },
            "scrcpy-server.jar",
        )
    }

    /// Poll the synchronizer until the video ends, forwarding every output
    async fn pump(
        engine: &mut SyncEngine<VideoFrame, GazeSample>,
        video_ended: &AtomicBool,
        tx: &mpsc::Sender<SyncedPair>,
        aggregator: &mut SyncMetricsAggregator,
    ) -> Vec<MatchOutcome> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut outcomes = Vec::new();
        loop {
            let ended = video_ended.load(Ordering::Acquire);
            loop {
                let output = engine.next_match();
                if output.is_empty() {
                    break;
                }
                let (frame_backlog, gaze_backlog) = engine.backlog();
                let meta = PairMeta {
                    outcome: Some(output.outcome),
                    time_delta: output.time_delta(),
                    frame_backlog,
                    gaze_backlog,
                    gaze_dropped_total: engine.stats().gaze_dropped,
                };
                aggregator.update(&meta);
                outcomes.push(output.outcome);
                let pair = SyncedPair {
                    pair_id: outcomes.len() as u64 - 1,
                    frame: output.frame,
                    gaze: output.gaze,
                    meta,
                };
                tx.send(pair).await.unwrap();
            }
            if ended || Instant::now() > deadline {
                return outcomes;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// End-to-end: MockDevice + scripted gaze -> bridges -> SyncEngine -> FileSink
    ///
    /// 验证完整的数据流：
    /// 1. 视频客户端握手、估计时钟偏移并解出帧
    /// 2. 注视客户端推送预设样本
    /// 3. SyncEngine 将每帧与 1 ms 后的样本配对
    /// 4. Dispatcher 把配对写入 pairs.jsonl
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let frames = 12;
        let dir = tempfile::tempdir().unwrap();

        let video = video_client(timed_script(frames));
        let gaze = GazeStreamClient::new(Arc::new(MockGazeSource::scripted(
            gaze_script(frames, 1.0),
            0.0,
        )));

        let mut engine = SyncEngine::<VideoFrame, GazeSample>::new(SyncEngineConfig::default());
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

        let (tx, rx) = mpsc::channel::<SyncedPair>(100);
        let dispatcher = create_dispatcher(vec![file_sink(dir.path())], rx).unwrap();
        let dispatcher_handle = dispatcher.spawn();

        gaze.start().unwrap();
        video.start().unwrap();

        let mut aggregator = SyncMetricsAggregator::new();
        let outcomes = pump(&mut engine, &video_ended, &tx, &mut aggregator).await;
        let _ = video.stop();
        let _ = gaze.stop();

        drop(tx);
        let sink_metrics = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle)
            .await
            .expect("dispatcher drained")
            .unwrap();

        assert!(video_ended.load(Ordering::Acquire), "video never ended");
        assert_eq!(outcomes.len(), frames, "{outcomes:?}");
        assert!(
            outcomes.iter().all(|o| *o == MatchOutcome::Matched),
            "{outcomes:?}"
        );
        assert_eq!(sink_metrics[0].1.written, frames as u64);
        let summary = aggregator.summary();
        assert_eq!(summary.paired, frames as u64);
        assert_eq!(summary.frame_only, 0);

        let jsonl = std::fs::read_to_string(dir.path().join("pairs.jsonl")).unwrap();
        let records: Vec<PairRecord> = jsonl
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), frames);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.pair_id, i as u64);
            assert_eq!(record.gaze.unwrap().x, i as f64);
            assert!(record.time_delta.unwrap() < 0.005);
        }
    }

    /// Gaze stream that stops early: trailing frames are released alone once the backlog overflows
    #[tokio::test]
    async fn test_e2e_frames_released_without_gaze() {
        let frames = 30;
        let video = video_client(timed_script(frames));
        let gaze = GazeStreamClient::new(Arc::new(MockGazeSource::scripted(
            gaze_script(5, 1.0),
            0.0,
        )));

        let mut engine = SyncEngine::<VideoFrame, GazeSample>::new(SyncEngineConfig {
            frame_queue_limit: 3,
            ..Default::default()
        });
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

        let (tx, mut rx) = mpsc::channel::<SyncedPair>(1000);
        gaze.start().unwrap();
        video.start().unwrap();
        let mut aggregator = SyncMetricsAggregator::new();
        let outcomes = pump(&mut engine, &video_ended, &tx, &mut aggregator).await;
        let _ = video.stop();
        let _ = gaze.stop();

        let paired = outcomes.iter().filter(|o| o.is_pair()).count();
        let forced = outcomes
            .iter()
            .filter(|o| **o == MatchOutcome::ForcedRelease)
            .count();
        assert_eq!(paired, 5, "{outcomes:?}");
        // everything over the limit leaves unpaired; the rest stays queued
        assert_eq!(forced, frames - 5 - 4, "{outcomes:?}");
        assert!(engine.current_frame().is_some());
        assert_eq!(engine.backlog().0, 3);

        drop(tx);
        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, outcomes.len());
    }
}

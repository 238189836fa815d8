//! Video stream client
//!
//! Owns the video and control tunnels plus the server process for one
//! device session. Lifecycle: `connect` (optional) → `start` or
//! `run_blocking` → `stop`. A client is single-use.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{
    ClockOffset, Codec, ConnectionState, ConnectionStateCell, DeviceExecutor, HandshakeInfo,
    Listener, ListenerId, ServerProcess, Subscribers, Tunnel, VideoEvent, VideoEventKind,
    VideoStreamConfig,
};
use metrics::{counter, gauge};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::control::{estimate_offset, ControlChannel, OffsetEstimate};
use crate::error::{MirrorClientError, Result};
use crate::server::{deploy_server, TUNNEL_CHANNEL};
use crate::wire::{self, KeyframeGate, RAW_CHUNK_LEN};

/// Name of the streaming thread spawned by [`VideoStreamClient::start`]
pub const STREAM_THREAD_NAME: &str = "video-stream";

#[derive(Default)]
struct Resources {
    /// Reading handle, taken by the streaming loop
    video: Option<Box<dyn Tunnel>>,
    /// Second handle used only to interrupt reads
    video_interrupt: Option<Box<dyn Tunnel>>,
    control: Option<Arc<ControlChannel>>,
    server: Option<Box<dyn ServerProcess>>,
}

struct ClientShared {
    executor: Arc<dyn DeviceExecutor>,
    config: VideoStreamConfig,
    server_jar: PathBuf,
    subscribers: Subscribers<VideoEvent>,
    state: ConnectionStateCell,
    alive: AtomicBool,
    offset: Arc<ClockOffset>,
    handshake: Mutex<Option<HandshakeInfo>>,
    resources: Mutex<Resources>,
}

/// Protocol client for one mirrored device
pub struct VideoStreamClient {
    shared: Arc<ClientShared>,
    codec: Mutex<Option<Box<dyn Codec>>>,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl VideoStreamClient {
    pub fn new(
        executor: Arc<dyn DeviceExecutor>,
        codec: Box<dyn Codec>,
        config: VideoStreamConfig,
        server_jar: impl Into<PathBuf>,
    ) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                executor,
                config,
                server_jar: server_jar.into(),
                subscribers: Subscribers::new(),
                state: ConnectionStateCell::new(),
                alive: AtomicBool::new(false),
                offset: Arc::new(ClockOffset::default()),
                handshake: Mutex::new(None),
                resources: Mutex::new(Resources::default()),
            }),
            codec: Mutex::new(Some(codec)),
            worker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, kind: VideoEventKind, listener: Listener<VideoEvent>) -> ListenerId {
        self.shared.subscribers.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, kind: VideoEventKind, id: ListenerId) -> bool {
        self.shared.subscribers.unsubscribe(kind, id)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &VideoStreamConfig {
        &self.shared.config
    }

    /// Device clock offset (`local - device`); zero until streaming starts
    pub fn offset(&self) -> Arc<ClockOffset> {
        Arc::clone(&self.shared.offset)
    }

    pub fn handshake(&self) -> Option<HandshakeInfo> {
        lock(&self.shared.handshake).clone()
    }

    /// Control channel, available after the handshake
    pub fn control(&self) -> Option<Arc<ControlChannel>> {
        lock(&self.shared.resources).control.clone()
    }

    /// Deploy the server and perform the handshake on the caller's thread
    #[instrument(name = "video_client_connect", skip(self), fields(device = %self.shared.executor.describe()))]
    pub fn connect(&self) -> Result<HandshakeInfo> {
        self.shared.connect()
    }

    /// Run the session on a background thread
    pub fn start(&self) -> Result<()> {
        let codec = self.claim()?;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(STREAM_THREAD_NAME.to_string())
            .spawn(move || shared.run(codec));
        match spawned {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.alive.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Run the session on the caller's thread until stopped or disconnected
    pub fn run_blocking(&self) -> Result<()> {
        let codec = self.claim()?;
        self.shared.run(codec)
    }

    fn claim(&self) -> Result<Box<dyn Codec>> {
        let state = self.shared.state.get();
        if state.is_terminal() {
            return Err(MirrorClientError::InvalidState {
                operation: "start",
                state,
            });
        }
        if self.shared.alive.swap(true, Ordering::AcqRel) {
            return Err(MirrorClientError::AlreadyStarted);
        }
        lock(&self.codec)
            .take()
            .ok_or(MirrorClientError::AlreadyStarted)
    }

    /// Stop streaming and release every resource
    ///
    /// Safe to call repeatedly and from a listener. Returns the streaming
    /// error if the session ended on a failure.
    #[instrument(name = "video_client_stop", skip(self))]
    pub fn stop(&self) -> Result<()> {
        self.shared.alive.store(false, Ordering::Release);
        self.shared.interrupt();

        let mut outcome = Ok(());
        let mut worker = lock(&self.worker);
        match worker.take() {
            Some(handle) if handle.thread().id() == thread::current().id() => {
                // the owner's stop joins it and collects the stream result
                debug!("stop called from the streaming thread, not joining");
                *worker = Some(handle);
            }
            Some(handle) => {
                drop(worker);
                outcome = handle.join().unwrap_or(Err(MirrorClientError::ThreadPanicked));
            }
            None => {}
        }

        self.shared.release_resources();
        if let Some(prev) = self.shared.state.advance(ConnectionState::Stopped) {
            info!(from = %prev, "video client stopped");
        }
        outcome
    }
}

impl Drop for VideoStreamClient {
    fn drop(&mut self) {
        if self.is_alive() || lock(&self.worker).is_some() {
            if let Err(e) = self.stop() {
                debug!(error = %e, "stream error discarded on drop");
            }
        } else {
            self.shared.release_resources();
        }
    }
}

impl ClientShared {
    fn resources(&self) -> MutexGuard<'_, Resources> {
        lock(&self.resources)
    }

    fn connect(&self) -> Result<HandshakeInfo> {
        if self.state.advance(ConnectionState::Connecting).is_none() {
            return Err(MirrorClientError::InvalidState {
                operation: "connect",
                state: self.state.get(),
            });
        }
        match self.establish() {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!(error = %e, "connection failed");
                self.release_resources();
                self.state.advance(ConnectionState::Stopped);
                Err(e)
            }
        }
    }

    fn establish(&self) -> Result<HandshakeInfo> {
        let server = deploy_server(&*self.executor, &self.server_jar, &self.config)?;
        self.resources().server = Some(server);

        let mut video = self.open_video_tunnel()?;
        self.resources().video_interrupt = Some(video.try_clone_tunnel()?);
        self.state.advance(ConnectionState::Handshaking);

        wire::read_marker(&mut *video)?;

        let control = self.executor.open_tunnel(TUNNEL_CHANNEL).map_err(|e| {
            MirrorClientError::connection(format!("failed to open control tunnel: {e}"))
        })?;
        self.resources().control = Some(Arc::new(ControlChannel::new(control)?));

        let device_name = wire::read_device_name(&mut *video)?;
        let (width, height) = wire::read_video_header(&mut *video)?;
        self.resources().video = Some(video);

        let info = HandshakeInfo {
            device_name,
            width,
            height,
        };
        *lock(&self.handshake) = Some(info.clone());
        info!(
            device_name = %info.device_name,
            width = info.width,
            height = info.height,
            "handshake complete"
        );
        self.subscribers.publish(&VideoEvent::Init(info.clone()));
        Ok(info)
    }

    fn open_video_tunnel(&self) -> Result<Box<dyn Tunnel>> {
        let attempts = self.config.connect_attempts();
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for attempt in 1..=attempts {
            match self.executor.open_tunnel(TUNNEL_CHANNEL) {
                Ok(tunnel) => {
                    debug!(attempt, "video tunnel open");
                    return Ok(tunnel);
                }
                Err(e) => {
                    trace!(attempt, error = %e, "video tunnel not ready");
                    thread::sleep(interval);
                }
            }
        }
        Err(MirrorClientError::connection(format!(
            "failed to connect to server after {} ms",
            self.config.connection_timeout_ms
        )))
    }

    fn estimate_offset(&self) -> Result<OffsetEstimate> {
        let control = self
            .resources()
            .control
            .clone()
            .ok_or_else(|| MirrorClientError::connection("control channel not open"))?;
        let estimate = estimate_offset(&*control, self.config.offset_samples)?;
        self.offset.set_ms(estimate.offset_ms);
        gauge!("gaze_sync_clock_offset_ms", "stream" => "video").set(estimate.offset_ms);
        info!(
            offset_ms = estimate.offset_ms,
            round_trip_ms = estimate.round_trip_ms,
            "video clock offset set"
        );
        Ok(estimate)
    }

    /// Connect if needed, estimate the offset, then stream
    fn run(&self, mut codec: Box<dyn Codec>) -> Result<()> {
        let video = match self.prepare(&mut *codec) {
            Ok(video) => video,
            Err(e) => {
                let was_alive = self.alive.swap(false, Ordering::AcqRel);
                self.release_resources();
                self.state.advance(ConnectionState::Stopped);
                return if was_alive { Err(e) } else { Ok(()) };
            }
        };

        let outcome = self.stream(video, &mut *codec);
        match outcome {
            Ok(()) => {
                debug!("video stream loop exited");
                Ok(())
            }
            Err(e) if self.alive.swap(false, Ordering::AcqRel) => {
                error!(error = %e, "video stream failed");
                counter!("gaze_sync_stream_disconnects_total", "stream" => "video").increment(1);
                self.state.advance(ConnectionState::Disconnected);
                self.subscribers.publish(&VideoEvent::Disconnect);
                self.release_resources();
                Err(e)
            }
            Err(e) => {
                debug!(error = %e, "read interrupted by stop");
                Ok(())
            }
        }
    }

    fn prepare(&self, codec: &mut dyn Codec) -> Result<Box<dyn Tunnel>> {
        let info = match self.state.get() {
            ConnectionState::Idle => self.connect()?,
            _ => lock(&self.handshake).clone().ok_or(MirrorClientError::InvalidState {
                operation: "start",
                state: self.state.get(),
            })?,
        };
        codec.configure(&info);
        self.estimate_offset()?;

        if !self.alive.load(Ordering::Acquire) {
            return Err(MirrorClientError::connection("stopped before streaming"));
        }
        let video = self
            .resources()
            .video
            .take()
            .ok_or_else(|| MirrorClientError::connection("video tunnel not open"))?;
        if self.state.advance(ConnectionState::Streaming).is_none() {
            return Err(MirrorClientError::InvalidState {
                operation: "stream",
                state: self.state.get(),
            });
        }
        Ok(video)
    }

    #[instrument(name = "video_stream", skip_all, fields(codec = codec.name()))]
    fn stream(&self, mut video: Box<dyn Tunnel>, codec: &mut dyn Codec) -> Result<()> {
        let mut gate = KeyframeGate::new();
        let mut sequence: u64 = 0;
        let mut buf = vec![0u8; RAW_CHUNK_LEN];
        let with_meta = self.config.send_frame_meta;

        while self.alive.load(Ordering::Acquire) {
            let (pts, len) = if with_meta {
                let header = wire::read_packet_header(&mut *video)?;
                let len = header.length as usize;
                if buf.len() < len {
                    buf.resize(len, 0);
                }
                wire::read_exact_or_disconnect(&mut *video, &mut buf[..len], "packet payload")?;
                (header.pts_seconds(), len)
            } else {
                (0.0, wire::read_chunk(&mut *video, &mut buf)?)
            };
            let chunk = &buf[..len];

            if !gate.admit(chunk) {
                counter!("gaze_sync_keyframe_gate_dropped_total").increment(1);
                trace!(len, "chunk dropped before first keyframe");
                continue;
            }

            let packets = match codec.parse(chunk) {
                Ok(packets) => packets,
                Err(e) => {
                    counter!("gaze_sync_codec_errors_total", "stage" => "parse").increment(1);
                    warn!(error = %e, len, "codec rejected chunk");
                    continue;
                }
            };

            for packet in packets {
                self.subscribers.publish(&VideoEvent::Packet {
                    packet: packet.clone(),
                    sequence,
                });
                counter!("gaze_sync_items_received_total", "stream" => "video_packet")
                    .increment(1);
                sequence += 1;

                match codec.decode(&packet) {
                    Ok(frames) => {
                        for frame in frames {
                            trace!(pts, sequence, "frame decoded");
                            counter!("gaze_sync_items_received_total", "stream" => "video_frame")
                                .increment(1);
                            self.subscribers.publish(&VideoEvent::Frame { frame, pts });
                        }
                    }
                    Err(e) => {
                        counter!("gaze_sync_codec_errors_total", "stage" => "decode").increment(1);
                        warn!(error = %e, sequence, "codec failed to decode packet");
                    }
                }
            }
        }
        Ok(())
    }

    /// Unblock pending reads on both tunnels
    fn interrupt(&self) {
        let resources = self.resources();
        if let Some(video) = &resources.video_interrupt {
            if let Err(e) = video.shutdown() {
                trace!(error = %e, "video shutdown failed");
            }
        }
        if let Some(control) = &resources.control {
            if let Err(e) = control.shutdown() {
                trace!(error = %e, "control shutdown failed");
            }
        }
    }

    /// Close everything this client owns; errors are logged and dropped
    fn release_resources(&self) {
        self.interrupt();
        let mut resources = self.resources();
        resources.video.take();
        resources.video_interrupt.take();
        resources.control.take();
        if let Some(mut server) = resources.server.take() {
            if let Err(e) = server.close() {
                debug!(error = %e, "server close failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annexb::AnnexBCodec;
    use crate::mock_device::{h264_script, MockDevice, MockDeviceConfig, MockPacket};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn client_for(device: Arc<MockDevice>) -> VideoStreamClient {
        let config = VideoStreamConfig {
            connection_timeout_ms: 200,
            poll_interval_ms: 10,
            offset_samples: 5,
            ..Default::default()
        };
        VideoStreamClient::new(device, Box::new(AnnexBCodec::new()), config, "server.jar")
    }

    #[test]
    fn test_connect_reads_handshake() {
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            device_name: "Pixel".to_string(),
            width: 1080,
            height: 2400,
            ..Default::default()
        }));
        let client = client_for(Arc::clone(&device));

        let inits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&inits);
        client.subscribe(
            VideoEventKind::Init,
            Arc::new(move |_: &VideoEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let info = client.connect().unwrap();
        assert_eq!(info.device_name, "Pixel");
        assert_eq!((info.width, info.height), (1080, 2400));
        assert_eq!(client.state(), ConnectionState::Handshaking);
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(client.control().is_some());

        client.stop().unwrap();
        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(device.server_closed());
    }

    #[test]
    fn test_bad_marker_stops_after_one_byte() {
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            marker: 0x7F,
            ..Default::default()
        }));
        let client = client_for(Arc::clone(&device));

        let err = client.connect().unwrap_err();
        assert!(err.is_connection());
        assert_eq!(device.video_bytes_read(), 1);
        // control tunnel never opened
        assert_eq!(device.tunnel_attempts(), 1);
        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(matches!(
            client.start(),
            Err(MirrorClientError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_tunnel_retries_then_succeeds() {
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            tunnel_failures: 3,
            ..Default::default()
        }));
        let client = client_for(Arc::clone(&device));
        client.connect().unwrap();
        // three failures, video, control
        assert_eq!(device.tunnel_attempts(), 5);
        client.stop().unwrap();
    }

    #[test]
    fn test_tunnel_timeout() {
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            tunnel_failures: usize::MAX,
            ..Default::default()
        }));
        let client = client_for(Arc::clone(&device));
        let err = client.connect().unwrap_err();
        assert!(err.to_string().contains("after 200 ms"));
        assert_eq!(device.tunnel_attempts(), 20);
    }

    #[test]
    fn test_stream_publishes_gated_packets_and_disconnects() {
        let mut packets = vec![MockPacket::nal(1, 8).at(900), MockPacket::nal(6, 8).at(950)];
        packets.extend(
            h264_script(4)
                .into_iter()
                .enumerate()
                .map(|(i, p)| p.at(1_000 + i as u64 * 33).with_flags(1 << 62)),
        );
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            packets,
            close_after_script: true,
            clock_skew_ms: 250,
            ..Default::default()
        }));
        let client = client_for(device);

        let (tx, rx) = mpsc::channel();
        let frame_tx = tx.clone();
        client.subscribe(
            VideoEventKind::Frame,
            Arc::new(move |event: &VideoEvent| {
                if let VideoEvent::Frame { pts, .. } = event {
                    let _ = frame_tx.send(("frame", *pts));
                }
            }),
        );
        let packet_tx = tx.clone();
        client.subscribe(
            VideoEventKind::Packet,
            Arc::new(move |event: &VideoEvent| {
                if let VideoEvent::Packet { sequence, .. } = event {
                    let _ = packet_tx.send(("packet", *sequence as f64));
                }
            }),
        );
        client.subscribe(
            VideoEventKind::Disconnect,
            Arc::new(move |_: &VideoEvent| {
                let _ = tx.send(("disconnect", 0.0));
            }),
        );

        client.start().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = event.0 == "disconnect";
            events.push(event);
            if done {
                break;
            }
        }

        let packets: Vec<f64> = events
            .iter()
            .filter(|e| e.0 == "packet")
            .map(|e| e.1)
            .collect();
        // P slice, SEI and PPS before the IDR are gated; SPS passes
        assert_eq!(packets, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        let frames: Vec<f64> = events
            .iter()
            .filter(|e| e.0 == "frame")
            .map(|e| e.1)
            .collect();
        assert_eq!(frames.len(), 4);
        assert!((frames[0] - 1.066).abs() < 1e-9);
        assert_eq!(events.last().map(|e| e.0), Some("disconnect"));

        // offset reflects the skew, within scheduling noise
        assert!((client.offset().ms() - 250.0).abs() < 100.0);

        let err = client.stop().unwrap_err();
        assert!(err.is_connection());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_is_idempotent_and_second_start_fails() {
        let device = Arc::new(MockDevice::with_defaults());
        let client = client_for(device);
        client.start().unwrap();
        assert!(matches!(
            client.start(),
            Err(MirrorClientError::AlreadyStarted)
        ));

        thread::sleep(Duration::from_millis(50));
        client.stop().unwrap();
        client.stop().unwrap();
        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(!client.is_alive());
    }

    #[test]
    fn test_stop_from_listener() {
        let device = Arc::new(MockDevice::with_defaults());
        let client = Arc::new(client_for(device));

        let (tx, rx) = mpsc::channel();
        let weak = Arc::downgrade(&client);
        client.subscribe(
            VideoEventKind::Frame,
            Arc::new(move |_: &VideoEvent| {
                if let Some(client) = weak.upgrade() {
                    let _ = tx.send(client.stop().is_ok());
                }
            }),
        );
        client.start().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        client.stop().unwrap();
        assert_eq!(client.state(), ConnectionState::Stopped);
    }

    #[test]
    fn test_stop_inside_disconnect_keeps_stream_error() {
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            packets: h264_script(3),
            close_after_script: true,
            ..Default::default()
        }));
        let client = Arc::new(client_for(device));

        let (tx, rx) = mpsc::channel();
        let weak = Arc::downgrade(&client);
        client.subscribe(
            VideoEventKind::Disconnect,
            Arc::new(move |_: &VideoEvent| {
                if let Some(client) = weak.upgrade() {
                    let state = client.state();
                    let _ = tx.send((state, client.stop().is_ok()));
                }
            }),
        );
        client.start().unwrap();

        let (state_seen, inner_ok) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(state_seen, ConnectionState::Disconnected);
        assert!(inner_ok);

        let err = client.stop().unwrap_err();
        assert!(err.is_connection());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.stop().unwrap();
    }

    #[test]
    fn test_raw_stream_without_frame_meta() {
        let mut packets = vec![MockPacket::nal(1, 16)];
        packets.extend(h264_script(3));
        let device = Arc::new(MockDevice::new(MockDeviceConfig {
            send_frame_meta: false,
            packets,
            packet_interval: Duration::from_millis(50),
            close_after_script: true,
            ..Default::default()
        }));
        let config = VideoStreamConfig {
            send_frame_meta: false,
            connection_timeout_ms: 200,
            poll_interval_ms: 10,
            offset_samples: 5,
            ..Default::default()
        };
        let client =
            VideoStreamClient::new(device, Box::new(AnnexBCodec::new()), config, "server.jar");

        let (tx, rx) = mpsc::channel();
        let frame_tx = tx.clone();
        client.subscribe(
            VideoEventKind::Frame,
            Arc::new(move |event: &VideoEvent| {
                if let VideoEvent::Frame { pts, .. } = event {
                    let _ = frame_tx.send(("frame", *pts));
                }
            }),
        );
        let packet_tx = tx.clone();
        client.subscribe(
            VideoEventKind::Packet,
            Arc::new(move |event: &VideoEvent| {
                if let VideoEvent::Packet { packet, .. } = event {
                    let nal = packet.nal_type.map_or(-1.0, f64::from);
                    let _ = packet_tx.send(("packet", nal));
                }
            }),
        );
        client.subscribe(
            VideoEventKind::Disconnect,
            Arc::new(move |_: &VideoEvent| {
                let _ = tx.send(("disconnect", 0.0));
            }),
        );

        client.start().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            let done = event.0 == "disconnect";
            events.push(event);
            if done {
                break;
            }
        }

        // leading P slice and the PPS are gated; SPS, IDR and the trailing slices pass
        let nal_types: Vec<f64> = events
            .iter()
            .filter(|e| e.0 == "packet")
            .map(|e| e.1)
            .collect();
        assert_eq!(nal_types, vec![7.0, 5.0, 1.0, 1.0]);

        let frames: Vec<f64> = events
            .iter()
            .filter(|e| e.0 == "frame")
            .map(|e| e.1)
            .collect();
        assert_eq!(frames, vec![0.0, 0.0, 0.0]);
        assert_eq!(events.last().map(|e| e.0), Some("disconnect"));

        let err = client.stop().unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("video socket closed"));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}

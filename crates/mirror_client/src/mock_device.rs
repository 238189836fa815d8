//! In-memory device for tests and `--mock` runs
//!
//! `MockDevice` implements `DeviceExecutor` without adb. The first tunnel
//! opened is the video channel: it receives the handshake and a scripted
//! packet sequence. The second is the control channel, answered by a thread
//! that reports the local clock shifted by a configurable skew.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use contracts::{unix_time_ms, DeviceExecutor, ServerProcess, Tunnel};
use tracing::{debug, trace};

use crate::wire::{
    CONTROL_GET_CURRENT_TIME, CONTROL_STATUS_TIME, DEVICE_NAME_LEN, NAL_TYPE_IDR, NAL_TYPE_SPS,
    VIDEO_HEADER_LEN,
};

// ============================================================================
// Pipe
// ============================================================================

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
    consumed: usize,
}

/// One direction of an in-memory connection
#[derive(Default)]
struct PipeChannel {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl PipeChannel {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    fn consumed(&self) -> usize {
        self.lock().consumed
    }
}

struct EndInner {
    incoming: Arc<PipeChannel>,
    outgoing: Arc<PipeChannel>,
    nonblocking: AtomicBool,
}

impl EndInner {
    fn close(&self) {
        self.incoming.close();
        self.outgoing.close();
    }
}

impl Drop for EndInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// One end of an in-memory duplex connection
///
/// Clones share the connection; it closes when the last clone drops or on
/// `shutdown`.
pub struct PipeEnd {
    inner: Arc<EndInner>,
}

/// Connected pair of pipe ends
pub fn pipe_pair() -> (PipeEnd, PipeEnd) {
    let a_to_b = Arc::new(PipeChannel::default());
    let b_to_a = Arc::new(PipeChannel::default());
    let a = PipeEnd {
        inner: Arc::new(EndInner {
            incoming: Arc::clone(&b_to_a),
            outgoing: Arc::clone(&a_to_b),
            nonblocking: AtomicBool::new(false),
        }),
    };
    let b = PipeEnd {
        inner: Arc::new(EndInner {
            incoming: a_to_b,
            outgoing: b_to_a,
            nonblocking: AtomicBool::new(false),
        }),
    };
    (a, b)
}

impl PipeEnd {
    fn try_clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Read for PipeEnd {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let channel = &self.inner.incoming;
        let mut state = channel.lock();
        loop {
            if !state.buf.is_empty() {
                let n = out.len().min(state.buf.len());
                for (slot, byte) in out.iter_mut().zip(state.buf.drain(..n)) {
                    *slot = byte;
                }
                state.consumed += n;
                return Ok(n);
            }
            if state.closed {
                return Ok(0);
            }
            if self.inner.nonblocking.load(Ordering::Acquire) {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            state = channel
                .ready
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

impl Write for PipeEnd {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let channel = &self.inner.outgoing;
        let mut state = channel.lock();
        if state.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        state.buf.extend(data);
        drop(state);
        channel.ready.notify_all();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Tunnel for PipeEnd {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.inner.nonblocking.store(nonblocking, Ordering::Release);
        Ok(())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.inner.close();
        Ok(())
    }

    fn try_clone_tunnel(&self) -> io::Result<Box<dyn Tunnel>> {
        Ok(Box::new(self.try_clone()))
    }
}

// ============================================================================
// Scripted device
// ============================================================================

/// One packet the mock device writes to the video channel
#[derive(Debug, Clone)]
pub struct MockPacket {
    /// Device timestamp in ms; `None` stamps the device clock at write time
    pub pts_ms: Option<u64>,
    /// Extra bits OR-ed into the PTS field (the top two are flags)
    pub pts_flags: u64,
    pub data: Vec<u8>,
}

impl MockPacket {
    /// Start code, NAL header of `nal_type`, `body_len` filler bytes
    pub fn nal(nal_type: u8, body_len: usize) -> Self {
        let mut data = vec![0, 0, 0, 1, nal_type];
        data.extend(std::iter::repeat(0xAB).take(body_len));
        Self {
            pts_ms: None,
            pts_flags: 0,
            data,
        }
    }

    pub fn at(mut self, pts_ms: u64) -> Self {
        self.pts_ms = Some(pts_ms);
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.pts_flags = flags;
        self
    }
}

/// Parameter sets, one IDR, then `frames - 1` P slices
pub fn h264_script(frames: usize) -> Vec<MockPacket> {
    let mut script = vec![
        MockPacket::nal(NAL_TYPE_SPS, 8).with_flags(1 << 63),
        MockPacket::nal(8, 4).with_flags(1 << 63),
        MockPacket::nal(NAL_TYPE_IDR, 64),
    ];
    script.extend((1..frames).map(|_| MockPacket::nal(1, 32)));
    script
}

/// Behaviour of a [`MockDevice`]
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub device_name: String,
    pub width: u16,
    pub height: u16,
    /// First byte of the handshake
    pub marker: u8,
    /// Frame each packet with a 12-byte header
    pub send_frame_meta: bool,
    /// Device clock = local clock - skew
    pub clock_skew_ms: i64,
    /// Number of initial `open_tunnel` calls that fail
    pub tunnel_failures: usize,
    pub packets: Vec<MockPacket>,
    /// Pause between packets
    pub packet_interval: Duration,
    /// Close the video channel once the script is written
    pub close_after_script: bool,
    /// What the launched server prints first
    pub server_banner: Vec<u8>,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            device_name: "MockPhone".to_string(),
            width: 1280,
            height: 720,
            marker: 0x00,
            send_frame_meta: true,
            clock_skew_ms: 0,
            tunnel_failures: 0,
            packets: h264_script(30),
            packet_interval: Duration::ZERO,
            close_after_script: false,
            server_banner: b"[server] INFO: Device: mock\n".to_vec(),
        }
    }
}

/// Server process stand-in
pub struct MockServerProcess {
    output: Cursor<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl Read for MockServerProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}

impl ServerProcess for MockServerProcess {
    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory `DeviceExecutor`
pub struct MockDevice {
    config: MockDeviceConfig,
    attempts: AtomicUsize,
    opened: AtomicUsize,
    pushed: Mutex<Vec<(PathBuf, String)>>,
    shell_args: Mutex<Vec<Vec<String>>>,
    server_closed: Arc<AtomicBool>,
    video: Mutex<Option<Arc<PipeChannel>>>,
}

impl MockDevice {
    pub fn new(config: MockDeviceConfig) -> Self {
        Self {
            config,
            attempts: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            pushed: Mutex::new(Vec::new()),
            shell_args: Mutex::new(Vec::new()),
            server_closed: Arc::new(AtomicBool::new(false)),
            video: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MockDeviceConfig::default())
    }

    pub fn config(&self) -> &MockDeviceConfig {
        &self.config
    }

    /// Every `open_tunnel` call so far, failed ones included
    pub fn tunnel_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Bytes the client has read from the video channel
    pub fn video_bytes_read(&self) -> usize {
        lock(&self.video).as_ref().map_or(0, |c| c.consumed())
    }

    pub fn pushed_files(&self) -> Vec<(PathBuf, String)> {
        lock(&self.pushed).clone()
    }

    pub fn shell_commands(&self) -> Vec<Vec<String>> {
        lock(&self.shell_args).clone()
    }

    pub fn server_closed(&self) -> bool {
        self.server_closed.load(Ordering::SeqCst)
    }

    /// Handshake bytes: marker, padded name, video header
    pub fn handshake_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.config.marker];
        let mut name = [0u8; DEVICE_NAME_LEN];
        let raw = self.config.device_name.as_bytes();
        let n = raw.len().min(DEVICE_NAME_LEN);
        name[..n].copy_from_slice(&raw[..n]);
        out.extend_from_slice(&name);
        let mut header = [0u8; VIDEO_HEADER_LEN];
        header[..2].copy_from_slice(&self.config.width.to_be_bytes());
        header[2..4].copy_from_slice(&self.config.height.to_be_bytes());
        out.extend_from_slice(&header);
        out
    }

    fn device_time_ms(skew_ms: i64) -> i64 {
        unix_time_ms() as i64 - skew_ms
    }

    fn open_video(&self) -> io::Result<Box<dyn Tunnel>> {
        let (host, mut device) = pipe_pair();
        *lock(&self.video) = Some(Arc::clone(&device.inner.outgoing));

        device.write_all(&self.handshake_bytes())?;
        let config = self.config.clone();
        thread::Builder::new()
            .name("mock-video".to_string())
            .spawn(move || feed_video(device, config))?;
        Ok(Box::new(host))
    }

    fn open_control(&self) -> io::Result<Box<dyn Tunnel>> {
        let (host, device) = pipe_pair();
        let skew_ms = self.config.clock_skew_ms;
        thread::Builder::new()
            .name("mock-control".to_string())
            .spawn(move || answer_control(device, skew_ms))?;
        Ok(Box::new(host))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn feed_video(mut device: PipeEnd, config: MockDeviceConfig) {
    for (index, packet) in config.packets.iter().enumerate() {
        let written = if config.send_frame_meta {
            let pts = packet
                .pts_ms
                .unwrap_or_else(|| MockDevice::device_time_ms(config.clock_skew_ms).max(0) as u64);
            let mut record = Vec::with_capacity(12 + packet.data.len());
            record.extend_from_slice(&(pts | packet.pts_flags).to_be_bytes());
            record.extend_from_slice(&(packet.data.len() as u32).to_be_bytes());
            record.extend_from_slice(&packet.data);
            device.write_all(&record)
        } else {
            device.write_all(&packet.data)
        };
        if written.is_err() {
            debug!(index, "mock video channel closed by host");
            return;
        }
        trace!(index, len = packet.data.len(), "mock packet written");
        if !config.packet_interval.is_zero() {
            thread::sleep(config.packet_interval);
        }
    }

    if config.close_after_script {
        debug!("mock script finished, closing video channel");
        return;
    }
    // hold the channel open until the host closes it
    let mut sink = [0u8; 64];
    while matches!(device.read(&mut sink), Ok(n) if n > 0) {}
}

fn answer_control(mut device: PipeEnd, skew_ms: i64) {
    let mut cmd = [0u8; 1];
    while let Ok(1) = device.read(&mut cmd) {
        if cmd[0] != CONTROL_GET_CURRENT_TIME {
            trace!(cmd = cmd[0], "mock control ignored command");
            continue;
        }
        let mut reply = [0u8; 9];
        reply[0] = CONTROL_STATUS_TIME;
        reply[1..].copy_from_slice(&MockDevice::device_time_ms(skew_ms).to_be_bytes());
        if device.write_all(&reply).is_err() {
            break;
        }
    }
    debug!("mock control channel closed");
}

impl DeviceExecutor for MockDevice {
    fn describe(&self) -> String {
        format!("mock:{}", self.config.device_name)
    }

    fn push_file(&self, local: &Path, remote: &str) -> io::Result<()> {
        lock(&self.pushed).push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }

    fn shell(&self, args: &[String]) -> io::Result<Box<dyn ServerProcess>> {
        lock(&self.shell_args).push(args.to_vec());
        Ok(Box::new(MockServerProcess {
            output: Cursor::new(self.config.server_banner.clone()),
            closed: Arc::clone(&self.server_closed),
        }))
    }

    fn open_tunnel(&self, channel: &str) -> io::Result<Box<dyn Tunnel>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.config.tunnel_failures {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("mock channel '{channel}' not ready"),
            ));
        }
        match self.opened.fetch_add(1, Ordering::SeqCst) {
            0 => self.open_video(),
            1 => self.open_control(),
            _ => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock device accepts two channels",
            )),
        }
    }
}

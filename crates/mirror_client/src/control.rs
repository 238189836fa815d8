//! Control channel and device clock offset estimation

use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};

use contracts::{unix_time_ms, Tunnel};
use tracing::{debug, instrument, trace};

use crate::error::{MirrorClientError, Result};
use crate::wire::{CONTROL_GET_CURRENT_TIME, CONTROL_STATUS_TIME};

/// Anything that can report the device wall clock in milliseconds
pub trait DeviceClock {
    fn query_device_time(&self) -> Result<i64>;
}

/// Request/response channel over the control tunnel
///
/// One request is in flight at a time. A second handle to the same tunnel is
/// kept outside the lock so `shutdown` can interrupt a blocked query.
pub struct ControlChannel {
    tunnel: Mutex<Box<dyn Tunnel>>,
    interrupt: Mutex<Box<dyn Tunnel>>,
}

impl ControlChannel {
    pub fn new(tunnel: Box<dyn Tunnel>) -> Result<Self> {
        let interrupt = tunnel.try_clone_tunnel()?;
        Ok(Self {
            tunnel: Mutex::new(tunnel),
            interrupt: Mutex::new(interrupt),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Tunnel>> {
        self.tunnel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the tunnel; a blocked query fails
    pub fn shutdown(&self) -> io::Result<()> {
        self.interrupt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shutdown()
    }
}

impl DeviceClock for ControlChannel {
    fn query_device_time(&self) -> Result<i64> {
        let mut guard = self.lock();
        let tunnel: &mut dyn Tunnel = &mut **guard;

        let drained = drain_stale(tunnel)?;
        if drained > 0 {
            trace!(drained, "discarded stale control bytes");
        }

        tunnel
            .write_all(&[CONTROL_GET_CURRENT_TIME])
            .and_then(|_| tunnel.flush())
            .map_err(|e| MirrorClientError::protocol(format!("failed to send time query: {e}")))?;

        let mut status = [0u8; 1];
        read_reply(tunnel, &mut status, "status")?;
        if status[0] != CONTROL_STATUS_TIME {
            return Err(MirrorClientError::protocol(format!(
                "unexpected control status {} (expected {CONTROL_STATUS_TIME})",
                status[0]
            )));
        }

        let mut time = [0u8; 8];
        read_reply(tunnel, &mut time, "device time")?;
        Ok(i64::from_be_bytes(time))
    }
}

fn read_reply(tunnel: &mut dyn Tunnel, buf: &mut [u8], what: &str) -> Result<()> {
    tunnel
        .read_exact(buf)
        .map_err(|e| MirrorClientError::protocol(format!("short read of control {what}: {e}")))
}

/// Read and discard whatever is already buffered, without blocking
fn drain_stale(tunnel: &mut dyn Tunnel) -> Result<usize> {
    let to_protocol =
        |e: io::Error| MirrorClientError::protocol(format!("control channel I/O failed: {e}"));

    tunnel.set_nonblocking(true).map_err(to_protocol)?;
    let mut scratch = [0u8; 1024];
    let mut drained = 0usize;
    let outcome = loop {
        match tunnel.read(&mut scratch) {
            Ok(0) => break Ok(()),
            Ok(n) => drained += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };
    tunnel.set_nonblocking(false).map_err(to_protocol)?;
    outcome.map_err(to_protocol)?;
    Ok(drained)
}

/// Result of a clock offset estimation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetEstimate {
    /// `local - device`, milliseconds, half a round trip removed
    pub offset_ms: f64,
    pub mean_diff_ms: f64,
    pub round_trip_ms: f64,
    pub samples: u32,
}

/// Estimate `local - device` against the system clock
pub fn estimate_offset<C: DeviceClock + ?Sized>(clock: &C, samples: u32) -> Result<OffsetEstimate> {
    estimate_offset_with(clock, samples, unix_time_ms)
}

/// Estimate `local - device` with an injected local clock (milliseconds)
#[instrument(name = "estimate_offset", skip(clock, now_ms))]
pub fn estimate_offset_with<C, N>(clock: &C, samples: u32, mut now_ms: N) -> Result<OffsetEstimate>
where
    C: DeviceClock + ?Sized,
    N: FnMut() -> f64,
{
    if samples == 0 {
        return Err(MirrorClientError::protocol(
            "offset estimation needs at least one sample",
        ));
    }

    let started = now_ms();
    let mut diff_total = 0.0;
    for _ in 0..samples {
        let device = clock.query_device_time()?;
        let local = now_ms();
        diff_total += local - device as f64;
    }
    let n = f64::from(samples);
    let round_trip_ms = (now_ms() - started) / n;
    let mean_diff_ms = diff_total / n;
    let offset_ms = mean_diff_ms - round_trip_ms / 2.0;

    debug!(offset_ms, round_trip_ms, samples, "device clock offset estimated");
    Ok(OffsetEstimate {
        offset_ms,
        mean_diff_ms,
        round_trip_ms,
        samples,
    })
}

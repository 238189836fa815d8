//! JSON-lines gaze source over TCP
//!
//! Reads one `GazeSample` JSON object per line, e.g.
//! `{"timestamp_unix_seconds":1700000000.125,"x":812.5,"y":604.0,"worn":true}`.

use std::io::{BufRead, BufReader};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use contracts::{ContractError, GazeSample, GazeSource};
use tracing::{info, instrument, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JsonLinesGazeSource {
    name: String,
    address: String,
    reader: Mutex<BufReader<TcpStream>>,
    control: TcpStream,
    offset_ms: f64,
    closed: AtomicBool,
}

impl JsonLinesGazeSource {
    /// Connect to `address` (`host:port`); `offset_ms` is reported as the clock offset
    #[instrument(name = "jsonl_gaze_connect")]
    pub fn connect(address: &str, offset_ms: f64) -> Result<Self, ContractError> {
        let name = format!("jsonl:{address}");
        let addr = std::net::ToSocketAddrs::to_socket_addrs(address)
            .map_err(|e| ContractError::gaze_source(&name, format!("bad address: {e}")))?
            .next()
            .ok_or_else(|| ContractError::gaze_source(&name, "address did not resolve"))?;
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| ContractError::gaze_source(&name, format!("connect failed: {e}")))?;
        let control = stream.try_clone()?;
        info!(address, "gaze stream connected");
        Ok(Self {
            name,
            address: address.to_string(),
            reader: Mutex::new(BufReader::new(stream)),
            control,
            offset_ms,
            closed: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn reader(&self) -> MutexGuard<'_, BufReader<TcpStream>> {
        self.reader.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse one line; blank lines yield `None`
pub fn parse_line(line: &str) -> Option<Result<GazeSample, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

impl GazeSource for JsonLinesGazeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive_sample(&self) -> Result<GazeSample, ContractError> {
        let mut reader = self.reader();
        let mut line = String::new();
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(ContractError::gaze_source(&self.name, "source closed"));
            }
            line.clear();
            let n = reader
                .read_line(&mut line)
                .map_err(|e| ContractError::gaze_source(&self.name, format!("read failed: {e}")))?;
            if n == 0 {
                return Err(ContractError::gaze_source(&self.name, "stream ended"));
            }
            match parse_line(&line) {
                None => continue,
                Some(Ok(sample)) => return Ok(sample),
                Some(Err(e)) => {
                    metrics::counter!("gaze_sync_gaze_parse_errors_total").increment(1);
                    warn!(source = %self.name, error = %e, "skipping malformed gaze line");
                }
            }
        }
    }

    fn estimate_offset_ms(&self) -> Result<f64, ContractError> {
        Ok(self.offset_ms)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.control.shutdown(Shutdown::Both);
        }
    }
}

//! `DeviceExecutor` over the adb server's host protocol
//!
//! Requests are a 4-digit hex length followed by the payload. The server
//! answers `OKAY` or `FAIL` + length-prefixed message. After
//! `host:transport:<serial>` the same socket is bound to the device and the
//! next request (`shell:`, `localabstract:`, `sync:`) turns it into a raw
//! stream.

use std::fs;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{DeviceExecutor, ServerProcess, Tunnel};
use tracing::{debug, info, instrument};

pub const DEFAULT_ADB_HOST: &str = "127.0.0.1";
pub const DEFAULT_ADB_PORT: u16 = 5037;
/// Largest DATA block the sync service accepts
const SYNC_DATA_MAX: usize = 64 * 1024;
const SYNC_FILE_MODE: u32 = 0o100644;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// One line of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbDevice {
    pub serial: String,
    /// `device`, `offline`, `unauthorized`, ...
    pub state: String,
}

impl AdbDevice {
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}

/// Device reached through a local adb server
#[derive(Debug, Clone)]
pub struct AdbExecutor {
    host: String,
    port: u16,
    serial: String,
}

impl AdbExecutor {
    pub fn new(host: impl Into<String>, port: u16, serial: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            serial: serial.into(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Devices known to the adb server
    pub fn list_devices(host: &str, port: u16) -> io::Result<Vec<AdbDevice>> {
        let mut stream = connect_server(host, port)?;
        send_request(&mut stream, "host:devices")?;
        let listing = read_length_prefixed(&mut stream)?;
        Ok(parse_device_list(&listing))
    }

    /// Pick a device by serial, by index into the online list, or the first online one
    #[instrument(name = "adb_select_device", skip(host))]
    pub fn select(
        host: &str,
        port: u16,
        serial: Option<&str>,
        index: Option<usize>,
    ) -> io::Result<Self> {
        if let Some(serial) = serial {
            return Ok(Self::new(host, port, serial));
        }
        let online: Vec<AdbDevice> = Self::list_devices(host, port)?
            .into_iter()
            .filter(AdbDevice::is_online)
            .collect();
        let index = index.unwrap_or(0);
        let device = online.get(index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no online device at index {index} ({} online)", online.len()),
            )
        })?;
        info!(serial = %device.serial, index, "device selected");
        Ok(Self::new(host, port, device.serial.clone()))
    }

    /// Socket bound to this device's transport
    fn transport(&self) -> io::Result<TcpStream> {
        let mut stream = connect_server(&self.host, self.port)?;
        send_request(&mut stream, &format!("host:transport:{}", self.serial))?;
        Ok(stream)
    }
}

fn connect_server(host: &str, port: u16) -> io::Result<TcpStream> {
    let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {host}"))
    })?;
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Encode a host request: 4 hex digits of length, then the payload
pub fn encode_request(request: &str) -> Vec<u8> {
    let mut out = format!("{:04x}", request.len()).into_bytes();
    out.extend_from_slice(request.as_bytes());
    out
}

fn send_request<S: Read + Write>(stream: &mut S, request: &str) -> io::Result<()> {
    stream.write_all(&encode_request(request))?;
    read_status(stream)
}

fn read_status<S: Read>(stream: &mut S) -> io::Result<()> {
    let mut status = [0u8; 4];
    stream.read_exact(&mut status)?;
    match &status {
        b"OKAY" => Ok(()),
        b"FAIL" => {
            let message = read_length_prefixed(stream)?;
            Err(io::Error::other(format!("adb: {message}")))
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected adb status {:?}", String::from_utf8_lossy(other)),
        )),
    }
}

fn read_length_prefixed<S: Read>(stream: &mut S) -> io::Result<String> {
    let mut len_hex = [0u8; 4];
    stream.read_exact(&mut len_hex)?;
    let len = std::str::from_utf8(&len_hex)
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad adb length prefix"))?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

/// Parse `serial\tstate` lines
pub fn parse_device_list(listing: &str) -> Vec<AdbDevice> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(AdbDevice {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

fn sync_command<W: Write>(stream: &mut W, id: &[u8; 4], arg: u32) -> io::Result<()> {
    stream.write_all(id)?;
    stream.write_all(&arg.to_le_bytes())
}

/// Output stream of `adb shell`
pub struct AdbShell {
    stream: TcpStream,
}

impl Read for AdbShell {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl ServerProcess for AdbShell {
    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl DeviceExecutor for AdbExecutor {
    fn describe(&self) -> String {
        format!("adb:{}", self.serial)
    }

    #[instrument(name = "adb_push", skip(self, local), fields(serial = %self.serial))]
    fn push_file(&self, local: &Path, remote: &str) -> io::Result<()> {
        let data = fs::read(local)?;
        let mut stream = self.transport()?;
        send_request(&mut stream, "sync:")?;

        let target = format!("{remote},{SYNC_FILE_MODE}");
        sync_command(&mut stream, b"SEND", target.len() as u32)?;
        stream.write_all(target.as_bytes())?;
        for block in data.chunks(SYNC_DATA_MAX) {
            sync_command(&mut stream, b"DATA", block.len() as u32)?;
            stream.write_all(block)?;
        }
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        sync_command(&mut stream, b"DONE", mtime)?;

        let mut reply = [0u8; 8];
        stream.read_exact(&mut reply)?;
        let len = u32::from_le_bytes([reply[4], reply[5], reply[6], reply[7]]) as usize;
        match &reply[..4] {
            b"OKAY" => {
                debug!(bytes = data.len(), "file pushed");
                Ok(())
            }
            b"FAIL" => {
                let mut message = vec![0u8; len];
                stream.read_exact(&mut message)?;
                Err(io::Error::other(format!(
                    "adb push failed: {}",
                    String::from_utf8_lossy(&message)
                )))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected sync reply {:?}", String::from_utf8_lossy(other)),
            )),
        }
    }

    fn shell(&self, args: &[String]) -> io::Result<Box<dyn ServerProcess>> {
        let mut stream = self.transport()?;
        send_request(&mut stream, &format!("shell:{}", args.join(" ")))?;
        Ok(Box::new(AdbShell { stream }))
    }

    fn open_tunnel(&self, channel: &str) -> io::Result<Box<dyn Tunnel>> {
        let mut stream = self.transport()?;
        send_request(&mut stream, &format!("localabstract:{channel}"))?;
        Ok(Box::new(stream))
    }
}

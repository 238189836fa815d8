//! Capability traits consumed from external collaborators
//!
//! The device executor, the codec and the gaze source are opaque to the core:
//! the protocol client and the gaze client only talk to these traits, so real
//! devices and in-memory mocks plug in the same way.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;

use crate::{CodedPacket, ContractError, GazeSample, HandshakeInfo, VideoFrame};

/// Bidirectional byte stream to a named channel on the device
pub trait Tunnel: Read + Write + Send {
    /// Toggle non-blocking reads (`WouldBlock` instead of waiting)
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Close both directions; a reader blocked on another handle returns
    fn shutdown(&self) -> io::Result<()>;

    /// Second handle to the same connection
    fn try_clone_tunnel(&self) -> io::Result<Box<dyn Tunnel>>;
}

impl Tunnel for TcpStream {
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown(&self) -> io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn try_clone_tunnel(&self) -> io::Result<Box<dyn Tunnel>> {
        Ok(Box::new(self.try_clone()?))
    }
}

/// Output stream of a remote shell command
pub trait ServerProcess: Read + Send {
    /// Terminate the remote process and release the stream
    fn close(&mut self) -> io::Result<()>;
}

/// Device-side operations needed to bootstrap the video transport
pub trait DeviceExecutor: Send + Sync {
    /// Human-readable device identifier (for logging)
    fn describe(&self) -> String;

    /// Copy a local file to `remote` on the device
    fn push_file(&self, local: &Path, remote: &str) -> io::Result<()>;

    /// Run a shell command on the device and stream its output
    fn shell(&self, args: &[String]) -> io::Result<Box<dyn ServerProcess>>;

    /// Connect to a local-abstract socket on the device
    fn open_tunnel(&self, channel: &str) -> io::Result<Box<dyn Tunnel>>;
}

/// Elementary-stream parser plus decoder
pub trait Codec: Send {
    fn name(&self) -> &str;

    /// Called once after the handshake with the initial geometry
    fn configure(&mut self, _info: &HandshakeInfo) {}

    /// Split raw transport bytes into coded packets
    fn parse(&mut self, data: &[u8]) -> Result<Vec<CodedPacket>, ContractError>;

    /// Decode one packet into zero or more frames
    fn decode(&mut self, packet: &CodedPacket) -> Result<Vec<VideoFrame>, ContractError>;
}

/// Eye-tracker sample stream
///
/// Methods take `&self` so that [`GazeSource::close`] can interrupt a
/// [`GazeSource::receive_sample`] blocked on another thread.
pub trait GazeSource: Send + Sync {
    fn name(&self) -> &str;

    /// Block until the next sample arrives
    fn receive_sample(&self) -> Result<GazeSample, ContractError>;

    /// Tracker's own `local - tracker` clock estimate, milliseconds
    fn estimate_offset_ms(&self) -> Result<f64, ContractError>;

    /// Release the connection; pending and future receives fail
    fn close(&self);
}

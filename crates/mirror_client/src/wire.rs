//! Byte-level layout of the video and control sockets
//!
//! All integers are big-endian. The device writes, in order: a one-byte
//! marker, a 64-byte NUL-padded name, a 12-byte video header, then either
//! raw chunks or `[pts:u64][length:u32][payload]` records.

use std::io::{self, Read};

use bytes::Buf;

use crate::error::{MirrorClientError, Result};

/// First byte on the video socket
pub const HANDSHAKE_MARKER: u8 = 0x00;
/// Device name field size
pub const DEVICE_NAME_LEN: usize = 64;
/// Codec id + width + height header size
pub const VIDEO_HEADER_LEN: usize = 12;
/// Per-packet metadata size
pub const PACKET_HEADER_LEN: usize = 12;
/// Low 62 bits carry the timestamp, the top two are flags
pub const PTS_MASK: u64 = (1 << 62) - 1;
/// Read size when frame metadata is disabled
pub const RAW_CHUNK_LEN: usize = 65535;
/// Upper bound on a single framed payload
pub const MAX_PACKET_LEN: usize = 16 * 1024 * 1024;

/// Index of the NAL header byte after a 4-byte start code
pub const NAL_HEADER_OFFSET: usize = 4;
pub const NAL_TYPE_MASK: u8 = 0x1F;
/// IDR slice
pub const NAL_TYPE_IDR: u8 = 5;
/// Sequence parameter set
pub const NAL_TYPE_SPS: u8 = 7;

/// Control command: query device wall clock
pub const CONTROL_GET_CURRENT_TIME: u8 = 18;
/// Control status preceding a device time reply
pub const CONTROL_STATUS_TIME: u8 = 3;

/// Fill `buf` completely, mapping any failure to a connection error
pub fn read_exact_or_disconnect<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            MirrorClientError::connection(format!("short read of {what}: socket closed"))
        }
        _ => MirrorClientError::connection(format!("failed to read {what}: {e}")),
    })
}

/// Consume the one-byte marker
pub fn read_marker<R: Read + ?Sized>(reader: &mut R) -> Result<()> {
    let mut marker = [0u8; 1];
    read_exact_or_disconnect(reader, &mut marker, "handshake marker")?;
    if marker[0] != HANDSHAKE_MARKER {
        return Err(MirrorClientError::connection(format!(
            "unexpected handshake marker 0x{:02x}",
            marker[0]
        )));
    }
    Ok(())
}

/// Consume the NUL-padded device name
pub fn read_device_name<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let mut raw = [0u8; DEVICE_NAME_LEN];
    read_exact_or_disconnect(reader, &mut raw, "device name")?;
    let name = decode_device_name(&raw);
    if name.is_empty() {
        return Err(MirrorClientError::connection("did not receive device name"));
    }
    Ok(name)
}

pub fn decode_device_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string()
}

/// Consume the video header, returning `(width, height)`
pub fn read_video_header<R: Read + ?Sized>(reader: &mut R) -> Result<(u16, u16)> {
    let mut raw = [0u8; VIDEO_HEADER_LEN];
    read_exact_or_disconnect(reader, &mut raw, "video header")?;
    let mut buf = &raw[..];
    let width = buf.get_u16();
    let height = buf.get_u16();
    Ok((width, height))
}

/// Per-packet metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Device timestamp in milliseconds, flag bits removed
    pub pts: u64,
    pub length: u32,
}

impl PacketHeader {
    pub fn decode(raw: &[u8; PACKET_HEADER_LEN]) -> Self {
        let mut buf = &raw[..];
        let pts = buf.get_u64() & PTS_MASK;
        let length = buf.get_u32();
        Self { pts, length }
    }

    /// Presentation time in seconds on the device clock
    pub fn pts_seconds(&self) -> f64 {
        self.pts as f64 * 0.001
    }
}

pub fn read_packet_header<R: Read + ?Sized>(reader: &mut R) -> Result<PacketHeader> {
    let mut raw = [0u8; PACKET_HEADER_LEN];
    read_exact_or_disconnect(reader, &mut raw, "packet header")?;
    let header = PacketHeader::decode(&raw);
    if header.length as usize > MAX_PACKET_LEN {
        return Err(MirrorClientError::connection(format!(
            "packet length {} exceeds limit {MAX_PACKET_LEN}",
            header.length
        )));
    }
    Ok(header)
}

/// Single read of up to `buf.len()` bytes; zero bytes means the peer closed
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(0) => return Err(MirrorClientError::connection("video socket closed")),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(MirrorClientError::connection(format!(
                    "failed to read video chunk: {e}"
                )))
            }
        }
    }
}

/// NAL unit type of a chunk that starts with a 4-byte start code
pub fn nal_unit_type(chunk: &[u8]) -> Option<u8> {
    chunk
        .get(NAL_HEADER_OFFSET)
        .map(|header| header & NAL_TYPE_MASK)
}

/// Drops everything before the first IDR except parameter sets
#[derive(Debug, Default)]
pub struct KeyframeGate {
    keyframe_seen: bool,
}

impl KeyframeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `chunk` should reach the codec
    pub fn admit(&mut self, chunk: &[u8]) -> bool {
        let nal = nal_unit_type(chunk);
        if nal == Some(NAL_TYPE_IDR) {
            self.keyframe_seen = true;
        }
        self.keyframe_seen || nal == Some(NAL_TYPE_SPS)
    }

    pub fn keyframe_seen(&self) -> bool {
        self.keyframe_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk(nal: u8) -> Vec<u8> {
        vec![0, 0, 0, 1, nal, 0xAA, 0xBB]
    }

    #[test]
    fn test_pts_top_bits_are_ignored() {
        let mut plain = [0u8; PACKET_HEADER_LEN];
        plain[..8].copy_from_slice(&1_234_567u64.to_be_bytes());
        plain[8..].copy_from_slice(&42u32.to_be_bytes());

        let mut flagged = plain;
        flagged[0] |= 0xC0;

        let a = PacketHeader::decode(&plain);
        let b = PacketHeader::decode(&flagged);
        assert_eq!(a, b);
        assert_eq!(a.pts, 1_234_567);
        assert_eq!(a.length, 42);
        assert!((a.pts_seconds() - 1234.567).abs() < 1e-9);
    }

    #[test]
    fn test_packet_header_short_read_is_connection_error() {
        let mut cursor = Cursor::new(vec![0u8; 7]);
        let err = read_packet_header(&mut cursor).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut raw = vec![0u8; 8];
        raw.extend_from_slice(&u32::MAX.to_be_bytes());
        let err = read_packet_header(&mut Cursor::new(raw)).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_marker_mismatch() {
        let mut cursor = Cursor::new(vec![0x01, 0x00]);
        assert!(read_marker(&mut cursor).unwrap_err().is_connection());
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_device_name_trims_padding() {
        let mut raw = vec![0u8; DEVICE_NAME_LEN];
        raw[..7].copy_from_slice(b"Pixel 7");
        let name = read_device_name(&mut Cursor::new(raw)).unwrap();
        assert_eq!(name, "Pixel 7");
    }

    #[test]
    fn test_empty_device_name_is_error() {
        let raw = vec![0u8; DEVICE_NAME_LEN];
        assert!(read_device_name(&mut Cursor::new(raw))
            .unwrap_err()
            .is_connection());
    }

    #[test]
    fn test_video_header_dimensions() {
        let mut raw = vec![0u8; VIDEO_HEADER_LEN];
        raw[..2].copy_from_slice(&1080u16.to_be_bytes());
        raw[2..4].copy_from_slice(&2400u16.to_be_bytes());
        raw[4] = 0xFF;
        let (w, h) = read_video_header(&mut Cursor::new(raw)).unwrap();
        assert_eq!((w, h), (1080, 2400));
    }

    #[test]
    fn test_read_chunk_eof() {
        let mut buf = [0u8; 16];
        let err = read_chunk(&mut Cursor::new(Vec::<u8>::new()), &mut buf).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_keyframe_gate() {
        let mut gate = KeyframeGate::new();
        assert!(!gate.admit(&chunk(1)));
        assert!(gate.admit(&chunk(NAL_TYPE_SPS)));
        assert!(!gate.admit(&chunk(8)));
        assert!(!gate.admit(&[0, 0, 1]));
        assert!(!gate.keyframe_seen());

        assert!(gate.admit(&chunk(0x65)));
        assert!(gate.keyframe_seen());
        assert!(gate.admit(&chunk(1)));
        assert!(gate.admit(&[0, 0]));
    }
}

//! Coded packet recorder
//!
//! Appends every published packet to an Annex-B elementary stream file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{CodedPacket, Listener, VideoEvent};
use tracing::{info, warn};

/// Totals after a recording is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub packets: u64,
    pub bytes: u64,
}

pub struct PacketRecorder {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl PacketRecorder {
    /// Create (or truncate) the output file
    pub fn create(path: impl AsRef<Path>) -> io::Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        info!(path = %path.display(), "recording coded packets");
        Ok(Arc::new(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }))
    }

    fn writer(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one packet; a closed recorder ignores it
    pub fn record(&self, packet: &CodedPacket) -> io::Result<()> {
        let mut guard = self.writer();
        let Some(writer) = guard.as_mut() else {
            return Ok(());
        };
        writer.write_all(&packet.data)?;
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes
            .fetch_add(packet.data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Listener for `VideoEventKind::Packet`
    pub fn listener(self: &Arc<Self>) -> Listener<VideoEvent> {
        let recorder = Arc::clone(self);
        Arc::new(move |event: &VideoEvent| {
            if let VideoEvent::Packet { packet, sequence } = event {
                if let Err(e) = recorder.record(packet) {
                    warn!(sequence, error = %e, path = %recorder.path.display(), "failed to record packet");
                }
            }
        })
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Flush and close the file; later packets are dropped
    pub fn finish(&self) -> io::Result<RecordingSummary> {
        if let Some(mut writer) = self.writer().take() {
            writer.flush()?;
        }
        let summary = RecordingSummary {
            path: self.path.clone(),
            packets: self.packets(),
            bytes: self.bytes.load(Ordering::Relaxed),
        };
        info!(
            path = %summary.path.display(),
            packets = summary.packets,
            bytes = summary.bytes,
            "recording closed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn packet(data: &'static [u8]) -> CodedPacket {
        CodedPacket {
            data: Bytes::from_static(data),
            nal_type: None,
            keyframe: false,
        }
    }

    #[test]
    fn test_records_packets_in_order() {
        let dir = TempDir::new().unwrap();
        let recorder = PacketRecorder::create(dir.path().join("out/stream.h264")).unwrap();
        let listener = recorder.listener();

        listener(&VideoEvent::Packet {
            packet: packet(&[0, 0, 0, 1, 0x67]),
            sequence: 0,
        });
        listener(&VideoEvent::Disconnect);
        listener(&VideoEvent::Packet {
            packet: packet(&[0, 0, 0, 1, 0x65, 9]),
            sequence: 1,
        });

        let summary = recorder.finish().unwrap();
        assert_eq!(summary.packets, 2);
        assert_eq!(summary.bytes, 11);

        let written = std::fs::read(dir.path().join("out/stream.h264")).unwrap();
        assert_eq!(written, vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x65, 9]);
    }

    #[test]
    fn test_finished_recorder_ignores_packets() {
        let dir = TempDir::new().unwrap();
        let recorder = PacketRecorder::create(dir.path().join("s.h264")).unwrap();
        recorder.finish().unwrap();
        recorder.record(&packet(&[1, 2, 3])).unwrap();
        assert_eq!(recorder.packets(), 0);
    }
}

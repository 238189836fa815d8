//! Builds the device executor and gaze source a run streams from.

use std::sync::Arc;
use std::time::Duration;

use contracts::{DeviceConfig, DeviceExecutor, GazeConfig, GazeSource, GazeSourceKind};
use ingestion::{JsonLinesGazeSource, MockGazeConfig, MockGazeSource};
use mirror_client::{h264_script, AdbExecutor, MockDevice, MockDeviceConfig};
use tracing::info;

use crate::error::{CliError, Result};

/// Device clock lag of the mock device, so the offset estimate has work to do
const MOCK_DEVICE_SKEW_MS: i64 = 1500;

/// Shape of the mock video stream
#[derive(Debug, Clone, Copy)]
pub struct MockVideo {
    pub frames: usize,
    pub fps: u32,
}

impl MockVideo {
    fn device_config(self) -> MockDeviceConfig {
        MockDeviceConfig {
            clock_skew_ms: MOCK_DEVICE_SKEW_MS,
            packets: h264_script(self.frames),
            packet_interval: Duration::from_millis(1000 / u64::from(self.fps.max(1))),
            close_after_script: true,
            ..Default::default()
        }
    }
}

/// Mock device, or the adb device picked by serial/index
///
/// Blocks on the adb server when no serial is configured.
pub fn video_executor(
    device: &DeviceConfig,
    mock: Option<MockVideo>,
) -> Result<Arc<dyn DeviceExecutor>> {
    if let Some(mock) = mock {
        info!(frames = mock.frames, fps = mock.fps, "Using mock device");
        return Ok(Arc::new(MockDevice::new(mock.device_config())));
    }

    let executor = AdbExecutor::select(
        &device.adb_host,
        device.adb_port,
        device.serial.as_deref(),
        device.device_index,
    )
    .map_err(|e| {
        CliError::device(format!(
            "cannot select device via adb at {}:{}: {e}",
            device.adb_host, device.adb_port
        ))
    })?;
    info!(serial = %executor.serial(), "Using adb device");
    Ok(Arc::new(executor))
}

/// Gaze source from configuration; `force_mock` overrides the configured kind
pub fn gaze_source(gaze: &GazeConfig, force_mock: bool) -> Result<Arc<dyn GazeSource>> {
    let kind = if force_mock {
        GazeSourceKind::Mock
    } else {
        gaze.source
    };

    match kind {
        GazeSourceKind::Mock => Ok(Arc::new(MockGazeSource::new(MockGazeConfig {
            rate_hz: gaze.rate_hz,
            clock_skew_ms: gaze.offset_ms,
            ..Default::default()
        }))),
        GazeSourceKind::JsonLines => {
            let address = gaze
                .address
                .as_deref()
                .ok_or_else(|| CliError::gaze_source("json_lines source has no address"))?;
            let source = JsonLinesGazeSource::connect(address, gaze.offset_ms)
                .map_err(|e| CliError::gaze_source(e.to_string()))?;
            Ok(Arc::new(source))
        }
    }
}

//! Mirror Client
//!
//! Video-transport protocol client for a mirrored Android device.
//!
//! # Components
//!
//! - [`VideoStreamClient`]: server bootstrap, handshake, framed streaming,
//!   keyframe gating and event fan-out
//! - [`ControlChannel`] / [`estimate_offset`]: device clock offset
//! - [`AdbExecutor`]: `DeviceExecutor` over a local adb server
//! - [`AnnexBCodec`]: H.264 Annex-B pass-through codec
//! - [`PacketRecorder`]: writes coded packets to an `.h264` file
//! - [`MockDevice`]: in-memory device for tests and offline runs

pub mod adb;
pub mod annexb;
pub mod client;
pub mod control;
pub mod error;
pub mod mock_device;
pub mod recorder;
pub mod server;
pub mod wire;

pub use adb::{AdbDevice, AdbExecutor, DEFAULT_ADB_HOST, DEFAULT_ADB_PORT};
pub use annexb::AnnexBCodec;
pub use client::VideoStreamClient;
pub use control::{estimate_offset, estimate_offset_with, ControlChannel, DeviceClock, OffsetEstimate};
pub use error::{MirrorClientError, Result};
pub use mock_device::{h264_script, MockDevice, MockDeviceConfig, MockPacket};
pub use recorder::{PacketRecorder, RecordingSummary};
pub use server::{server_command, REMOTE_SERVER_PATH};

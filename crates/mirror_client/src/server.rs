//! Device-side server deployment

use std::io::Read;
use std::path::Path;

use contracts::{DeviceExecutor, ServerProcess, VideoStreamConfig};
use tracing::{debug, info, instrument};

use crate::error::{MirrorClientError, Result};

/// Where the server jar is pushed on the device
pub const REMOTE_SERVER_PATH: &str = "/data/local/tmp/scrcpy-server.jar";
pub const SERVER_CLASS: &str = "com.genymobile.scrcpy.Server";
/// Local-abstract socket the server listens on
pub const TUNNEL_CHANNEL: &str = "scrcpy";
pub const DEFAULT_ENCODER: &str = "OMX.qcom.video.encoder.avc";
pub const DEFAULT_CODEC: &str = "h264";
/// Bytes read from the server output before opening tunnels
pub const READY_BANNER_LEN: usize = 10;

/// Shell command line that launches the server
pub fn server_command(config: &VideoStreamConfig, remote_path: &str) -> Vec<String> {
    let codec = config
        .codec
        .map(|c| c.as_str())
        .unwrap_or(DEFAULT_CODEC);
    let encoder = config.encoder_name.as_deref().unwrap_or(DEFAULT_ENCODER);

    let mut args = vec![
        format!("CLASSPATH={remote_path}"),
        "app_process".to_string(),
        "/".to_string(),
        SERVER_CLASS.to_string(),
        config.server_version.clone(),
        "log_level=info".to_string(),
        format!("max_size={}", config.max_size),
        format!("max_fps={}", config.max_fps),
        format!("video_bit_rate={}", config.bit_rate),
        format!("video_encoder={encoder}"),
        format!("video_codec={codec}"),
        "video_codec_options=i-frame-interval=1".to_string(),
        "tunnel_forward=true".to_string(),
        format!("send_frame_meta={}", config.send_frame_meta),
        "control=true".to_string(),
        "audio=false".to_string(),
        "show_touches=false".to_string(),
        format!("stay_awake={}", config.stay_awake),
        "power_off_on_close=false".to_string(),
        "clipboard_autosync=false".to_string(),
    ];
    if let Some(crop) = &config.crop {
        args.push(format!("crop={crop}"));
    }
    args
}

/// Push the jar, launch it, and wait for its first output
#[instrument(name = "deploy_server", skip(executor, config), fields(device = %executor.describe()))]
pub fn deploy_server(
    executor: &dyn DeviceExecutor,
    local_jar: &Path,
    config: &VideoStreamConfig,
) -> Result<Box<dyn ServerProcess>> {
    executor
        .push_file(local_jar, REMOTE_SERVER_PATH)
        .map_err(|e| {
            MirrorClientError::server(format!(
                "failed to push {} to {REMOTE_SERVER_PATH}: {e}",
                local_jar.display()
            ))
        })?;

    let args = server_command(config, REMOTE_SERVER_PATH);
    debug!(command = %args.join(" "), "launching server");
    let mut process = executor
        .shell(&args)
        .map_err(|e| MirrorClientError::server(format!("failed to launch server: {e}")))?;

    let mut banner_buf = [0u8; READY_BANNER_LEN];
    let n = process
        .read(&mut banner_buf)
        .map_err(|e| MirrorClientError::server(format!("server output unreadable: {e}")))?;
    info!(
        banner = %String::from_utf8_lossy(&banner_buf[..n]).trim_end(),
        "server launched"
    );
    Ok(process)
}

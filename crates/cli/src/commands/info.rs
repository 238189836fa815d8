//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::SessionBlueprint;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct SessionInfo {
    version: String,
    device: DeviceInfo,
    video: VideoInfo,
    gaze: GazeInfo,
    sync: SyncInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_index: Option<usize>,
    adb: String,
    server_jar: String,
}

#[derive(Serialize)]
struct VideoInfo {
    max_size: u32,
    bit_rate: u32,
    max_fps: u32,
    send_frame_meta: bool,
    connect_attempts: u64,
    offset_samples: u32,
}

#[derive(Serialize)]
struct GazeInfo {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    rate_hz: f64,
}

#[derive(Serialize)]
struct SyncInfo {
    tolerance_ms: f64,
    frame_queue_limit: usize,
    gaze_queue_limit: usize,
    poll_interval_ms: u64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.toml {
        let toml = ConfigLoader::to_toml(&blueprint).context("Failed to render config")?;
        print!("{}", toml);
    } else if args.json {
        let info = build_session_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_session_info(&blueprint, args);
    }

    Ok(())
}

fn build_session_info(blueprint: &SessionBlueprint, args: &InfoArgs) -> SessionInfo {
    let device = &blueprint.device;
    let video = &blueprint.video;

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    SessionInfo {
        version: format!("{:?}", blueprint.version),
        device: DeviceInfo {
            serial: device.serial.clone(),
            device_index: device.device_index,
            adb: format!("{}:{}", device.adb_host, device.adb_port),
            server_jar: device.server_jar.display().to_string(),
        },
        video: VideoInfo {
            max_size: video.max_size,
            bit_rate: video.bit_rate,
            max_fps: video.max_fps,
            send_frame_meta: video.send_frame_meta,
            connect_attempts: video.connect_attempts(),
            offset_samples: video.offset_samples,
        },
        gaze: GazeInfo {
            source: format!("{:?}", blueprint.gaze.source),
            address: blueprint.gaze.address.clone(),
            rate_hz: blueprint.gaze.rate_hz,
        },
        sync: SyncInfo {
            tolerance_ms: blueprint.sync.tolerance * 1000.0,
            frame_queue_limit: blueprint.sync.frame_queue_limit,
            gaze_queue_limit: blueprint.sync.gaze_queue_limit,
            poll_interval_ms: blueprint.sync.poll_interval_ms,
        },
        sinks,
    }
}

fn print_session_info(blueprint: &SessionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 gaze-sync Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let device = &blueprint.device;
    println!("📱 Device");
    println!("   ├─ Version: {:?}", blueprint.version);
    match (&device.serial, device.device_index) {
        (Some(serial), _) => println!("   ├─ Serial: {}", serial),
        (None, Some(index)) => println!("   ├─ Index: {}", index),
        (None, None) => println!("   ├─ Selection: first online device"),
    }
    println!("   ├─ adb server: {}:{}", device.adb_host, device.adb_port);
    println!("   └─ Server jar: {}", device.server_jar.display());

    let video = &blueprint.video;
    println!("\n🎞  Video");
    println!(
        "   ├─ Max size: {}",
        if video.max_size == 0 {
            "native".to_string()
        } else {
            video.max_size.to_string()
        }
    );
    println!("   ├─ Bit rate: {} bps", video.bit_rate);
    println!("   ├─ Frame meta: {}", video.send_frame_meta);
    println!(
        "   ├─ Connect: {} attempts x {} ms",
        video.connect_attempts(),
        video.poll_interval_ms
    );
    println!("   └─ Offset samples: {}", video.offset_samples);

    let gaze = &blueprint.gaze;
    println!("\n👁  Gaze");
    println!("   ├─ Source: {:?}", gaze.source);
    if let Some(ref address) = gaze.address {
        println!("   ├─ Address: {}", address);
    }
    println!("   └─ Mock rate: {} Hz", gaze.rate_hz);

    let sync = &blueprint.sync;
    println!("\n⚙️  Sync Settings");
    println!("   ├─ Tolerance: {:.1} ms", sync.tolerance * 1000.0);
    println!("   ├─ Frame queue limit: {}", sync.frame_queue_limit);
    println!("   ├─ Gaze queue limit: {}", sync.gaze_queue_limit);
    println!("   └─ Poll interval: {} ms", sync.poll_interval_ms);

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {}) {:?}",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.params
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_hidden_unless_requested() {
        let blueprint: SessionBlueprint = serde_json::from_str(
            r#"{"sinks":[{"name":"out","sink_type":"file","params":{"path":"/tmp/x"}}]}"#,
        )
        .unwrap();

        let mut args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            toml: false,
            sinks: false,
        };
        assert!(build_session_info(&blueprint, &args).sinks.is_empty());

        args.sinks = true;
        let info = build_session_info(&blueprint, &args);
        assert_eq!(info.sinks.len(), 1);
        assert_eq!(info.sinks[0].sink_type, "File");
        assert_eq!(info.device.adb, "127.0.0.1:5037");
    }
}

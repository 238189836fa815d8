//! `devices` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use mirror_client::AdbExecutor;

use crate::cli::DevicesArgs;
use crate::error::CliError;

#[derive(Serialize)]
struct DeviceEntry {
    index: usize,
    serial: String,
    state: String,
    online: bool,
}

/// Execute the `devices` command
pub fn run_devices(args: &DevicesArgs) -> Result<()> {
    info!(host = %args.adb_host, port = args.adb_port, "Querying adb server");

    let devices = AdbExecutor::list_devices(&args.adb_host, args.adb_port).map_err(|e| {
        CliError::device(format!(
            "adb server at {}:{} unreachable: {}",
            args.adb_host, args.adb_port, e
        ))
    })?;

    let entries: Vec<DeviceEntry> = devices
        .iter()
        .enumerate()
        .map(|(index, device)| DeviceEntry {
            index,
            serial: device.serial.clone(),
            state: device.state.clone(),
            online: device.is_online(),
        })
        .collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&entries).context("Failed to serialize device list")?;
        println!("{}", json);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No devices attached");
        return Ok(());
    }

    println!("{:<6} {:<24} {}", "INDEX", "SERIAL", "STATE");
    for entry in &entries {
        println!("{:<6} {:<24} {}", entry.index, entry.serial, entry.state);
    }
    Ok(())
}

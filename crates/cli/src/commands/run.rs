//! `run` command implementation.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use config_loader::ConfigLoader;
use contracts::{SessionBlueprint, SinkConfig, SinkType};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{MockVideo, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        serial = ?blueprint.device.serial,
        gaze_source = ?blueprint.gaze.source,
        tolerance_ms = blueprint.sync.tolerance * 1000.0,
        sinks = blueprint.sinks.len(),
        mock = args.mock,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        mock: args.mock.then_some(MockVideo {
            frames: args.mock_frames,
            fps: args.mock_fps,
        }),
        max_pairs: (args.max_pairs > 0).then_some(args.max_pairs),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        record: args.record.clone(),
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        pairs = stats.pairs_dispatched,
        reason = %stats.stop_reason,
        pairs_per_sec = format!("{:.2}", stats.pairs_per_second()),
        "Pipeline completed"
    );
    stats.print_summary();
    println!("{}", stats.sync_metrics.summary());

    info!("gaze-sync finished");
    Ok(())
}

/// Config file plus CLI overrides
///
/// With `--mock` a missing config file falls back to defaults and a log sink.
fn load_blueprint(args: &RunArgs) -> Result<SessionBlueprint> {
    let mut blueprint = if args.config.exists() {
        info!(config = %args.config.display(), "Loading configuration");
        ConfigLoader::load_from_path(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?
    } else if args.mock {
        warn!(config = %args.config.display(), "Config not found, using mock defaults");
        SessionBlueprint {
            sinks: vec![SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                params: HashMap::from([("every".to_string(), "30".to_string())]),
            }],
            ..Default::default()
        }
    } else {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    };

    if let Some(serial) = &args.serial {
        info!(serial = %serial, "Overriding device serial from CLI");
        blueprint.device.serial = Some(serial.clone());
    }
    if let Some(index) = args.device_index {
        info!(index, "Overriding device index from CLI");
        blueprint.device.serial = None;
        blueprint.device.device_index = Some(index);
    }

    ConfigLoader::validate(&blueprint).context("Configuration invalid after CLI overrides")?;
    Ok(blueprint)
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves, leaving the other
/// stop conditions in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, stopping pipeline..."),
        _ = terminate => warn!("Received SIGTERM, stopping pipeline..."),
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SessionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Device:");
    match (&blueprint.device.serial, blueprint.device.device_index) {
        (Some(serial), _) => println!("  Serial: {}", serial),
        (None, Some(index)) => println!("  Index: {}", index),
        (None, None) => println!("  First online device"),
    }
    println!(
        "  adb: {}:{}",
        blueprint.device.adb_host, blueprint.device.adb_port
    );

    let video = &blueprint.video;
    println!("\nVideo:");
    println!(
        "  max_size={} bit_rate={} max_fps={}",
        video.max_size, video.bit_rate, video.max_fps
    );
    println!(
        "  connect: {} attempts every {} ms",
        video.connect_attempts(),
        video.poll_interval_ms
    );

    println!("\nGaze: {:?}", blueprint.gaze.source);
    if let Some(address) = &blueprint.gaze.address {
        println!("  Address: {}", address);
    }

    let sync = &blueprint.sync;
    println!("\nSync Settings:");
    println!("  Tolerance: {:.1} ms", sync.tolerance * 1000.0);
    println!(
        "  Queue limits: {} frames / {} gaze samples",
        sync.frame_queue_limit, sync.gaze_queue_limit
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

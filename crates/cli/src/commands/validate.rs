//! `validate` subcommand: load a session file and report problems without streaming.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{GazeSourceKind, SessionBlueprint};

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationReport {
    config_path: String,
    #[serde(flatten)]
    verdict: Verdict,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Verdict {
    Valid {
        summary: SessionOverview,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Invalid {
        reason: String,
    },
}

#[derive(Serialize)]
struct SessionOverview {
    version: String,
    device: String,
    gaze_source: GazeSourceKind,
    tolerance_ms: f64,
    sinks: usize,
}

impl ValidationReport {
    fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Valid { .. })
    }
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Checking session file");

    let report = check_file(&args.config);
    if args.json {
        let out =
            serde_json::to_string_pretty(&report).context("Failed to encode validation report")?;
        println!("{out}");
    } else {
        render(&report);
    }

    anyhow::ensure!(
        report.is_valid(),
        "{} is not a usable session file",
        report.config_path
    );
    Ok(())
}

fn check_file(path: &Path) -> ValidationReport {
    let config_path = path.display().to_string();
    let verdict = if path.exists() {
        match ConfigLoader::load_from_path(path) {
            Ok(blueprint) => Verdict::Valid {
                warnings: lint(&blueprint),
                summary: overview(&blueprint),
            },
            Err(e) => Verdict::Invalid {
                reason: e.to_string(),
            },
        }
    } else {
        Verdict::Invalid {
            reason: format!("no such file: {config_path}"),
        }
    };
    ValidationReport {
        config_path,
        verdict,
    }
}

fn overview(blueprint: &SessionBlueprint) -> SessionOverview {
    let device = match (&blueprint.device.serial, blueprint.device.device_index) {
        (Some(serial), _) => serial.clone(),
        (None, Some(index)) => format!("index {index}"),
        (None, None) => "first online".to_string(),
    };
    SessionOverview {
        version: format!("{:?}", blueprint.version),
        device,
        gaze_source: blueprint.gaze.source,
        tolerance_ms: blueprint.sync.tolerance * 1000.0,
        sinks: blueprint.sinks.len(),
    }
}

/// Settings that load fine but will probably not do what the user wants
fn lint(blueprint: &SessionBlueprint) -> Vec<String> {
    let mut notes = Vec::new();

    if blueprint.sinks.is_empty() {
        notes.push("no sinks configured, pairs will be discarded".to_string());
    }

    let jar = &blueprint.device.server_jar;
    if !jar.exists() {
        notes.push(format!(
            "server jar {} not found, only --mock runs can stream",
            jar.display()
        ));
    }

    // mock samples spaced wider than the match window leave frames unpaired
    if blueprint.gaze.source == GazeSourceKind::Mock {
        let spacing_ms = 1000.0 / blueprint.gaze.rate_hz;
        let tolerance_ms = blueprint.sync.tolerance * 1000.0;
        if spacing_ms > 2.0 * tolerance_ms {
            notes.push(format!(
                "mock gaze spacing {spacing_ms:.1} ms is over twice the {tolerance_ms:.1} ms tolerance, many frames will go out alone"
            ));
        }
    }

    notes
}

fn render(report: &ValidationReport) {
    match &report.verdict {
        Verdict::Valid { summary, warnings } => {
            println!("✓ {} OK", report.config_path);
            println!();
            println!("  version      {}", summary.version);
            println!("  device       {}", summary.device);
            println!("  gaze source  {:?}", summary.gaze_source);
            println!("  tolerance    {:.1} ms", summary.tolerance_ms);
            println!("  sinks        {}", summary.sinks);
            if !warnings.is_empty() {
                println!();
                for note in warnings {
                    println!("  ⚠ {note}");
                }
            }
        }
        Verdict::Invalid { reason } => {
            println!("✗ {}", report.config_path);
            println!("  {reason}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{GazeConfig, SyncEngineConfig};

    #[test]
    fn test_sparse_mock_gaze_is_flagged() {
        let blueprint = SessionBlueprint {
            gaze: GazeConfig {
                rate_hz: 60.0,
                ..Default::default()
            },
            sync: SyncEngineConfig {
                tolerance: 0.005,
                ..Default::default()
            },
            ..Default::default()
        };
        let notes = lint(&blueprint);
        assert!(notes.iter().any(|n| n.contains("mock gaze spacing")));
        assert!(notes.iter().any(|n| n.contains("no sinks")));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let report = check_file(Path::new("/nonexistent/session.toml"));
        assert!(!report.is_valid());
        let Verdict::Invalid { reason } = report.verdict else {
            panic!("expected invalid");
        };
        assert!(reason.contains("no such file"));
    }

    #[test]
    fn test_valid_file_reports_overview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            "[device]\nserial = \"emulator-5554\"\n\n[[sinks]]\nname = \"log\"\nsink_type = \"log\"\n",
        )
        .unwrap();

        let report = check_file(&path);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "valid");
        assert_eq!(json["summary"]["device"], "emulator-5554");
        assert_eq!(json["summary"]["sinks"], 1);
    }
}

//! # Config Loader
//!
//! Loads and validates the session configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Check field ranges and cross-field rules
//! - Produce a `SessionBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("tolerance: {}", blueprint.sync.tolerance);
//! ```

mod parser;
mod validator;

pub use contracts::SessionBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, detecting the format from its extension
    ///
    /// # Errors
    /// - Unsupported or missing extension
    /// - File read failure
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SessionBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse then validate configuration text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SessionBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Validate a blueprint built in code (CLI overrides, tests)
    pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    pub fn to_toml(blueprint: &SessionBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &SessionBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    const SESSION_TOML: &str = r#"
[device]
adb_host = "127.0.0.1"
server_jar = "3rdparty/scrcpy/scrcpy-server.jar"

[video]
max_size = 1280
max_fps = 30
offset_samples = 50

[gaze]
source = "mock"
rate_hz = 120.0

[sync]
tolerance = 0.005
gaze_queue_limit = 100

[[sinks]]
name = "log_sink"
sink_type = "log"

[[sinks]]
name = "disk"
sink_type = "file"
queue_capacity = 500
params = { base_path = "./output", write_frames = "false" }
"#;

    #[test]
    fn test_load_from_str_toml() {
        let bp = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.video.max_size, 1280);
        assert_eq!(bp.video.offset_samples, 50);
        assert_eq!(bp.sync.gaze_queue_limit, 100);
        assert_eq!(bp.sinks[1].sink_type, SinkType::File);
        assert_eq!(bp.sinks[1].params["base_path"], "./output");
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.video.max_fps, bp2.video.max_fps);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
        assert_eq!(bp.sinks[0].name, bp2.sinks[0].name);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.gaze.rate_hz, bp2.gaze.rate_hz);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[sinks]]
name = "out"
sink_type = "log"

[[sinks]]
name = "out"
sink_type = "file"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"sync": {"tolerance": 0.01}}"#).unwrap();

        let bp = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.sync.tolerance, 0.01);

        let bad = dir.path().join("session.yaml");
        std::fs::write(&bad, "").unwrap();
        assert!(ConfigLoader::load_from_path(&bad).is_err());
    }
}

//! 配置校验模块
//!
//! 两步校验：
//! 1. `validator` derive 的字段范围检查 (嵌套结构体)
//! 2. 跨字段规则：
//!    - sink 名称非空且唯一
//!    - json_lines 注视源必须配置 address
//!    - poll_interval_ms > 0
//!    - connection_timeout_ms >= poll_interval_ms (0 除外)
//!    - crop 格式为 `W:H:X:Y`

use std::collections::HashSet;

use contracts::{ContractError, GazeSourceKind, SessionBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 SessionBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_video(blueprint)?;
    validate_gaze(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 字段范围校验 (validator derive)
fn validate_ranges(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| ("<root>".to_string(), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// 按字段名排序后取第一个违规项，路径形如 `sync.tolerance`
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("failed '{}' check", e.code));
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_violation(inner, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// 视频连接参数
fn validate_video(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let video = &blueprint.video;

    if video.poll_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "video.poll_interval_ms",
            "poll_interval_ms must be > 0",
        ));
    }

    if video.connection_timeout_ms != 0 && video.connection_timeout_ms < video.poll_interval_ms {
        return Err(ContractError::config_validation(
            "video.connection_timeout_ms",
            format!(
                "connection_timeout_ms ({}) must be >= poll_interval_ms ({})",
                video.connection_timeout_ms, video.poll_interval_ms
            ),
        ));
    }

    if let Some(crop) = &video.crop {
        if !is_valid_crop(crop) {
            return Err(ContractError::config_validation(
                "video.crop",
                format!("crop '{crop}' must be 'width:height:x:y'"),
            ));
        }
    }

    Ok(())
}

/// `W:H:X:Y`，宽高必须为正
fn is_valid_crop(crop: &str) -> bool {
    let parts: Vec<_> = crop.split(':').map(str::parse::<u32>).collect();
    match parts.as_slice() {
        [Ok(w), Ok(h), Ok(_), Ok(_)] => *w > 0 && *h > 0,
        _ => false,
    }
}

/// 注视源配置
fn validate_gaze(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let gaze = &blueprint.gaze;
    if gaze.source == GazeSourceKind::JsonLines
        && gaze.address.as_deref().is_none_or(|a| a.trim().is_empty())
    {
        return Err(ContractError::config_validation(
            "gaze.address",
            "json_lines gaze source requires an address",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SinkConfig, SinkType};
    use std::collections::HashMap;

    fn sink(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 10,
            params: HashMap::new(),
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_blueprint_is_valid() {
        assert!(validate(&SessionBlueprint::default()).is_ok());
    }

    #[test]
    fn test_range_violation_reports_nested_path() {
        let mut bp = SessionBlueprint::default();
        bp.sync.tolerance = 2.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sync.tolerance");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = SessionBlueprint::default();
        bp.sinks = vec![sink("out"), sink("out")];
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate sink name"));
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = SessionBlueprint::default();
        bp.sinks = vec![sink("")];
        assert_eq!(field_of(validate(&bp).unwrap_err()), "sinks[0].name");
    }

    #[test]
    fn test_json_lines_requires_address() {
        let mut bp = SessionBlueprint::default();
        bp.gaze.source = GazeSourceKind::JsonLines;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "gaze.address");

        bp.gaze.address = Some("127.0.0.1:9100".into());
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_timeout_shorter_than_poll() {
        let mut bp = SessionBlueprint::default();
        bp.video.poll_interval_ms = 500;
        bp.video.connection_timeout_ms = 100;
        assert_eq!(
            field_of(validate(&bp).unwrap_err()),
            "video.connection_timeout_ms"
        );

        bp.video.connection_timeout_ms = 0;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_crop_format() {
        assert!(is_valid_crop("1224:1440:0:0"));
        assert!(!is_valid_crop("1224:1440:0"));
        assert!(!is_valid_crop("0:1440:0:0"));
        assert!(!is_valid_crop("a:b:c:d"));

        let mut bp = SessionBlueprint::default();
        bp.video.crop = Some("100x100".into());
        assert_eq!(field_of(validate(&bp).unwrap_err()), "video.crop");
    }
}

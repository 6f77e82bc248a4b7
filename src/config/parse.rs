use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read properties file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid properties:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("invalid properties: {0}")]
    Validation(String),
}

/// Load a flat properties file.
///
/// The file is a YAML mapping of parameter names to scalar values. Values of
/// any scalar type are kept as strings so numbers and booleans may be written
/// unquoted.
pub fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open properties file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read properties file '{}': {}", path.display(), e),
        ))
    })?;

    parse_properties(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse properties from a YAML string, expanding `$env{VAR}` references in values.
/// Comments are never inspected.
pub fn parse_properties(yaml: &str) -> Result<Properties, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Ok(Properties::new()),
        _ => {
            return Err(ConfigError::Validation(
                "properties file must be a mapping of name: value pairs".to_string(),
            ))
        }
    };

    let mut properties = Properties::new();
    let mut errors = Vec::new();

    for (key, value) in mapping {
        let Some(key) = scalar_to_string(&key) else {
            errors.push(format!("property names must be scalars, got {:?}", key));
            continue;
        };
        match value {
            // A key with no value is treated as absent
            serde_yaml::Value::Null => {}
            other => match scalar_to_string(&other) {
                Some(value) => {
                    properties.insert(key, expand_env_vars(&value));
                }
                None => errors.push(format!("property '{}' must have a scalar value", key)),
            },
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::ValidationList(errors));
    }

    check_unexpanded_vars(&properties)?;
    Ok(properties)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reports every `$env{VAR}` reference left in a value after expansion
fn check_unexpanded_vars(properties: &Properties) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = properties
        .values()
        .flat_map(|value| re.captures_iter(value))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

/// Apply `key=value` overrides on top of loaded properties
pub fn apply_overrides(properties: &mut Properties, overrides: &[String]) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    for entry in overrides {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                properties.insert(key.trim().to_string(), value.to_string());
            }
            _ => errors.push(format!(
                "property override '{}' must have the form key=value",
                entry
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

/// Parse a strictly positive integer
pub fn parse_positive_integer(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

/// Parse the initial read timestamp: RFC 3339 or (fractional) epoch seconds
pub fn parse_initial_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    let seconds: f64 = value.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
}

/// `debug_mode` is enabled only by a case-insensitive `true`
pub fn parse_debug_mode(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

impl RuntimeProperties {
    /// Build typed settings from flat properties, collecting every problem
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let get = |key: &str| properties.get(key).map(String::as_str);

        let mut required = |key: &str| -> String {
            match get(key).map(str::trim) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => {
                    errors.push(format!("'{}' is required", key));
                    String::new()
                }
            }
        };
        let region = required(REGION);
        let stream_name = required(INPUT_STREAM_NAME);
        let output_path = required(S3_OUTPUT_PATH);

        let position = match get(STREAM_INIT_POSITION) {
            Some(v) => v.parse::<StreamPosition>().unwrap_or_else(|e| {
                errors.push(format!("'{}': {}", STREAM_INIT_POSITION, e));
                StreamPosition::Latest
            }),
            None => {
                errors.push(format!("'{}' is required", STREAM_INIT_POSITION));
                StreamPosition::Latest
            }
        };

        let initial_timestamp = if position == StreamPosition::AtTimestamp {
            match get(STREAM_INITIAL_TIMESTAMP).map(|v| (v, parse_initial_timestamp(v))) {
                Some((_, Some(at))) => Some(at),
                Some((raw, None)) => {
                    errors.push(format!(
                        "'{}' is not a valid date/time: {}",
                        STREAM_INITIAL_TIMESTAMP, raw
                    ));
                    None
                }
                None => {
                    errors.push(format!(
                        "'{}' is required when '{}' is AT_TIMESTAMP",
                        STREAM_INITIAL_TIMESTAMP, STREAM_INIT_POSITION
                    ));
                    None
                }
            }
        } else {
            None
        };

        let mut seconds = |key: &str| -> StdDuration {
            match parse_positive_integer(get(key)) {
                Some(secs) => StdDuration::from_secs(secs),
                None => {
                    errors.push(format!(
                        "'{}' must be a positive integer, got {:?}",
                        key,
                        get(key)
                    ));
                    StdDuration::from_secs(1)
                }
            }
        };
        let bucket_check_interval = seconds(BUCKET_CHECK_INTERVAL_IN_SECONDS);
        let rolling_interval = seconds(ROLLING_INTERVAL_IN_SECONDS);
        let inactivity_interval = seconds(INACTIVITY_INTERVAL_IN_SECONDS);

        let session_gap = match parse_positive_integer(get(SESSION_TIME_OUT_IN_MINUTES))
            .and_then(|m| i64::try_from(m).ok())
            .and_then(Duration::try_minutes)
        {
            Some(gap) => gap,
            None => {
                errors.push(format!(
                    "'{}' must be a positive integer, got {:?}",
                    SESSION_TIME_OUT_IN_MINUTES,
                    get(SESSION_TIME_OUT_IN_MINUTES)
                ));
                Duration::zero()
            }
        };

        let countable_type_threshold = match get(COUNTABLE_TYPE_THRESHOLD) {
            Some(v) => v.trim().parse::<i32>().unwrap_or_else(|_| {
                errors.push(format!(
                    "'{}' must be an integer, got '{}'",
                    COUNTABLE_TYPE_THRESHOLD, v
                ));
                DEFAULT_COUNTABLE_TYPE_THRESHOLD
            }),
            None => DEFAULT_COUNTABLE_TYPE_THRESHOLD,
        };

        let mut optional_count = |key: &str, default: usize| -> usize {
            match get(key) {
                Some(v) => match parse_positive_integer(Some(v)).and_then(|n| usize::try_from(n).ok()) {
                    Some(n) => n,
                    None => {
                        errors.push(format!("'{}' must be a positive integer, got '{}'", key, v));
                        default
                    }
                },
                None => default,
            }
        };
        let parallelism = optional_count(PARALLELISM, DEFAULT_PARALLELISM);
        let channel_buffer_size = optional_count(CHANNEL_BUFFER_SIZE, DEFAULT_CHANNEL_BUFFER_SIZE);

        if !errors.is_empty() {
            return Err(ConfigError::ValidationList(errors));
        }

        Ok(Self {
            debug_mode: parse_debug_mode(get(DEBUG_MODE)),
            source: SourceSettings {
                stream_name,
                region,
                position,
                initial_timestamp,
            },
            session_gap,
            sink: SinkSettings {
                output_path: expand_tilde(&PathBuf::from(output_path)),
                bucket_check_interval,
                rolling_interval,
                inactivity_interval,
            },
            countable_type_threshold,
            parallelism,
            channel_buffer_size,
        })
    }
}

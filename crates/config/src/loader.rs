use std::{path::Path, str::FromStr, time::Duration};

use anyhow::bail;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::Config;

const MIN_IDENTITY_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_IDENTITY_TIMEOUT: Duration = Duration::from_secs(30);
const RECOMMENDED_IDENTITY_TIMEOUT: (Duration, Duration) = (Duration::from_secs(3), Duration::from_secs(10));

/// Check if a configuration path represents an optional environment variable field
fn is_optional_env_field(path: &str) -> bool {
    // A missing value here falls back to the default instead of failing the load
    const OPTIONAL_FIELDS: &[&str] = &["server.service_name", "telemetry.url"];

    OPTIONAL_FIELDS.iter().any(|&field| path.ends_with(field))
}

/// Check if the error is specifically about a missing environment variable
fn is_missing_env_var_error<E: std::fmt::Display>(err: &E) -> bool {
    let err_str = err.to_string().to_lowercase();

    err_str.contains("environment variable not found")
        || err_str.contains("env var")
        || (err_str.contains("variable") && err_str.contains("not found"))
}

/// Extract the path from an error message like "Failed to expand dynamic string at path 'path': error"
fn extract_path_from_error(error_message: &str) -> Option<String> {
    let start = error_message.find("path '")? + 6;
    let end = error_message[start..].find("':")?;

    Some(error_message[start..start + end].to_string())
}

/// Remove a field from the TOML configuration by path. Returns whether anything was removed.
fn remove_field_from_config(config: &mut Value, path: &str) -> bool {
    let parts: Vec<&str> = path.split('.').collect();

    let Some((final_key, parents)) = parts.split_last() else {
        return false;
    };

    let mut current = config;

    for &part in parents {
        match current.as_table_mut().and_then(|table| table.get_mut(part)) {
            Some(value) => current = value,
            None => return false,
        }
    }

    let removed = current
        .as_table_mut()
        .and_then(|table| table.remove(*final_key))
        .is_some();

    if removed {
        log::debug!("Removed optional field '{path}' due to missing environment variable");
    }

    removed
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let raw_config: Value = toml::from_str(&content)?;

    let config = from_value(raw_config)?;

    for warning in validate(&config)? {
        log::warn!("{warning}");
    }

    Ok(config)
}

/// Expands `{{ env.VAR }}` strings and deserializes the result.
pub(crate) fn from_value(mut raw_config: Value) -> anyhow::Result<Config> {
    loop {
        let Err(err) = expand_dynamic_strings(&mut Vec::new(), &mut raw_config) else {
            break;
        };

        let optional_path = extract_path_from_error(&err.to_string())
            .filter(|path| is_optional_env_field(path) && is_missing_env_var_error(&err));

        let Some(path) = optional_path else {
            return Err(err);
        };

        if !remove_field_from_config(&mut raw_config, &path) {
            return Err(err);
        }
    }

    Ok(Config::deserialize(raw_config)?)
}

/// Validates timeouts and dispatch limits. Fatal problems are errors, the rest are returned as warnings.
pub(crate) fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();

    let identity_timeout = config.identity.timeout;

    if !(MIN_IDENTITY_TIMEOUT..=MAX_IDENTITY_TIMEOUT).contains(&identity_timeout) {
        bail!(
            "identity.timeout must be between {MIN_IDENTITY_TIMEOUT:?} and {MAX_IDENTITY_TIMEOUT:?}, got {identity_timeout:?}"
        );
    }

    let (low, high) = RECOMMENDED_IDENTITY_TIMEOUT;

    if !(low..=high).contains(&identity_timeout) {
        warnings.push(format!(
            "identity.timeout of {identity_timeout:?} is outside the recommended range of {low:?} to {high:?}"
        ));
    }

    if config.identity.verify_url().is_err() {
        bail!("identity.verify_path '{}' is not a valid path", config.identity.verify_path);
    }

    if config.metrics.enabled && config.metrics.otlp.interval.is_zero() {
        bail!("metrics.otlp.interval must be greater than zero");
    }

    if !config.telemetry.enabled {
        return Ok(warnings);
    }

    if config.telemetry.timeout.is_zero() {
        bail!("telemetry.timeout must be greater than zero");
    }

    if config.telemetry.max_in_flight == 0 {
        bail!("telemetry.max_in_flight must be at least 1");
    }

    if config.telemetry.ingest_url().is_err() {
        bail!("telemetry.path '{}' is not a valid path", config.telemetry.path);
    }

    if config.telemetry.timeout > identity_timeout {
        warnings.push(format!(
            "telemetry.timeout of {:?} is longer than identity.timeout of {identity_timeout:?}",
            config.telemetry.timeout
        ));
    }

    Ok(warnings)
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();
                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }
                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

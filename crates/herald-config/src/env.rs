//! `HERALD_*` environment variable mappings.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// How a variable's string value becomes a TOML value.
#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Integer,
    Boolean,
    String,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    section: &'static str,
    field: &'static str,
    kind: EnvKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "HERALD_MAX_LISTENERS",
        section: "events",
        field: "max_listeners",
        kind: EnvKind::Integer,
    },
    EnvMapping {
        var_name: "HERALD_CAPTURE_REJECTIONS",
        section: "events",
        field: "capture_rejections",
        kind: EnvKind::Boolean,
    },
    EnvMapping {
        var_name: "HERALD_LOG_LEVEL",
        section: "logging",
        field: "level",
        kind: EnvKind::String,
    },
    EnvMapping {
        var_name: "HERALD_LOG_FORMAT",
        section: "logging",
        field: "format",
        kind: EnvKind::String,
    },
];

/// Build a TOML overlay from the `HERALD_*` variables present in `env_vars`.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric or boolean variable does
/// not parse.
pub fn env_overlay<S: std::hash::BuildHasher>(
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<toml::Value> {
    let mut root = toml::map::Map::new();

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let value = coerce(mapping, raw)?;
        debug!(
            var = mapping.var_name,
            section = mapping.section,
            field = mapping.field,
            "applying environment variable"
        );

        let section = root
            .entry(mapping.section.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        if let toml::Value::Table(table) = section {
            table.insert(mapping.field.to_owned(), value);
        }
    }

    Ok(toml::Value::Table(root))
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    let trimmed = raw.trim();
    match mapping.kind {
        EnvKind::Integer => trimmed
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected an integer, got '{trimmed}': {e}"),
            }),
        EnvKind::Boolean => parse_bool(trimmed)
            .map(toml::Value::Boolean)
            .ok_or_else(|| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected a boolean, got '{trimmed}'"),
            }),
        EnvKind::String => Ok(toml::Value::String(trimmed.to_owned())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

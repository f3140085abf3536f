//! Profile loading for the bidstream CLI
//!
//! A profile is a TOML file with the `[traffic]`, `[events]`, `[scheduler]`
//! and `[output]` sections of [`GeneratorConfig`]; every section and field
//! is optional. The final configuration is built in three layers: profile,
//! then `--set` overrides, then the dedicated flags and positionals.

use crate::args::Cli;
use anyhow::{bail, Context, Result};
use bidstream_core::GeneratorConfig;
use std::path::Path;

/// Load a profile from a TOML file
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<GeneratorConfig> {
    from_file_with_overrides(path, &[])
}

/// Load a profile from a TOML file, applying `--set` style overrides
pub fn from_file_with_overrides<P: AsRef<Path>>(
    path: P,
    overrides: &[String],
) -> Result<GeneratorConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: toml::Value = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    with_overrides(value, overrides)
}

/// Apply overrides to a parsed profile and deserialize it
fn with_overrides(mut value: toml::Value, overrides: &[String]) -> Result<GeneratorConfig> {
    for override_str in overrides {
        let (key, val) = parse_key_value(override_str)
            .with_context(|| format!("Invalid override format: {}", override_str))?;

        set_toml_path(&mut value, &key, &val)
            .with_context(|| format!("Failed to apply override: {}", override_str))?;
    }

    value.try_into().context("Failed to deserialize configuration")
}

/// Build the run configuration from the command line
///
/// The result is validated; a zero rate, for example, is rejected here
/// before any worker starts.
pub fn resolve(cli: &Cli) -> Result<GeneratorConfig> {
    let mut config = match &cli.profile {
        Some(path) => from_file_with_overrides(path, &cli.set)?,
        None => with_overrides(toml::Value::Table(Default::default()), &cli.set)?,
    };

    apply_cli(&mut config, cli)?;
    config.validate()?;
    Ok(config)
}

/// Apply the dedicated flags and positionals on top of `config`
pub fn apply_cli(config: &mut GeneratorConfig, cli: &Cli) -> Result<()> {
    if let Some(rate) = cli.rate {
        config.traffic.rate = rate as f64;
    }
    if let Some(workers) = cli.workers {
        config.traffic.workers = usize::try_from(workers)
            .with_context(|| format!("Worker count {} is too large", workers))?;
    }
    if let Some(seed) = cli.seed {
        config.traffic.seed = Some(seed);
    }
    if let Some(duration) = cli.duration {
        config.traffic.duration = Some(duration);
    }
    if let Some(win_rate) = cli.win_rate {
        config.events.win_rate = win_rate;
    }
    if let Some(click_rate) = cli.click_rate {
        config.events.click_rate = click_rate;
    }
    Ok(())
}

fn parse_key_value(override_str: &str) -> Result<(String, String)> {
    match override_str.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("Invalid override format '{}'. Expected 'key=value'", override_str),
    }
}

/// Set a dotted `section.key` path, creating intermediate tables
fn set_toml_path(root: &mut toml::Value, path: &str, value_str: &str) -> Result<()> {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some((last, parents)) = parts.split_last() else {
        bail!("Empty path");
    };

    let mut current = root;
    for key in parents {
        let toml::Value::Table(table) = current else {
            bail!("Cannot navigate through non-table value at key '{}'", key);
        };
        current = table
            .entry(key.to_string())
            .or_insert(toml::Value::Table(Default::default()));
    }

    let toml::Value::Table(table) = current else {
        bail!("Cannot set key '{}' on non-table value", last);
    };
    table.insert(last.to_string(), parse_value(value_str)?);
    Ok(())
}

fn parse_value(value_str: &str) -> Result<toml::Value> {
    let trimmed = value_str.trim();

    if trimmed == "true" {
        return Ok(toml::Value::Boolean(true));
    }
    if trimmed == "false" {
        return Ok(toml::Value::Boolean(false));
    }
    if let Ok(int_val) = trimmed.parse::<i64>() {
        return Ok(toml::Value::Integer(int_val));
    }
    if let Ok(float_val) = trimmed.parse::<f64>() {
        return Ok(toml::Value::Float(float_val));
    }

    // Inline tables, e.g. dispatch={ mode = "poll", interval = "5ms" }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let table_toml = format!("value = {}", trimmed);
        if let Ok(toml::Value::Table(mut table)) = toml::from_str::<toml::Value>(&table_toml) {
            if let Some(value) = table.remove("value") {
                return Ok(value);
            }
        }
        bail!("Failed to parse inline table: {}", trimmed);
    }

    let string_val = if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    Ok(toml::Value::String(string_val.to_string()))
}

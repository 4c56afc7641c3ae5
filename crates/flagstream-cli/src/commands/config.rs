//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use flagstream_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "sdk_key": config.sdk_key.as_deref().map(mask),
                    "stream_uri": config.stream_uri,
                    "base_uri": config.base_uri,
                    "verify_ssl": config.verify_ssl,
                    "reconnect_delay_ms": config.reconnect_delay_ms,
                    "read_timeout_secs": config.read_timeout_secs,
                    "connect_timeout_secs": config.connect_timeout_secs,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_level": config.log_level,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.stream_uri);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!(
                "  sdk_key:              {}",
                config
                    .sdk_key
                    .as_deref()
                    .map(mask)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  stream_uri:           {}", config.stream_uri);
            println!("  base_uri:             {}", config.base_uri);
            println!("  verify_ssl:           {}", config.verify_ssl);
            println!("  reconnect_delay_ms:   {}", config.reconnect_delay_ms);
            println!("  read_timeout_secs:    {}", config.read_timeout_secs);
            println!("  connect_timeout_secs: {}", config.connect_timeout_secs);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!("  log_level:            {}", config.log_level);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config.save_to(&path)?;

    output.success(&format!("Set {}", key));
    Ok(())
}

/// Apply a single `key = value` update
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "sdk_key" => {
            config.sdk_key = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }
        "stream_uri" => config.stream_uri = value.to_string(),
        "base_uri" => config.base_uri = value.to_string(),
        "verify_ssl" => config.verify_ssl = parse_bool(value)?,
        "reconnect_delay_ms" => config.reconnect_delay_ms = parse_nonzero(key, value)?,
        "read_timeout_secs" => config.read_timeout_secs = parse_nonzero(key, value)?,
        "connect_timeout_secs" => {
            config.connect_timeout_secs = value.parse().context("Expected seconds")?
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value.parse().context("Expected seconds")?
        }
        "log_level" => config.log_level = value.to_string(),
        _ => bail!(
            "Unknown config key: {}. Valid keys: sdk_key, stream_uri, base_uri, verify_ssl, \
             reconnect_delay_ms, read_timeout_secs, connect_timeout_secs, \
             request_timeout_secs, log_level",
            key
        ),
    }
    Ok(())
}

fn parse_nonzero(key: &str, value: &str) -> Result<u64> {
    let parsed: u64 = value
        .parse()
        .with_context(|| format!("Expected a positive integer for {}", key))?;
    if parsed == 0 {
        bail!("{} must be greater than 0", key);
    }
    Ok(parsed)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("Invalid boolean value: {}. Use true/false", value),
    }
}

/// Show only the tail of a secret
fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

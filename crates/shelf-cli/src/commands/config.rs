//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use shelf_core::Config;

use crate::output::{Output, OutputFormat};

const NOT_SET: &str = "(not set)";

/// Show current configuration
///
/// The REST API key is never printed, only whether it is set.
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let key_state = if config.remote.rest_api_key.is_some() {
        "(set)"
    } else {
        NOT_SET
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "remote": {
                        "base_url": config.remote.base_url,
                        "application_id": config.remote.application_id,
                        "rest_api_key_set": config.remote.rest_api_key.is_some(),
                        "timeout_secs": config.remote.timeout_secs
                    },
                    "reader": config.reader,
                    "cache_limit_mb": config.cache_limit_mb,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:               {}", config.data_dir.display());
            println!("  remote.base_url:        {}", config.remote.base_url);
            println!(
                "  remote.application_id:  {}",
                config.remote.application_id.as_deref().unwrap_or(NOT_SET)
            );
            println!("  remote.rest_api_key:    {}", key_state);
            println!("  remote.timeout_secs:    {}", config.remote.timeout_secs);
            println!("  reader.page_size:       {}", config.reader.page_size);
            println!("  reader.preamble_title:  {}", config.reader.preamble_title);
            println!("  reader.page_title:      {}", config.reader.page_title);
            println!("  reader.legacy_encoding: {}", config.reader.legacy_encoding);
            println!(
                "  cache_limit_mb:         {}",
                config
                    .cache_limit_mb
                    .map(|mb| mb.to_string())
                    .unwrap_or_else(|| NOT_SET.to_string())
            );
            println!(
                "  log_file:               {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| NOT_SET.to_string())
            );
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

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "remote.rest_api_key" {
        "********"
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

/// `None` for an empty value or the literal "none"
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "remote.base_url" => config.remote.base_url = value.to_string(),
        "remote.application_id" => config.remote.application_id = optional(value),
        "remote.rest_api_key" => config.remote.rest_api_key = optional(value),
        "remote.timeout_secs" => {
            config.remote.timeout_secs = value
                .parse()
                .context("Invalid value for remote.timeout_secs. Use a number of seconds.")?;
        }
        "reader.page_size" => {
            let page_size: usize = value
                .parse()
                .context("Invalid value for reader.page_size. Use a positive number.")?;
            if page_size == 0 {
                bail!("reader.page_size must be greater than zero");
            }
            config.reader.page_size = page_size;
        }
        "reader.preamble_title" => config.reader.preamble_title = value.to_string(),
        "reader.page_title" => config.reader.page_title = value.to_string(),
        "reader.legacy_encoding" => {
            if shelf_core::TextDecoder::new(value).is_err() {
                bail!("Unknown encoding: '{}'", value);
            }
            config.reader.legacy_encoding = value.to_string();
        }
        "cache_limit_mb" => {
            config.cache_limit_mb = match optional(value) {
                Some(v) => Some(
                    v.parse()
                        .context("Invalid value for cache_limit_mb. Use a number or 'none'.")?,
                ),
                None => None,
            };
        }
        "log_file" => config.log_file = optional(value).map(Into::into),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, remote.base_url, remote.application_id, \
                 remote.rest_api_key, remote.timeout_secs, reader.page_size, \
                 reader.preamble_title, reader.page_title, reader.legacy_encoding, \
                 cache_limit_mb, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_values() {
        let mut config = Config::default();

        apply(&mut config, "remote.application_id", "app").unwrap();
        apply(&mut config, "cache_limit_mb", "256").unwrap();
        apply(&mut config, "reader.page_title", "第 {n} 页").unwrap();
        assert_eq!(config.remote.application_id.as_deref(), Some("app"));
        assert_eq!(config.cache_limit_mb, Some(256));
        assert_eq!(config.reader.page_title, "第 {n} 页");

        apply(&mut config, "cache_limit_mb", "none").unwrap();
        apply(&mut config, "remote.application_id", "").unwrap();
        assert!(config.cache_limit_mb.is_none());
        assert!(config.remote.application_id.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "reader.page_size", "0").is_err());
        assert!(apply(&mut config, "reader.page_size", "abc").is_err());
        assert!(apply(&mut config, "reader.legacy_encoding", "nope").is_err());
        assert!(apply(&mut config, "sync_url", "x").is_err());
    }

    #[test]
    fn test_set_writes_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "data_dir".to_string(),
            dir.path().join("data").display().to_string(),
            Some(&path),
            &output,
        )
        .unwrap();
        set("cache_limit_mb".to_string(), "64".to_string(), Some(&path), &output).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("cache_limit_mb = 64"));
    }
}

//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use treino_core::Config;

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
                    "data_dir": config.data_dir,
                    "mirror_dir": config.mirror_dir,
                    "link_dir": config.link_dir,
                    "asset_cache_capacity": config.asset_cache_capacity,
                    "mirror_cache_capacity": config.mirror_cache_capacity,
                    "sync_enabled": config.sync_enabled,
                    "log_level": config.log_level,
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
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  mirror_dir:            {}", config.mirror_dir.display());
            println!("  link_dir:              {}", config.link_dir.display());
            println!("  asset_cache_capacity:  {}", config.asset_cache_capacity);
            println!("  mirror_cache_capacity: {}", config.mirror_cache_capacity);
            println!("  sync_enabled:          {}", config.sync_enabled);
            println!("  log_level:             {}", config.log_level);
            println!(
                "  log_file:              {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
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

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "mirror_dir" => config.mirror_dir = value.into(),
        "link_dir" => config.link_dir = value.into(),
        "asset_cache_capacity" => {
            config.asset_cache_capacity = parse_capacity(key, value)?;
        }
        "mirror_cache_capacity" => {
            config.mirror_cache_capacity = parse_capacity(key, value)?;
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "log_level" => {
            const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
            if !LEVELS.contains(&value) {
                bail!("Invalid log level '{}'. Use one of: {}", value, LEVELS.join(", "));
            }
            config.log_level = value.to_string();
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, mirror_dir, link_dir, asset_cache_capacity, \
                 mirror_cache_capacity, sync_enabled, log_level, log_file",
                key
            );
        }
    }
    Ok(())
}

fn parse_capacity(key: &str, value: &str) -> Result<usize> {
    let capacity: usize = value
        .parse()
        .with_context(|| format!("Invalid value for {}. Use a whole number.", key))?;
    if capacity == 0 {
        bail!("{} must be at least 1", key);
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "mirror_cache_capacity", "25").unwrap();
        apply(&mut config, "sync_enabled", "false").unwrap();
        apply(&mut config, "log_file", "/tmp/treino.log").unwrap();

        assert_eq!(config.mirror_cache_capacity, 25);
        assert!(!config.sync_enabled);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/treino.log")));

        apply(&mut config, "log_file", "none").unwrap();
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "asset_cache_capacity", "0").is_err());
        assert!(apply(&mut config, "asset_cache_capacity", "lots").is_err());
        assert!(apply(&mut config, "log_level", "loud").is_err());
        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let toml: String = ["data_dir", "mirror_dir", "link_dir"]
            .iter()
            .map(|key| format!("{} = {:?}\n", key, temp.path().join(key)))
            .collect();
        std::fs::write(&path, toml).unwrap();

        set(
            "log_level".into(),
            "debug".into(),
            Some(&path),
            &Output::new(OutputFormat::Quiet),
        )
        .unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("log_level = \"debug\""));
    }
}

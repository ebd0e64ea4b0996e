mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./trackwave.toml",
        "~/.config/trackwave/config.toml",
        "/etc/trackwave/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if let Some(ref url) = config.server.public_base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("public_base_url must be an http(s) URL, got {:?}", url);
        }
    }

    if config.ingest.target_bitrate_kbps == 0 {
        anyhow::bail!("ingest.target_bitrate_kbps cannot be 0");
    }
    if config.ingest.segment_seconds == 0 {
        anyhow::bail!("ingest.segment_seconds cannot be 0");
    }
    if config.ingest.max_concurrent_jobs == 0 {
        anyhow::bail!("ingest.max_concurrent_jobs cannot be 0");
    }

    if config.stream.assumed_bitrate_kbps == 0 {
        anyhow::bail!("stream.assumed_bitrate_kbps cannot be 0");
    }
    if config.stream.batch_frames == 0 {
        anyhow::bail!("stream.batch_frames cannot be 0");
    }
    if !(config.stream.cbr_tolerance.is_finite() && config.stream.cbr_tolerance > 0.0) {
        anyhow::bail!("stream.cbr_tolerance must be a positive number");
    }
    if config.stream.assumed_bitrate_kbps != config.ingest.target_bitrate_kbps {
        tracing::warn!(
            assumed = config.stream.assumed_bitrate_kbps,
            target = config.ingest.target_bitrate_kbps,
            "Stream bitrate differs from ingest bitrate; seeks will land off target"
        );
    }

    if config.plays.capacity == 0 {
        anyhow::bail!("plays.capacity cannot be 0");
    }
    if config.plays.sweep_interval_secs == 0 {
        anyhow::bail!("plays.sweep_interval_secs cannot be 0");
    }

    Ok(())
}

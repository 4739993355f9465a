mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    expand_paths(&mut config);

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;

    validate_config(&mut config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./vidforge.toml",
        "~/.config/vidforge/config.toml",
        "/etc/vidforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand_paths(config: &mut Config) {
    for path in [&mut config.server.data_dir, &mut config.client.cache_dir] {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        *path = expanded.into();
    }
}

/// Validate configuration, clamping values that have a sensible nearest
/// setting and rejecting the rest.
pub fn validate_config(config: &mut Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.io_timeout_secs == 0 {
        anyhow::bail!("server.io_timeout_secs must be at least 1");
    }

    if config.server.max_frame_bytes < 1024 {
        anyhow::bail!("server.max_frame_bytes must be at least 1024");
    }

    if config.auth.bcrypt_cost < 4 || config.auth.bcrypt_cost > 31 {
        anyhow::bail!("auth.bcrypt_cost must be between 4 and 31");
    }

    if config.catalog.page_size == 0 {
        anyhow::bail!("catalog.page_size must be at least 1");
    }

    if config.pipeline.workers == 0 {
        anyhow::bail!("pipeline.workers must be at least 1");
    }

    let segment = config.pipeline.segment_duration_secs;
    if !segment.is_finite() || segment <= 0.0 {
        anyhow::bail!("pipeline.segment_duration_secs must be positive");
    }

    let position = config.pipeline.thumbnail_position;
    if !position.is_finite() || !(0.0..=1.0).contains(&position) {
        let clamped = if position.is_finite() {
            position.clamp(0.0, 1.0)
        } else {
            0.3
        };
        tracing::warn!(
            "pipeline.thumbnail_position {} out of range, using {}",
            position,
            clamped
        );
        config.pipeline.thumbnail_position = clamped;
    }

    if config.client.io_timeout_secs == 0 {
        anyhow::bail!("client.io_timeout_secs must be at least 1");
    }

    Ok(())
}

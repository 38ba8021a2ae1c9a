use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix of environment variables overriding file values, e.g.
/// `SWITCHYARD_LISTEN_ADDR` or `SWITCHYARD_SETTINGS__DISPLAY_ERROR_DETAILS`.
pub const ENV_PREFIX: &str = "SWITCHYARD";

/// Load configuration from a file plus environment overrides.
/// Supports YAML, JSON, TOML and INI, chosen by extension.
pub fn load_config(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}

/// Load configuration when a path is given, defaults otherwise.
pub fn load_or_default(config_path: Option<&str>) -> Result<ServerConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => Ok(ServerConfig::default()),
    }
}

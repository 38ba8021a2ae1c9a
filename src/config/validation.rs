use std::{fs, net::SocketAddr, path::Path};

use crate::config::models::{ServerConfig, Settings};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Validates application settings and the server configuration around
/// them, reporting every problem at once.
pub struct SettingsValidator;

impl SettingsValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Self::settings_errors(&config.settings);

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }
        if config.logging.level.trim().is_empty() {
            errors.push(ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: "Log level must not be empty".to_string(),
            });
        }

        Self::finish(errors)
    }

    /// Validate application settings alone.
    pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
        Self::finish(Self::settings_errors(settings))
    }

    fn settings_errors(settings: &Settings) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if settings.response_chunk_size == 0 {
            errors.push(ValidationError::InvalidField {
                field: "response_chunk_size".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if !matches!(settings.http_version.as_str(), "1.0" | "1.1" | "2" | "2.0" | "3") {
            errors.push(ValidationError::InvalidField {
                field: "http_version".to_string(),
                message: format!("Unsupported HTTP version '{}'", settings.http_version),
            });
        }

        if let Some(cache_file) = &settings.router_cache_file {
            if let Err(e) = Self::validate_cache_file(cache_file) {
                errors.push(e);
            }
        }

        errors
    }

    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_cache_file(path: &Path) -> ValidationResult<()> {
        if path.exists() {
            if path.is_dir() {
                return Err(ValidationError::InvalidField {
                    field: "router_cache_file".to_string(),
                    message: format!("{} is a directory", path.display()),
                });
            }
            return Ok(());
        }

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let writable = fs::metadata(dir).is_ok_and(|meta| meta.is_dir() && !meta.permissions().readonly());
        if !writable {
            return Err(ValidationError::InvalidField {
                field: "router_cache_file".to_string(),
                message: format!("Directory {} must be writable", dir.display()),
            });
        }
        Ok(())
    }

    fn finish(errors: Vec<ValidationError>) -> ValidationResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }
        let mut message = format!("{} validation errors:", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SettingsValidator::validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_chunk_size() {
        let settings = Settings {
            response_chunk_size: 0,
            ..Settings::default()
        };
        let err = SettingsValidator::validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("response_chunk_size"));
    }

    #[test]
    fn test_collects_every_error() {
        let config = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            settings: Settings {
                response_chunk_size: 0,
                http_version: "0.9".to_string(),
                ..Settings::default()
            },
            ..ServerConfig::default()
        };
        let err = SettingsValidator::validate(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("3 validation errors"), "{message}");
        assert!(message.contains("not-an-address"));
        assert!(message.contains("0.9"));
    }

    #[test]
    fn test_cache_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            router_cache_file: Some(dir.path().join("routes.cache")),
            ..Settings::default()
        };
        assert!(SettingsValidator::validate_settings(&settings).is_ok());

        let settings = Settings {
            router_cache_file: Some(dir.path().join("missing").join("routes.cache")),
            ..Settings::default()
        };
        assert!(SettingsValidator::validate_settings(&settings).is_err());
    }
}

//! Configuration data structures.
//!
//! [`Settings`] is what the [`App`](crate::App) consumes. [`ServerConfig`]
//! wraps it with the options only the bundled server binary needs. Every
//! field has a default, so an empty file is a valid configuration; settings
//! keys are also accepted in camelCase.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::OutputBuffering;

/// Application settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Protocol version stamped on the response template.
    #[serde(alias = "httpVersion")]
    pub http_version: String,
    /// Bytes written per chunk when emitting a body.
    #[serde(alias = "responseChunkSize")]
    pub response_chunk_size: usize,
    /// Default output buffering mode of new routes.
    #[serde(alias = "outputBuffering")]
    pub output_buffering: OutputBuffering,
    /// Dispatch before the App middleware runs, so middleware can see the
    /// matched route.
    #[serde(alias = "determineRouteBeforeAppMiddleware")]
    pub determine_route_before_app_middleware: bool,
    /// Include error messages in 500 responses.
    #[serde(alias = "displayErrorDetails")]
    pub display_error_details: bool,
    #[serde(alias = "addContentLengthHeader")]
    pub add_content_length_header: bool,
    /// Where to persist the compiled route table. Disabled when unset.
    #[serde(alias = "routerCacheFile")]
    pub router_cache_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_version: "1.1".to_string(),
            response_chunk_size: 4096,
            output_buffering: OutputBuffering::Append,
            determine_route_before_app_middleware: false,
            display_error_details: false,
            add_content_length_header: true,
            router_cache_file: None,
        }
    }
}

/// Logging options for the server binary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `switchyard=debug`.
    pub level: String,
    pub json: bool,
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            include_spans: true,
        }
    }
}

/// Top-level configuration file of the server binary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub settings: Settings,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            settings: Settings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.response_chunk_size, 4096);
        assert_eq!(settings.output_buffering, OutputBuffering::Append);
        assert!(settings.add_content_length_header);
    }

    #[test]
    fn test_settings_camel_case_aliases() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "httpVersion": "2",
                "responseChunkSize": 1024,
                "outputBuffering": "prepend",
                "determineRouteBeforeAppMiddleware": true,
                "displayErrorDetails": true,
                "addContentLengthHeader": false,
                "routerCacheFile": "/tmp/routes.cache"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.http_version, "2");
        assert_eq!(settings.response_chunk_size, 1024);
        assert_eq!(settings.output_buffering, OutputBuffering::Prepend);
        assert!(settings.determine_route_before_app_middleware);
        assert!(settings.display_error_details);
        assert!(!settings.add_content_length_header);
        assert_eq!(settings.router_cache_file, Some(PathBuf::from("/tmp/routes.cache")));
    }

    #[test]
    fn test_unknown_output_buffering_is_rejected() {
        let result: Result<Settings, _> = serde_json::from_str(r#"{"output_buffering": "sideways"}"#);
        assert!(result.is_err());
    }
}

//! Server parameters a request is synthesized from.
use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    params: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }

    /// Environment with sensible defaults for a local GET request, overridden
    /// by `overrides`.
    pub fn mock<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params: BTreeMap<String, String> = [
            ("SERVER_PROTOCOL", "HTTP/1.1"),
            ("REQUEST_METHOD", "GET"),
            ("SCRIPT_NAME", ""),
            ("REQUEST_URI", ""),
            ("QUERY_STRING", ""),
            ("SERVER_NAME", "localhost"),
            ("SERVER_PORT", "80"),
            ("HTTP_HOST", "localhost"),
            (
                "HTTP_ACCEPT",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
            ("HTTP_ACCEPT_LANGUAGE", "en-US,en;q=0.8"),
            ("HTTP_USER_AGENT", "switchyard"),
            ("REMOTE_ADDR", "127.0.0.1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        params.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Request headers carried as `HTTP_*` (plus `CONTENT_TYPE` and
    /// `CONTENT_LENGTH`) parameters.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.params {
            let name = match key.as_str() {
                "CONTENT_TYPE" | "CONTENT_LENGTH" => key.as_str(),
                _ => match key.strip_prefix("HTTP_") {
                    Some(name) => name,
                    None => continue,
                },
            };
            let name = name.replace('_', "-").to_ascii_lowercase();
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            } else {
                tracing::debug!("Skipping unrepresentable header parameter {}", key);
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_overrides_defaults() {
        let env = Environment::mock([("REQUEST_METHOD", "POST")]);
        assert_eq!(env.get("REQUEST_METHOD"), Some("POST"));
        assert_eq!(env.get("SERVER_NAME"), Some("localhost"));
    }

    #[test]
    fn test_headers_from_http_params() {
        let env = Environment::mock([("HTTP_X_REQUEST_ID", "abc"), ("CONTENT_TYPE", "text/plain")]);
        let headers = env.headers();

        assert_eq!(headers.get("x-request-id").unwrap(), "abc");
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("host").unwrap(), "localhost");
        assert!(headers.get("remote-addr").is_none());
    }
}

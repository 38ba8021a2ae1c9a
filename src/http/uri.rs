//! Request URI with an explicit base path.
//!
//! When an application is mounted below a script or directory prefix, the
//! prefix is kept apart as the base path. Routing only ever sees the path;
//! the base path is used when building absolute links.
use std::{fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    http::Environment,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    host: String,
    port: Option<u16>,
    base_path: String,
    path: String,
    query: String,
}

impl Uri {
    /// Build the request URI from server parameters.
    pub fn from_environment(env: &Environment) -> Self {
        let scheme = match env.get("HTTPS") {
            Some(flag) if !flag.is_empty() && !flag.eq_ignore_ascii_case("off") => "https",
            _ => "http",
        };

        let (host, mut port) = match env.get("HTTP_HOST") {
            Some(host_header) => split_host_port(host_header),
            None => (env.get("SERVER_NAME").unwrap_or_default().to_string(), None),
        };
        if port.is_none() {
            port = env.get("SERVER_PORT").and_then(|p| p.parse().ok());
        }

        let request_uri = env.get("REQUEST_URI").unwrap_or_default();
        let (request_path, request_query) = match request_uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (request_uri, ""),
        };
        let script_name = env.get("SCRIPT_NAME").unwrap_or_default();
        let script_dir = match script_name.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &script_name[..idx],
        };

        let mut base_path = "";
        if !script_name.is_empty() && starts_with_ignore_case(request_path, script_name) {
            base_path = script_name;
        } else if script_dir != "/" && starts_with_ignore_case(request_path, script_dir) {
            base_path = script_dir;
        }

        let path = if base_path.is_empty() {
            request_path.to_string()
        } else {
            request_path[base_path.len()..].trim_start_matches('/').to_string()
        };

        let query = match env.get("QUERY_STRING") {
            Some(query) if !query.is_empty() => query.to_string(),
            _ => request_query.to_string(),
        };

        Self {
            scheme: scheme.to_string(),
            host,
            port,
            base_path: base_path.to_string(),
            path,
            query,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into().trim_start_matches('?').to_string();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        self.base_path = if base_path.is_empty() || base_path.starts_with('/') {
            base_path
        } else {
            format!("/{base_path}")
        };
        self
    }

    fn authority(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "https" => 443,
            _ => 80,
        };
        match self.port {
            Some(port) if port != default_port => format!("{}:{port}", self.host),
            _ => self.host.clone(),
        }
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parsed: http::Uri = s.parse().map_err(|e: http::uri::InvalidUri| {
            Error::application(format!("invalid URI '{s}': {e}"))
        })?;
        Ok(Self {
            scheme: parsed.scheme_str().unwrap_or("http").to_string(),
            host: parsed.host().unwrap_or_default().to_string(),
            port: parsed.port_u16(),
            base_path: String::new(),
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
        })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.host.is_empty() {
            write!(f, "{}://{}", self.scheme, self.authority())?;
        }
        f.write_str(&self.base_path)?;
        if !self.base_path.is_empty() && !self.path.starts_with('/') {
            f.write_str("/")?;
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

fn split_host_port(value: &str) -> (String, Option<u16>) {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.ends_with(']') || value.starts_with('[') => {
            match port.parse() {
                Ok(port) => (host.to_string(), Some(port)),
                Err(_) => (value.to_string(), None),
            }
        }
        _ => (value.to_string(), None),
    }
}

fn starts_with_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .get(..needle.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_from_script_name() {
        let env = Environment::mock([
            ("SCRIPT_NAME", "/front.cgi"),
            ("REQUEST_URI", "/front.cgi/foo/bar?abc=123"),
        ]);
        let uri = Uri::from_environment(&env);

        assert_eq!(uri.base_path(), "/front.cgi");
        assert_eq!(uri.path(), "foo/bar");
        assert_eq!(uri.query(), "abc=123");
        assert_eq!(uri.to_string(), "http://localhost/front.cgi/foo/bar?abc=123");
    }

    #[test]
    fn test_base_path_from_script_directory() {
        let env = Environment::mock([
            ("SCRIPT_NAME", "/app/front.cgi"),
            ("REQUEST_URI", "/app/users"),
        ]);
        let uri = Uri::from_environment(&env);

        assert_eq!(uri.base_path(), "/app");
        assert_eq!(uri.path(), "users");
    }

    #[test]
    fn test_root_script_keeps_full_path() {
        let env = Environment::mock([("SCRIPT_NAME", "/front.cgi"), ("REQUEST_URI", "/foo")]);
        let uri = Uri::from_environment(&env);

        assert_eq!(uri.base_path(), "");
        assert_eq!(uri.path(), "/foo");
    }

    #[test]
    fn test_parse_absolute_uri() {
        let uri: Uri = "https://example.com:8443/foo/bar?abc=123".parse().unwrap();
        assert_eq!(uri.scheme(), "https");
        assert_eq!(uri.port(), Some(8443));
        assert_eq!(uri.path(), "/foo/bar");
        assert_eq!(uri.to_string(), "https://example.com:8443/foo/bar?abc=123");
    }
}

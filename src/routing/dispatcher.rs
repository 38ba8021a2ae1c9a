//! Compiled route table and matcher.
//!
//! [`DispatchData`] is the serializable form of the table (static routes
//! keyed by exact path, variable routes as anchored regexes). A
//! [`Dispatcher`] compiles the regexes once and answers `(method, path)`
//! lookups.
use std::{
    fs,
    io::{ErrorKind, Write},
    path::Path,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    routing::{
        RouteArguments,
        pattern::{self, Segment},
    },
};

/// Result of matching a request against the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispatch {
    Found {
        identifier: String,
        arguments: RouteArguments,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<String>,
    },
}

/// A dispatch result bound to the `[method, uri]` pair it was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    dispatch: Dispatch,
    method: String,
    uri: String,
}

impl RouteInfo {
    pub fn new(dispatch: Dispatch, method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            dispatch,
            method: method.into(),
            uri: uri.into(),
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn matches(&self, fingerprint: &(String, String)) -> bool {
        self.method == fingerprint.0 && self.uri == fingerprint.1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StaticRoute {
    method: String,
    path: String,
    identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VariableRoute {
    method: String,
    regex: String,
    variables: Vec<String>,
    identifier: String,
}

/// Serializable route table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchData {
    static_routes: Vec<StaticRoute>,
    variable_routes: Vec<VariableRoute>,
}

impl DispatchData {
    /// Register every alternative of `pattern` for each method. The first
    /// registration of a method and path wins.
    pub fn add_route(&mut self, methods: &[String], pattern: &str, identifier: &str) -> Result<()> {
        for data in pattern::parse(pattern)? {
            for method in methods {
                match data.as_slice() {
                    [] => self.add_static(method, "", identifier),
                    [Segment::Static(path)] => self.add_static(method, path, identifier),
                    _ => self.add_variable(method, &data, identifier),
                }
            }
        }
        Ok(())
    }

    fn add_static(&mut self, method: &str, path: &str, identifier: &str) {
        let taken = self
            .static_routes
            .iter()
            .any(|r| r.method == method && r.path == path);
        if taken {
            tracing::debug!("Ignoring duplicate static route {} {}", method, path);
            return;
        }
        self.static_routes.push(StaticRoute {
            method: method.to_string(),
            path: path.to_string(),
            identifier: identifier.to_string(),
        });
    }

    fn add_variable(&mut self, method: &str, data: &[Segment], identifier: &str) {
        let mut source = String::from("^");
        let mut variables = Vec::new();
        for segment in data {
            match segment {
                Segment::Static(text) => source.push_str(&regex::escape(text)),
                Segment::Placeholder { name, regex: part } => {
                    source.push_str(&format!("(?P<p{}>{})", variables.len(), part));
                    variables.push(name.clone());
                }
            }
        }
        source.push('$');

        let taken = self
            .variable_routes
            .iter()
            .any(|r| r.method == method && r.regex == source);
        if taken {
            tracing::debug!("Ignoring duplicate variable route {} {}", method, source);
            return;
        }
        self.variable_routes.push(VariableRoute {
            method: method.to_string(),
            regex: source,
            variables,
            identifier: identifier.to_string(),
        });
    }

    /// Read a table previously written by [`DispatchData::write_to`].
    /// Returns `Ok(None)` when the file does not exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::CacheFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Write the table to `path` through a sibling temp file renamed into
    /// place, so concurrent readers see either the old or the new table.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let cache_error = |reason: String| Error::CacheFile {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_vec(self).map_err(|e| cache_error(e.to_string()))?;
        let mut file =
            NamedTempFile::new_in(cache_dir(path)).map_err(|e| cache_error(e.to_string()))?;
        file.write_all(&json).map_err(|e| cache_error(e.to_string()))?;
        file.persist(path).map_err(|e| cache_error(e.to_string()))?;
        Ok(())
    }
}

/// Directory holding the cache file at `path`.
pub(crate) fn cache_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    data: DispatchData,
    matchers: Vec<Regex>,
}

impl Dispatcher {
    pub fn new(data: DispatchData) -> Result<Self> {
        let matchers = data
            .variable_routes
            .iter()
            .map(|route| {
                Regex::new(&route.regex).map_err(|e| Error::InvalidPattern {
                    pattern: route.regex.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { data, matchers })
    }

    pub fn data(&self) -> &DispatchData {
        &self.data
    }

    pub fn dispatch(&self, method: &str, path: &str) -> Dispatch {
        if let Some(found) = self.find(method, path) {
            return found;
        }
        if method == "HEAD" {
            if let Some(found) = self.find("GET", path) {
                return found;
            }
        }
        if let Some(found) = self.find("*", path) {
            return found;
        }

        let mut allowed: Vec<String> = Vec::new();
        let mut allow = |candidate: &str| {
            if candidate != method && !allowed.iter().any(|m| m == candidate) {
                allowed.push(candidate.to_string());
            }
        };
        for route in &self.data.static_routes {
            if route.path == path {
                allow(&route.method);
            }
        }
        for (route, matcher) in self.data.variable_routes.iter().zip(&self.matchers) {
            if matcher.is_match(path) {
                allow(&route.method);
            }
        }

        if allowed.is_empty() {
            Dispatch::NotFound
        } else {
            Dispatch::MethodNotAllowed { allowed }
        }
    }

    fn find(&self, method: &str, path: &str) -> Option<Dispatch> {
        if let Some(route) = self
            .data
            .static_routes
            .iter()
            .find(|r| r.method == method && r.path == path)
        {
            return Some(Dispatch::Found {
                identifier: route.identifier.clone(),
                arguments: RouteArguments::new(),
            });
        }

        self.data
            .variable_routes
            .iter()
            .zip(&self.matchers)
            .filter(|(route, _)| route.method == method)
            .find_map(|(route, matcher)| {
                let captures = matcher.captures(path)?;
                let arguments = route
                    .variables
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let value = captures
                            .name(&format!("p{i}"))
                            .map_or("", |m| m.as_str());
                        (name.clone(), value.to_string())
                    })
                    .collect();
                Some(Dispatch::Found {
                    identifier: route.identifier.clone(),
                    arguments,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods(list: &[&str]) -> Vec<String> {
        list.iter().map(|m| m.to_string()).collect()
    }

    fn dispatcher(routes: &[(&[&str], &str, &str)]) -> Dispatcher {
        let mut data = DispatchData::default();
        for (m, pattern, id) in routes {
            data.add_route(&methods(m), pattern, id).unwrap();
        }
        Dispatcher::new(data).unwrap()
    }

    fn found(identifier: &str, arguments: &[(&str, &str)]) -> Dispatch {
        Dispatch::Found {
            identifier: identifier.to_string(),
            arguments: arguments.iter().copied().collect(),
        }
    }

    #[test]
    fn test_static_before_variable() {
        let d = dispatcher(&[
            (&["GET"], "/user/{name}", "route0"),
            (&["GET"], "/user/admin", "route1"),
        ]);
        assert_eq!(d.dispatch("GET", "/user/admin"), found("route1", &[]));
        assert_eq!(
            d.dispatch("GET", "/user/rdlowrey"),
            found("route0", &[("name", "rdlowrey")])
        );
    }

    #[test]
    fn test_variable_routes_in_registration_order() {
        let d = dispatcher(&[
            (&["GET"], "/{a}/{b:\\d+}", "route0"),
            (&["GET"], "/{a}/{b}", "route1"),
        ]);
        assert_eq!(d.dispatch("GET", "/x/12"), found("route0", &[("a", "x"), ("b", "12")]));
        assert_eq!(d.dispatch("GET", "/x/y"), found("route1", &[("a", "x"), ("b", "y")]));
    }

    #[test]
    fn test_optional_segments() {
        let d = dispatcher(&[(&["GET"], "/archive[/{year:\\d{4}}[/{month}]]", "route0")]);
        assert_eq!(d.dispatch("GET", "/archive"), found("route0", &[]));
        assert_eq!(d.dispatch("GET", "/archive/2024"), found("route0", &[("year", "2024")]));
        assert_eq!(
            d.dispatch("GET", "/archive/2024/05"),
            found("route0", &[("year", "2024"), ("month", "05")])
        );
        assert_eq!(d.dispatch("GET", "/archive/24"), Dispatch::NotFound);
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let d = dispatcher(&[(&["GET"], "/resource/{id}", "route0")]);
        assert_eq!(d.dispatch("HEAD", "/resource/1"), found("route0", &[("id", "1")]));
    }

    #[test]
    fn test_method_not_allowed_lists_methods_once() {
        let d = dispatcher(&[
            (&["GET", "PUT"], "/resource/{id}", "route0"),
            (&["DELETE"], "/resource/{id}", "route1"),
            (&["PUT"], "/resource/{id:\\d+}", "route2"),
        ]);
        assert_eq!(
            d.dispatch("POST", "/resource/1"),
            Dispatch::MethodNotAllowed {
                allowed: methods(&["GET", "PUT", "DELETE"])
            }
        );
    }

    #[test]
    fn test_first_duplicate_wins() {
        let d = dispatcher(&[(&["GET"], "/dup", "route0"), (&["GET"], "/dup", "route1")]);
        assert_eq!(d.dispatch("GET", "/dup"), found("route0", &[]));
    }

    #[test]
    fn test_cache_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.cache");
        assert!(DispatchData::read_from(&path).unwrap().is_none());

        let mut data = DispatchData::default();
        data.add_route(&methods(&["GET"]), "/hello/{name}", "route0").unwrap();
        data.write_to(&path).unwrap();

        let restored = DispatchData::read_from(&path).unwrap().unwrap();
        assert_eq!(restored, data);
        let d = Dispatcher::new(restored).unwrap();
        assert_eq!(d.dispatch("GET", "/hello/bob"), found("route0", &[("name", "bob")]));
    }

    #[test]
    fn test_corrupt_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.cache");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(DispatchData::read_from(&path), Err(Error::CacheFile { .. })));
    }
}

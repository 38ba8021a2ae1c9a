//! Server request value object.
//!
//! Requests are treated as immutable values: every `with_*` method consumes
//! the request and returns the modified copy, so a middleware that forwards
//! an altered request never affects what earlier layers observed.
use std::{collections::BTreeMap, fmt, rc::Rc};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;

use crate::{
    http::{Body, Environment, Uri},
    routing::{Route, RouteInfo},
};

#[derive(Clone)]
pub struct Request {
    method: String,
    uri: Uri,
    headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    server_params: BTreeMap<String, String>,
    attributes: BTreeMap<String, Value>,
    route_info: Option<RouteInfo>,
    route: Option<Rc<Route>>,
    body: Body,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method: method.into(),
            uri,
            headers,
            cookies: BTreeMap::new(),
            server_params: BTreeMap::new(),
            attributes: BTreeMap::new(),
            route_info: None,
            route: None,
            body,
        }
    }

    /// Synthesize a request from server parameters. The method token is kept
    /// verbatim even when invalid; dispatch decides what to do with it.
    pub fn from_environment(env: &Environment) -> Self {
        let method = env.get("REQUEST_METHOD").unwrap_or("GET").to_string();
        let mut request = Self::new(method, Uri::from_environment(env), env.headers(), Body::new());
        request.server_params = env.all().clone();
        request
    }

    /// Adapt an `http` crate request head and collected body. Origin-form and
    /// absolute-form targets both route on their path; the host comes from the
    /// target authority when present, else the `Host` header.
    pub fn from_http(parts: &http::request::Parts, body: Bytes) -> Self {
        let request_uri = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());
        let host = match parts.uri.authority() {
            Some(authority) => authority.as_str().to_string(),
            None => parts
                .headers
                .get(http::header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost")
                .to_string(),
        };
        let https = if parts.uri.scheme() == Some(&http::uri::Scheme::HTTPS) {
            "on"
        } else {
            "off"
        };

        let mut server_params = BTreeMap::new();
        server_params.insert("REQUEST_METHOD".to_string(), parts.method.to_string());
        server_params.insert("REQUEST_URI".to_string(), request_uri);
        server_params.insert("HTTP_HOST".to_string(), host);
        server_params.insert("HTTPS".to_string(), https.to_string());
        server_params.insert("SERVER_PROTOCOL".to_string(), format!("{:?}", parts.version));
        let uri = Uri::from_environment(&Environment::new(server_params.clone()));

        let mut request = Self::new(
            parts.method.as_str(),
            uri,
            parts.headers.clone(),
            Body::from(body),
        );
        request.server_params = server_params;
        request
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether the method token is a syntactically valid HTTP method.
    pub fn has_valid_method(&self) -> bool {
        Method::from_bytes(self.method.as_bytes()).is_ok()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All values of a header joined by `", "`.
    pub fn header_line(&self, name: &str) -> String {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn with_cookies(mut self, cookies: BTreeMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn server_params(&self) -> &BTreeMap<String, String> {
        &self.server_params
    }

    pub fn with_server_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.server_params = params;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn without_attribute(mut self, name: &str) -> Self {
        self.attributes.remove(name);
        self
    }

    /// Dispatch outcome attached by the App, if the router already ran.
    pub fn route_info(&self) -> Option<&RouteInfo> {
        self.route_info.as_ref()
    }

    pub fn with_route_info(mut self, info: RouteInfo) -> Self {
        self.route_info = Some(info);
        self
    }

    /// The matched route, attached together with a `Found` route info.
    pub fn route(&self) -> Option<&Rc<Route>> {
        self.route.as_ref()
    }

    pub fn with_route(mut self, route: Rc<Route>) -> Self {
        self.route = Some(route);
        self
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// The `[method, uri]` pair a route info is valid for.
    pub fn fingerprint(&self) -> (String, String) {
        (self.method.clone(), self.uri.to_string())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri.to_string())
            .field("headers", &self.headers)
            .field("attributes", &self.attributes)
            .field("route_info", &self.route_info)
            .field("route", &self.route.as_ref().map(|r| r.identifier().to_string()))
            .field("body", &self.body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_environment() {
        let env = Environment::mock([
            ("REQUEST_METHOD", "PUT"),
            ("REQUEST_URI", "/foo?x=1"),
            ("HTTP_X_TRACE", "yes"),
        ]);
        let request = Request::from_environment(&env);

        assert_eq!(request.method(), "PUT");
        assert_eq!(request.uri().path(), "/foo");
        assert_eq!(request.header_line("X-Trace"), "yes");
        assert_eq!(request.server_params().get("REQUEST_METHOD").unwrap(), "PUT");
    }

    #[test]
    fn test_method_token_validation() {
        let env = Environment::mock([("REQUEST_METHOD", "BADMTHD")]);
        assert!(Request::from_environment(&env).has_valid_method());

        let env = Environment::mock([("REQUEST_METHOD", "B@DMTHD")]);
        assert!(!Request::from_environment(&env).has_valid_method());
    }

    #[test]
    fn test_attributes_are_copy_on_write() {
        let original = Request::from_environment(&Environment::mock([("REQUEST_URI", "/")]));
        let changed = original.clone().with_attribute("user", "alice");

        assert!(original.attribute("user").is_none());
        assert_eq!(changed.attribute("user").unwrap(), "alice");
        assert!(changed.without_attribute("user").attribute("user").is_none());
    }

    #[test]
    fn test_from_http_parts() {
        let (parts, _) = http::Request::builder()
            .method("POST")
            .uri("/items?page=2")
            .header("host", "api.example.com")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_http(&parts, Bytes::from_static(b"payload"));

        assert_eq!(request.method(), "POST");
        assert_eq!(request.uri().path(), "/items");
        assert_eq!(request.uri().query(), "page=2");
        assert_eq!(request.uri().host(), "api.example.com");
        assert_eq!(request.body().contents(), "payload");
    }

    #[test]
    fn test_from_http_absolute_form_target() {
        let (parts, _) = http::Request::builder()
            .version(http::Version::HTTP_2)
            .uri("https://api.example.com:8443/hello/world?lang=en")
            .body(())
            .unwrap()
            .into_parts();
        let request = Request::from_http(&parts, Bytes::new());

        assert_eq!(request.uri().path(), "/hello/world");
        assert_eq!(request.uri().query(), "lang=en");
        assert_eq!(request.uri().scheme(), "https");
        assert_eq!(request.uri().host(), "api.example.com");
        assert_eq!(request.uri().port(), Some(8443));
        assert_eq!(
            request.server_params().get("REQUEST_URI").unwrap(),
            "/hello/world?lang=en"
        );
    }
}

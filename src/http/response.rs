//! Response value object.
use http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{AsHeaderName, IntoHeaderName},
};

use crate::http::Body;

/// Statuses that must not carry a body (RFC 7231).
const EMPTY_STATUSES: [StatusCode; 3] = [
    StatusCode::NO_CONTENT,
    StatusCode::RESET_CONTENT,
    StatusCode::NOT_MODIFIED,
];

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    version: String,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            version: "1.1".to_string(),
            headers: HeaderMap::new(),
            body: Body::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self.reason = None;
        self
    }

    /// Status with a custom reason phrase.
    pub fn with_status_reason(mut self, status: StatusCode, reason: impl Into<String>) -> Self {
        self.status = status;
        self.reason = Some(reason.into());
        self
    }

    pub fn reason_phrase(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => self.status.canonical_reason().unwrap_or(""),
        }
    }

    pub fn protocol_version(&self) -> &str {
        &self.version
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// All values of a header joined by `", "`, empty when absent.
    pub fn header_line<K: AsHeaderName>(&self, name: K) -> String {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_added_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn without_header<K: AsHeaderName>(mut self, name: K) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Append to the body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.body.write(data);
        self
    }

    /// Whether the status forbids a body.
    pub fn is_empty(&self) -> bool {
        EMPTY_STATUSES.contains(&self.status)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use http::header;

    use super::*;

    #[test]
    fn test_write_is_chainable() {
        let mut response = Response::new();
        response.write("In").write("Out");
        assert_eq!(response.body().contents(), "InOut");
    }

    #[test]
    fn test_empty_statuses() {
        for status in [204, 205, 304] {
            let response = Response::new().with_status(StatusCode::from_u16(status).unwrap());
            assert!(response.is_empty());
        }
        assert!(!Response::new().is_empty());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let response = Response::new()
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(response.has_header("Content-Type"));
        assert_eq!(response.header_line("content-type"), "text/plain");
        assert!(!response.without_header("CONTENT-TYPE").has_header(header::CONTENT_TYPE));
    }

    #[test]
    fn test_custom_reason_phrase() {
        let response = Response::new().with_status_reason(StatusCode::OK, "Fine");
        assert_eq!(response.reason_phrase(), "Fine");
        assert_eq!(response.with_status(StatusCode::NOT_FOUND).reason_phrase(), "Not Found");
    }
}

use http::{HeaderValue, Method, StatusCode, header};

use crate::{
    error::{Error, Result},
    handlers::{NotAllowedHandler, plain_text},
    http::{Request, Response},
};

/// Default 405 handler. An `OPTIONS` request is answered with 200 and the
/// allowed methods instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAllowed;

impl NotAllowedHandler for NotAllowed {
    fn handle(&self, request: &Request, response: Response, allowed: &[String]) -> Result<Response> {
        let allow = allowed.join(", ");
        let allow_value = HeaderValue::from_str(&allow).map_err(Error::application)?;

        let (status, text) = if request.method() == Method::OPTIONS.as_str() {
            (StatusCode::OK, format!("Allowed methods: {allow}"))
        } else {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method not allowed. Must be one of: {allow}"),
            )
        };
        tracing::debug!(method = %request.method(), allow = %allow, "Method not allowed");

        let response = response
            .with_status(status)
            .with_header(header::ALLOW, allow_value);
        Ok(plain_text(response, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Environment;

    fn request(method: &str) -> Request {
        Request::from_environment(&Environment::mock([
            ("REQUEST_METHOD", method),
            ("REQUEST_URI", "/foo"),
        ]))
    }

    #[test]
    fn test_not_allowed_response() {
        let allowed = vec!["GET".to_string(), "PUT".to_string()];
        let response = NotAllowed.handle(&request("POST"), Response::new(), &allowed).unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header_line("Allow"), "GET, PUT");
        assert_eq!(response.body().contents(), "Method not allowed. Must be one of: GET, PUT");
    }

    #[test]
    fn test_options_lists_methods() {
        let allowed = vec!["GET".to_string()];
        let response = NotAllowed.handle(&request("OPTIONS"), Response::new(), &allowed).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().contents(), "Allowed methods: GET");
    }
}

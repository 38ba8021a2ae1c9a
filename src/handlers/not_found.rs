use http::StatusCode;

use crate::{
    error::Result,
    handlers::{NotFoundHandler, plain_text},
    http::{Request, Response},
};

/// Default 404 handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl NotFoundHandler for NotFound {
    fn handle(&self, request: &Request, response: Response) -> Result<Response> {
        tracing::debug!(method = %request.method(), path = %request.uri().path(), "No route matched");
        Ok(plain_text(response.with_status(StatusCode::NOT_FOUND), "Not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Environment;

    #[test]
    fn test_not_found_response() {
        let request = Request::from_environment(&Environment::mock([("REQUEST_URI", "/missing")]));
        let response = NotFound.handle(&request, Response::new()).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body().contents(), "Not found");
        assert_eq!(response.header_line("content-type"), "text/plain; charset=UTF-8");
    }
}

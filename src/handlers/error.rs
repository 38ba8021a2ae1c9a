//! Default 500 handlers.
//!
//! Details (the error message and its source chain) are only rendered when
//! `display_error_details` is on; otherwise the body is a generic message.
//! The error is always logged.
use std::error::Error as _;

use http::StatusCode;

use crate::{
    error::{Error, Result},
    handlers::{ErrorHandler, plain_text},
    http::{Request, Response},
};

const GENERIC_MESSAGE: &str =
    "A website error has occurred. Sorry for the temporary inconvenience.";

/// Handler for errors raised by handlers and middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationError {
    display_error_details: bool,
}

impl ApplicationError {
    pub fn new(display_error_details: bool) -> Self {
        Self {
            display_error_details,
        }
    }
}

impl ErrorHandler for ApplicationError {
    fn handle(&self, request: &Request, response: Response, error: &Error) -> Result<Response> {
        tracing::error!(
            method = %request.method(),
            path = %request.uri().path(),
            "Application error: {}",
            error
        );
        Ok(render(response, "Application Error", error, self.display_error_details))
    }
}

/// Handler for panics caught while processing a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeFault {
    display_error_details: bool,
}

impl RuntimeFault {
    pub fn new(display_error_details: bool) -> Self {
        Self {
            display_error_details,
        }
    }
}

impl ErrorHandler for RuntimeFault {
    fn handle(&self, request: &Request, response: Response, error: &Error) -> Result<Response> {
        tracing::error!(
            method = %request.method(),
            path = %request.uri().path(),
            "Runtime fault: {}",
            error
        );
        Ok(render(response, "Runtime Fault", error, self.display_error_details))
    }
}

fn render(response: Response, title: &str, error: &Error, details: bool) -> Response {
    let mut text = format!("{title}\n\n");
    if details {
        text.push_str("The application could not run because of the following error:\n\n");
        text.push_str(&format!("Details: {error}\n"));
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str(&format!("Previous error: {cause}\n"));
            source = cause.source();
        }
    } else {
        text.push_str(GENERIC_MESSAGE);
    }
    plain_text(response.with_status(StatusCode::INTERNAL_SERVER_ERROR), &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Environment;

    fn request() -> Request {
        Request::from_environment(&Environment::mock([("REQUEST_URI", "/boom")]))
    }

    #[test]
    fn test_details_hidden_by_default() {
        let error = Error::application("secret database password leaked");
        let response = ApplicationError::default()
            .handle(&request(), Response::new(), &error)
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.body().contents();
        assert!(body.contains(GENERIC_MESSAGE));
        assert!(!body.contains("secret"));
    }

    #[test]
    fn test_details_shown_when_enabled() {
        let error = Error::RuntimeFault("index out of bounds".to_string());
        let response = RuntimeFault::new(true)
            .handle(&request(), Response::new(), &error)
            .unwrap();

        let body = response.body().contents();
        assert!(body.starts_with("Runtime Fault"));
        assert!(body.contains("Details: Runtime fault: index out of bounds"));
    }
}

//! Handlers that turn routing failures and errors into responses.
//!
//! The App looks these up in the [`Container`](crate::core::container::Container)
//! when something goes wrong. Closures with the matching signature implement
//! the traits too.
pub mod error;
pub mod not_allowed;
pub mod not_found;

use http::{HeaderValue, header};

use crate::{
    error::{Error, Result},
    http::{Body, Request, Response},
};

pub trait NotFoundHandler {
    fn handle(&self, request: &Request, response: Response) -> Result<Response>;
}

impl<F> NotFoundHandler for F
where
    F: Fn(&Request, Response) -> Result<Response>,
{
    fn handle(&self, request: &Request, response: Response) -> Result<Response> {
        self(request, response)
    }
}

pub trait NotAllowedHandler {
    fn handle(&self, request: &Request, response: Response, allowed: &[String]) -> Result<Response>;
}

impl<F> NotAllowedHandler for F
where
    F: Fn(&Request, Response, &[String]) -> Result<Response>,
{
    fn handle(&self, request: &Request, response: Response, allowed: &[String]) -> Result<Response> {
        self(request, response, allowed)
    }
}

/// Handles application errors and, registered as the runtime fault
/// handler, caught panics.
pub trait ErrorHandler {
    fn handle(&self, request: &Request, response: Response, error: &Error) -> Result<Response>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Request, Response, &Error) -> Result<Response>,
{
    fn handle(&self, request: &Request, response: Response, error: &Error) -> Result<Response> {
        self(request, response, error)
    }
}

/// Replace the body with plain text.
fn plain_text(response: Response, text: &str) -> Response {
    response
        .with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=UTF-8"),
        )
        .with_body(Body::from(text))
}

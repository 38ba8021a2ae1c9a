//! Error taxonomy for request processing.
//!
//! Every failure raised while registering routes or handling a request is a
//! variant of [`Error`]. The App translates routing failures, application
//! errors and runtime faults into responses through the registered handlers
//! and re-raises when no handler is registered.
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

use crate::{http::Response, ports::EmitterError};

/// Boxed error produced by user handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No route matches the request path.
    #[error("Not found")]
    NotFound,

    /// A route matches the path but not the request method.
    #[error("Method not allowed. Must be one of: {}", .allowed.join(", "))]
    MethodNotAllowed { allowed: Vec<String> },

    /// The request method is not a syntactically valid HTTP token.
    #[error("Unsupported HTTP method \"{0}\" provided")]
    InvalidMethod(String),

    /// Stops processing and returns the carried response unchanged.
    #[error("Request halted with status {}", .0.status())]
    Halt(Box<Response>),

    #[error("Middleware can't be added once the stack is dequeuing")]
    MiddlewareLocked,

    #[error("MiddlewareStack can only be seeded once")]
    StackAlreadySeeded,

    #[error("Callable '{0}' is not registered in the service container")]
    UnresolvableCallable(String),

    #[error("Route not found, looks like your route cache is stale. (identifier: {0})")]
    RouteNotFound(String),

    #[error("Named route does not exist for name: {0}")]
    NamedRouteNotFound(String),

    #[error("Missing data for URL segment: {0}")]
    MissingSegmentData(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown output buffering mode: {0}")]
    InvalidOutputBuffering(String),

    #[error("Unexpected data in output buffer. Maybe output was written before the response?")]
    OutputBufferConflict,

    #[error("Router cacheFile directory must be writable: {}", .0.display())]
    CacheFileNotWritable(PathBuf),

    #[error("Router cache file {} is unusable: {reason}", .path.display())]
    CacheFile { path: PathBuf, reason: String },

    #[error("Method {0} is not a valid method")]
    UnknownExtension(String),

    /// Failure raised by handler or middleware code.
    #[error(transparent)]
    Application(BoxError),

    /// A panic caught while processing the request.
    #[error("Runtime fault: {0}")]
    RuntimeFault(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to emit response: {0}")]
    Emit(#[from] EmitterError),
}

impl Error {
    /// Wrap an arbitrary error raised by user code.
    pub fn application(error: impl Into<BoxError>) -> Self {
        Self::Application(error.into())
    }

    /// Stop processing and answer with `response`.
    pub fn halt(response: Response) -> Self {
        Self::Halt(Box::new(response))
    }

    /// Routing failures are recoverable and map onto the not-found and
    /// not-allowed handlers.
    pub fn is_routing_failure(&self) -> bool {
        matches!(self, Self::NotFound | Self::MethodNotAllowed { .. })
    }

    /// Programming errors in how the middleware stack or output capture is
    /// used. These bypass the error handlers.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::MiddlewareLocked | Self::StackAlreadySeeded | Self::OutputBufferConflict
        )
    }

    /// The status code the default handlers answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::InvalidMethod(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Halt(response) => response.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

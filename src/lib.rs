//! Switchyard - a routing and middleware dispatch kernel for small HTTP
//! applications.
//!
//! An [`App`] owns a [`Router`] of routes and route groups, a stack of App
//! middleware and a [`Container`] of handlers and named services. Requests go
//! through [`App::process`]: App middleware first, then the router, then the
//! route's own middleware, then the route handler. Failures become responses
//! through the not-found, not-allowed, error and runtime-fault handlers.
//!
//! # Quick Example
//! ```no_run
//! use switchyard::{App, Environment, HandlerArgs, Request, Response, Settings, from_fn, handler_fn};
//!
//! # fn main() -> switchyard::Result<()> {
//! let app = App::new(Settings::default())?
//!     .with_environment(Environment::mock([("REQUEST_URI", "/hello/world")]));
//!
//! app.get(
//!     "/hello/{name}",
//!     handler_fn(|_req: &Request, _res: &mut Response, args: &HandlerArgs| {
//!         Ok(format!("Hello, {}", args.get("name").unwrap_or("stranger")))
//!     }),
//! );
//! app.add(from_fn(|req, res, next| next.run(req, res)))?;
//!
//! let response = app.run(None)?;
//! assert_eq!(response.body().contents(), "Hello, world");
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Transport concerns sit behind the [`ports::ResponseEmitter`] port. The
//! [`adapters`] module provides a raw writer emitter, an in-memory emitter
//! and an axum host that builds one App per request.
//!
//! # Error Handling
//! Request processing returns [`Result`] with the crate [`Error`]. The binary
//! and the config loader use `eyre::Result` with context attached.
pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod handlers;
pub mod http;
pub mod output;
pub mod ports;
pub mod routing;
pub mod tracing_setup;

pub use crate::{
    config::{ServerConfig, Settings},
    core::{
        App, Container, Kernel, Middleware, Next, from_fn,
        container::{
            ERROR_HANDLER, FOUND_HANDLER, NOT_ALLOWED_HANDLER, NOT_FOUND_HANDLER,
            RUNTIME_FAULT_HANDLER,
        },
    },
    error::{BoxError, Error, Result},
    handlers::{ErrorHandler, NotAllowedHandler, NotFoundHandler},
    http::{Body, Environment, Request, Response, Uri},
    output::echo,
    routing::{
        Callable, HandlerArgs, OutputBuffering, Outcome, Route, RouteArguments, RouteGroup,
        RouteHandler, Router, handler_fn,
    },
};

//! Routes, groups, pattern matching and the router that ties them together.
pub mod arguments;
pub mod dispatcher;
pub mod group;
pub mod handler;
pub mod pattern;
pub mod route;
pub mod router;

pub use arguments::RouteArguments;
pub use dispatcher::{Dispatch, DispatchData, Dispatcher, RouteInfo};
pub use group::{GroupBody, RouteGroup};
pub use handler::{
    Callable, HandlerArgs, HandlerFn, InvocationStrategy, Outcome, RequestResponse,
    RequestResponseArgs, RouteHandler, handler_fn,
};
pub use route::{OutputBuffering, Route};
pub use router::Router;

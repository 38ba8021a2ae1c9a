pub mod app;
pub mod container;
pub mod middleware;

pub use app::App;
pub use container::{Container, Extension};
pub use middleware::{DeferredMiddleware, FnMiddleware, Kernel, Middleware, MiddlewareStack, Next, StackState, from_fn};

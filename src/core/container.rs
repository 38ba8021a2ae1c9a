//! Service registry consulted by the App and by routes at call time.
//!
//! Holds the error and routing handlers, the invocation strategy, and named
//! middleware, route handlers and extensions. Everything is replaceable
//! after construction; lookups happen when a request runs, not when a route
//! is registered.
use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::Rc,
};

use serde_json::Value;

use crate::{
    config::Settings,
    core::{app::App, middleware::Middleware},
    error::Result,
    handlers::{
        ErrorHandler, NotAllowedHandler, NotFoundHandler,
        error::{ApplicationError, RuntimeFault},
        not_allowed::NotAllowed,
        not_found::NotFound,
    },
    routing::{InvocationStrategy, RequestResponse, RouteHandler},
};

pub const ERROR_HANDLER: &str = "errorHandler";
pub const RUNTIME_FAULT_HANDLER: &str = "runtimeFaultHandler";
pub const NOT_FOUND_HANDLER: &str = "notFoundHandler";
pub const NOT_ALLOWED_HANDLER: &str = "notAllowedHandler";
pub const FOUND_HANDLER: &str = "foundHandler";

/// A named operation exposed through [`App::invoke_extension`].
pub trait Extension {
    fn invoke(&self, app: &App, args: &[Value]) -> Result<Value>;
}

impl<F> Extension for F
where
    F: Fn(&App, &[Value]) -> Result<Value>,
{
    fn invoke(&self, app: &App, args: &[Value]) -> Result<Value> {
        self(app, args)
    }
}

pub struct Container {
    error_handler: RefCell<Option<Rc<dyn ErrorHandler>>>,
    runtime_fault_handler: RefCell<Option<Rc<dyn ErrorHandler>>>,
    not_found_handler: RefCell<Option<Rc<dyn NotFoundHandler>>>,
    not_allowed_handler: RefCell<Option<Rc<dyn NotAllowedHandler>>>,
    found_handler: RefCell<Rc<dyn InvocationStrategy>>,
    middleware: RefCell<HashMap<String, Rc<dyn Middleware>>>,
    route_handlers: RefCell<HashMap<String, Rc<dyn RouteHandler>>>,
    extensions: RefCell<HashMap<String, Rc<dyn Extension>>>,
}

impl Container {
    /// Registry with the default handlers configured from `settings`.
    pub fn new(settings: &Settings) -> Self {
        let container = Self::empty();
        container.set_error_handler(ApplicationError::new(settings.display_error_details));
        container.set_runtime_fault_handler(RuntimeFault::new(settings.display_error_details));
        container.set_not_found_handler(NotFound);
        container.set_not_allowed_handler(NotAllowed);
        container
    }

    /// Registry without any handlers. Failures propagate to the caller.
    pub fn empty() -> Self {
        Self {
            error_handler: RefCell::new(None),
            runtime_fault_handler: RefCell::new(None),
            not_found_handler: RefCell::new(None),
            not_allowed_handler: RefCell::new(None),
            found_handler: RefCell::new(Rc::new(RequestResponse)),
            middleware: RefCell::new(HashMap::new()),
            route_handlers: RefCell::new(HashMap::new()),
            extensions: RefCell::new(HashMap::new()),
        }
    }

    /// Whether a service is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        match name {
            ERROR_HANDLER => self.error_handler.borrow().is_some(),
            RUNTIME_FAULT_HANDLER => self.runtime_fault_handler.borrow().is_some(),
            NOT_FOUND_HANDLER => self.not_found_handler.borrow().is_some(),
            NOT_ALLOWED_HANDLER => self.not_allowed_handler.borrow().is_some(),
            FOUND_HANDLER => true,
            _ => {
                self.middleware.borrow().contains_key(name)
                    || self.route_handlers.borrow().contains_key(name)
                    || self.extensions.borrow().contains_key(name)
            }
        }
    }

    pub fn error_handler(&self) -> Option<Rc<dyn ErrorHandler>> {
        self.error_handler.borrow().clone()
    }

    pub fn set_error_handler(&self, handler: impl ErrorHandler + 'static) {
        *self.error_handler.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn runtime_fault_handler(&self) -> Option<Rc<dyn ErrorHandler>> {
        self.runtime_fault_handler.borrow().clone()
    }

    pub fn set_runtime_fault_handler(&self, handler: impl ErrorHandler + 'static) {
        *self.runtime_fault_handler.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn not_found_handler(&self) -> Option<Rc<dyn NotFoundHandler>> {
        self.not_found_handler.borrow().clone()
    }

    pub fn set_not_found_handler(&self, handler: impl NotFoundHandler + 'static) {
        *self.not_found_handler.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn not_allowed_handler(&self) -> Option<Rc<dyn NotAllowedHandler>> {
        self.not_allowed_handler.borrow().clone()
    }

    pub fn set_not_allowed_handler(&self, handler: impl NotAllowedHandler + 'static) {
        *self.not_allowed_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Remove a handler so its failures propagate instead.
    pub fn remove(&self, name: &str) {
        match name {
            ERROR_HANDLER => *self.error_handler.borrow_mut() = None,
            RUNTIME_FAULT_HANDLER => *self.runtime_fault_handler.borrow_mut() = None,
            NOT_FOUND_HANDLER => *self.not_found_handler.borrow_mut() = None,
            NOT_ALLOWED_HANDLER => *self.not_allowed_handler.borrow_mut() = None,
            FOUND_HANDLER => *self.found_handler.borrow_mut() = Rc::new(RequestResponse),
            _ => {
                self.middleware.borrow_mut().remove(name);
                self.route_handlers.borrow_mut().remove(name);
                self.extensions.borrow_mut().remove(name);
            }
        }
    }

    pub fn found_handler(&self) -> Rc<dyn InvocationStrategy> {
        Rc::clone(&self.found_handler.borrow())
    }

    pub fn set_found_handler(&self, strategy: impl InvocationStrategy + 'static) {
        *self.found_handler.borrow_mut() = Rc::new(strategy);
    }

    pub fn middleware(&self, name: &str) -> Option<Rc<dyn Middleware>> {
        self.middleware.borrow().get(name).cloned()
    }

    pub fn register_middleware(&self, name: impl Into<String>, middleware: impl Middleware + 'static) {
        self.middleware
            .borrow_mut()
            .insert(name.into(), Rc::new(middleware));
    }

    pub fn route_handler(&self, name: &str) -> Option<Rc<dyn RouteHandler>> {
        self.route_handlers.borrow().get(name).cloned()
    }

    pub fn register_route_handler(&self, name: impl Into<String>, handler: impl RouteHandler + 'static) {
        self.route_handlers
            .borrow_mut()
            .insert(name.into(), Rc::new(handler));
    }

    pub fn extension(&self, name: &str) -> Option<Rc<dyn Extension>> {
        self.extensions.borrow().get(name).cloned()
    }

    pub fn register_extension(&self, name: impl Into<String>, extension: impl Extension + 'static) {
        self.extensions
            .borrow_mut()
            .insert(name.into(), Rc::new(extension));
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .middleware
            .borrow()
            .keys()
            .chain(self.route_handlers.borrow().keys())
            .chain(self.extensions.borrow().keys())
            .cloned()
            .collect();
        names.sort();
        f.debug_struct("Container").field("services", &names).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler_fn;

    #[test]
    fn test_defaults_are_registered() {
        let container = Container::new(&Settings::default());
        for name in [ERROR_HANDLER, RUNTIME_FAULT_HANDLER, NOT_FOUND_HANDLER, NOT_ALLOWED_HANDLER, FOUND_HANDLER] {
            assert!(container.has(name), "{name}");
        }
        assert!(!container.has("unknown"));
    }

    #[test]
    fn test_empty_container_and_remove() {
        let container = Container::empty();
        assert!(!container.has(NOT_FOUND_HANDLER));

        let container = Container::new(&Settings::default());
        container.remove(ERROR_HANDLER);
        assert!(container.error_handler().is_none());
    }

    #[test]
    fn test_named_services() {
        let container = Container::empty();
        container.register_route_handler(
            "hello",
            handler_fn(|_req, _res, _args| Ok("hello")),
        );
        assert!(container.has("hello"));
        assert!(container.route_handler("hello").is_some());
        assert!(container.middleware("hello").is_none());
    }
}

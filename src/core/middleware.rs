//! Onion-style middleware stack shared by the App and by every Route.
//!
//! Each layer receives the request, the response and a [`Next`]
//! continuation for the rest of the chain. The owner supplies a fixed
//! [`Kernel`] that runs beneath the last layer. `add` prepends, so for
//! `M1`, `M2` added in that order the call sequence is
//! `M2 -> M1 -> kernel -> M1 -> M2`.
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use crate::{
    core::container::Container,
    error::{Error, Result},
    http::{Request, Response},
};

/// A request/response transformer.
///
/// Returning the response is part of the signature: a layer either forwards
/// through `next` or answers on its own.
pub trait Middleware {
    fn handle(&self, request: Request, response: Response, next: Next<'_>) -> Result<Response>;
}

/// The terminal action beneath a middleware stack.
pub trait Kernel {
    fn call(&self, request: Request, response: Response) -> Result<Response>;
}

/// Continuation into the remaining layers of a stack.
///
/// Consumed by [`Next::run`], so a layer can continue the chain at most once.
pub struct Next<'a> {
    layers: &'a [Rc<dyn Middleware>],
    kernel: &'a dyn Kernel,
}

impl<'a> Next<'a> {
    pub fn new(layers: &'a [Rc<dyn Middleware>], kernel: &'a dyn Kernel) -> Self {
        Self { layers, kernel }
    }

    pub fn run(self, request: Request, response: Response) -> Result<Response> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.handle(request, response, Next::new(rest, self.kernel)),
            None => self.kernel.call(request, response),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.layers.len())
            .finish_non_exhaustive()
    }
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Create a middleware from a closure.
///
/// ```ignore
/// app.add(from_fn(|req, mut res, next| {
///     res.write("In");
///     let mut res = next.run(req, res)?;
///     res.write("Out");
///     Ok(res)
/// }))?;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, Response, Next<'_>) -> Result<Response>,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Response, Next<'_>) -> Result<Response>,
{
    fn handle(&self, request: Request, response: Response, next: Next<'_>) -> Result<Response> {
        (self.f)(request, response, next)
    }
}

/// Middleware registered by name and looked up in the container each time
/// it runs.
pub struct DeferredMiddleware {
    name: String,
    services: Option<Rc<Container>>,
}

impl DeferredMiddleware {
    pub fn new(name: impl Into<String>, services: Option<Rc<Container>>) -> Self {
        Self {
            name: name.into(),
            services,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Middleware for DeferredMiddleware {
    fn handle(&self, request: Request, response: Response, next: Next<'_>) -> Result<Response> {
        let middleware = self
            .services
            .as_ref()
            .and_then(|services| services.middleware(&self.name))
            .ok_or_else(|| Error::UnresolvableCallable(self.name.clone()))?;
        middleware.handle(request, response, next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Unseeded,
    Seeded,
    Running,
}

#[derive(Default)]
pub struct MiddlewareStack {
    layers: RefCell<Vec<Rc<dyn Middleware>>>,
    seeded: Cell<bool>,
    depth: Cell<usize>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a layer. Fails while the stack is running.
    pub fn add(&self, middleware: Rc<dyn Middleware>) -> Result<()> {
        if self.depth.get() > 0 {
            return Err(Error::MiddlewareLocked);
        }
        self.layers.borrow_mut().insert(0, middleware);
        Ok(())
    }

    /// Mark the stack as built. Only allowed once.
    pub fn seed(&self) -> Result<()> {
        if self.seeded.get() {
            return Err(Error::StackAlreadySeeded);
        }
        self.seeded.set(true);
        Ok(())
    }

    pub fn state(&self) -> StackState {
        if self.depth.get() > 0 {
            StackState::Running
        } else if self.seeded.get() {
            StackState::Seeded
        } else {
            StackState::Unseeded
        }
    }

    pub fn len(&self) -> usize {
        self.layers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every layer, then `kernel`.
    pub fn call(&self, request: Request, response: Response, kernel: &dyn Kernel) -> Result<Response> {
        if !self.seeded.get() {
            self.seed()?;
        }
        let layers = self.layers.borrow().clone();
        let _running = Running::enter(&self.depth);
        Next::new(&layers, kernel).run(request, response)
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("layers", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Marks the stack as running for the guard's lifetime, including unwinds.
struct Running<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> Running<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Environment;

    struct Center;

    impl Kernel for Center {
        fn call(&self, _request: Request, mut response: Response) -> Result<Response> {
            response.write("Center");
            Ok(response)
        }
    }

    fn wrap(label: &'static str) -> Rc<dyn Middleware> {
        Rc::new(from_fn(move |req, mut res: Response, next| {
            res.write(format!("In{label}"));
            let mut res = next.run(req, res)?;
            res.write(format!("Out{label}"));
            Ok(res)
        }))
    }

    fn request() -> Request {
        Request::from_environment(&Environment::mock([("REQUEST_URI", "/")]))
    }

    #[test]
    fn test_last_added_runs_outermost() {
        let stack = MiddlewareStack::new();
        stack.add(wrap("1")).unwrap();
        stack.add(wrap("2")).unwrap();

        let response = stack.call(request(), Response::new(), &Center).unwrap();
        assert_eq!(response.body().contents(), "In2In1CenterOut1Out2");
        assert_eq!(stack.state(), StackState::Seeded);
    }

    #[test]
    fn test_seed_only_once() {
        let stack = MiddlewareStack::new();
        assert_eq!(stack.state(), StackState::Unseeded);
        stack.seed().unwrap();
        assert!(matches!(stack.seed(), Err(Error::StackAlreadySeeded)));
    }

    #[test]
    fn test_add_while_running_is_rejected() {
        let stack = Rc::new(MiddlewareStack::new());
        let inner = Rc::clone(&stack);
        stack
            .add(Rc::new(from_fn(move |req, res, next| {
                assert_eq!(inner.state(), StackState::Running);
                match inner.add(wrap("late")) {
                    Err(Error::MiddlewareLocked) => next.run(req, res),
                    other => panic!("expected MiddlewareLocked, got {other:?}"),
                }
            })))
            .unwrap();

        stack.call(request(), Response::new(), &Center).unwrap();
        assert_eq!(stack.state(), StackState::Seeded);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_layer_can_answer_without_next() {
        let stack = MiddlewareStack::new();
        stack
            .add(Rc::new(from_fn(|_req, mut res: Response, _next| {
                res.write("short-circuit");
                Ok(res)
            })))
            .unwrap();
        let response = stack.call(request(), Response::new(), &Center).unwrap();
        assert_eq!(response.body().contents(), "short-circuit");
    }

    #[test]
    fn test_unresolvable_named_middleware() {
        let stack = MiddlewareStack::new();
        stack
            .add(Rc::new(DeferredMiddleware::new("auth", None)))
            .unwrap();
        let err = stack.call(request(), Response::new(), &Center).unwrap_err();
        assert!(matches!(err, Error::UnresolvableCallable(name) if name == "auth"));
    }
}

//! Route handlers and the ways they are invoked.
use std::{fmt, marker::PhantomData, rc::Rc};

use crate::{
    error::Result,
    http::{Request, Response},
    routing::RouteArguments,
};

/// What a handler produced.
#[derive(Debug)]
pub enum Outcome {
    /// Replaces the working response.
    Response(Response),
    /// Appended to the working response body when it is writable.
    Text(String),
    /// Keep the working response as the handler left it.
    Nothing,
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<String> for Outcome {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Outcome {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Nothing
    }
}

/// Route arguments as handed to a handler by the invocation strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerArgs {
    Named(RouteArguments),
    Positional(Vec<String>),
}

impl HandlerArgs {
    /// Look up by name. Positional arguments have no names.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Self::Named(arguments) => arguments.get(name),
            Self::Positional(_) => None,
        }
    }

    pub fn nth(&self, index: usize) -> Option<&str> {
        match self {
            Self::Named(arguments) => arguments.iter().nth(index).map(|(_, v)| v),
            Self::Positional(values) => values.get(index).map(String::as_str),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Named(arguments) => arguments.len(),
            Self::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A route endpoint.
pub trait RouteHandler {
    fn call(&self, request: &Request, response: &mut Response, args: &HandlerArgs) -> Result<Outcome>;
}

/// Adapter turning a closure into a [`RouteHandler`].
pub struct HandlerFn<F, O> {
    f: F,
    _outcome: PhantomData<fn() -> O>,
}

/// Wrap a closure as a route handler.
///
/// ```ignore
/// app.get("/hello/{name}", handler_fn(|_req, res, args| {
///     res.write(format!("Hello {}", args.get("name").unwrap_or("world")));
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F, O>(f: F) -> HandlerFn<F, O>
where
    F: Fn(&Request, &mut Response, &HandlerArgs) -> Result<O>,
    O: Into<Outcome>,
{
    HandlerFn {
        f,
        _outcome: PhantomData,
    }
}

impl<F, O> RouteHandler for HandlerFn<F, O>
where
    F: Fn(&Request, &mut Response, &HandlerArgs) -> Result<O>,
    O: Into<Outcome>,
{
    fn call(&self, request: &Request, response: &mut Response, args: &HandlerArgs) -> Result<Outcome> {
        (self.f)(request, response, args).map(Into::into)
    }
}

/// A late-bound reference to something invokable: either a name looked up in
/// the service container at call time, or the value itself.
pub enum Callable<T: ?Sized> {
    Service(String),
    Handler(Rc<T>),
}

impl<T: ?Sized> Clone for Callable<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Service(name) => Self::Service(name.clone()),
            Self::Handler(handler) => Self::Handler(Rc::clone(handler)),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Callable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => f.debug_tuple("Service").field(name).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl<T: ?Sized> From<&str> for Callable<T> {
    fn from(name: &str) -> Self {
        Self::Service(name.to_string())
    }
}

impl<T: ?Sized> From<String> for Callable<T> {
    fn from(name: String) -> Self {
        Self::Service(name)
    }
}

impl<F, O> From<HandlerFn<F, O>> for Callable<dyn RouteHandler>
where
    F: Fn(&Request, &mut Response, &HandlerArgs) -> Result<O> + 'static,
    O: Into<Outcome> + 'static,
{
    fn from(handler: HandlerFn<F, O>) -> Self {
        Self::Handler(Rc::new(handler))
    }
}

impl From<Rc<dyn RouteHandler>> for Callable<dyn RouteHandler> {
    fn from(handler: Rc<dyn RouteHandler>) -> Self {
        Self::Handler(handler)
    }
}

/// How the route arguments reach the handler.
pub trait InvocationStrategy {
    fn invoke(
        &self,
        handler: &dyn RouteHandler,
        request: &Request,
        response: &mut Response,
        arguments: &RouteArguments,
    ) -> Result<Outcome>;
}

/// Arguments passed by name. This is the default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestResponse;

impl InvocationStrategy for RequestResponse {
    fn invoke(
        &self,
        handler: &dyn RouteHandler,
        request: &Request,
        response: &mut Response,
        arguments: &RouteArguments,
    ) -> Result<Outcome> {
        handler.call(request, response, &HandlerArgs::Named(arguments.clone()))
    }
}

/// Argument values passed in order, without names.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestResponseArgs;

impl InvocationStrategy for RequestResponseArgs {
    fn invoke(
        &self,
        handler: &dyn RouteHandler,
        request: &Request,
        response: &mut Response,
        arguments: &RouteArguments,
    ) -> Result<Outcome> {
        handler.call(request, response, &HandlerArgs::Positional(arguments.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Environment;

    fn echo_args() -> HandlerFn<impl Fn(&Request, &mut Response, &HandlerArgs) -> Result<String>, String> {
        handler_fn(|_req: &Request, _res: &mut Response, args: &HandlerArgs| {
            Ok(format!(
                "{}:{}:{}",
                args.len(),
                args.get("second").unwrap_or("-"),
                args.nth(1).unwrap_or("-")
            ))
        })
    }

    fn run(strategy: &dyn InvocationStrategy) -> Outcome {
        let request = Request::from_environment(&Environment::mock([("REQUEST_URI", "/")]));
        let mut response = Response::new();
        let arguments = RouteArguments::from([("first", "a"), ("second", "b")]);
        strategy
            .invoke(&echo_args(), &request, &mut response, &arguments)
            .unwrap()
    }

    #[test]
    fn test_named_strategy() {
        match run(&RequestResponse) {
            Outcome::Text(text) => assert_eq!(text, "2:b:b"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_positional_strategy() {
        match run(&RequestResponseArgs) {
            Outcome::Text(text) => assert_eq!(text, "2:-:b"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_callable_from_name() {
        let callable: Callable<dyn RouteHandler> = "hello".into();
        assert!(matches!(callable, Callable::Service(name) if name == "hello"));
    }
}

//! A single endpoint: methods, pattern, handler and its own middleware.
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        container::Container,
        middleware::{DeferredMiddleware, Kernel, Middleware, MiddlewareStack},
    },
    error::{Error, Result},
    http::{Body, Request, Response},
    output::OutputCapture,
    routing::{
        Callable, InvocationStrategy, Outcome, RequestResponse, RouteArguments, RouteGroup,
        RouteHandler,
    },
    tracing_setup::create_route_span,
};

/// How output echoed by a handler is merged into the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputBuffering {
    /// Not captured: echoed output goes straight to the process stdout.
    None,
    /// Captured output is placed before the body.
    Prepend,
    /// Captured output is written after the body.
    #[default]
    Append,
}

impl FromStr for OutputBuffering {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "none" => Ok(Self::None),
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            other => Err(Error::InvalidOutputBuffering(other.to_string())),
        }
    }
}

impl fmt::Display for OutputBuffering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Prepend => "prepend",
            Self::Append => "append",
        })
    }
}

pub struct Route {
    identifier: String,
    methods: Vec<String>,
    pattern: RefCell<String>,
    callable: RefCell<Callable<dyn RouteHandler>>,
    groups: Vec<Rc<RouteGroup>>,
    middleware: RefCell<Vec<Rc<dyn Middleware>>>,
    name: RefCell<Option<String>>,
    arguments: RefCell<RouteArguments>,
    output_buffering: Cell<OutputBuffering>,
    finalized: Cell<bool>,
    stack: MiddlewareStack,
    services: RefCell<Option<Rc<Container>>>,
}

impl Route {
    pub fn new(
        methods: Vec<String>,
        pattern: impl Into<String>,
        callable: Callable<dyn RouteHandler>,
        groups: Vec<Rc<RouteGroup>>,
        identifier: usize,
    ) -> Self {
        Self {
            identifier: format!("route{identifier}"),
            methods,
            pattern: RefCell::new(pattern.into()),
            callable: RefCell::new(callable),
            groups,
            middleware: RefCell::new(Vec::new()),
            name: RefCell::new(None),
            arguments: RefCell::new(RouteArguments::new()),
            output_buffering: Cell::new(OutputBuffering::default()),
            finalized: Cell::new(false),
            stack: MiddlewareStack::new(),
            services: RefCell::new(None),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn pattern(&self) -> String {
        self.pattern.borrow().clone()
    }

    pub fn set_pattern(&self, pattern: impl Into<String>) {
        *self.pattern.borrow_mut() = pattern.into();
    }

    pub fn callable(&self) -> Callable<dyn RouteHandler> {
        self.callable.borrow().clone()
    }

    pub fn set_callable(&self, callable: impl Into<Callable<dyn RouteHandler>>) {
        *self.callable.borrow_mut() = callable.into();
    }

    /// Owning groups, outermost first.
    pub fn groups(&self) -> &[Rc<RouteGroup>] {
        &self.groups
    }

    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) -> &Self {
        *self.name.borrow_mut() = Some(name.into());
        self
    }

    pub fn set_argument(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.arguments.borrow_mut().insert(name, value);
        self
    }

    /// Replace all arguments.
    pub fn set_arguments(&self, arguments: impl Into<RouteArguments>) -> &Self {
        *self.arguments.borrow_mut() = arguments.into();
        self
    }

    pub fn arguments(&self) -> RouteArguments {
        self.arguments.borrow().clone()
    }

    pub fn argument(&self, name: &str, default: Option<&str>) -> Option<String> {
        self.arguments
            .borrow()
            .get(name)
            .or(default)
            .map(str::to_string)
    }

    pub fn output_buffering(&self) -> OutputBuffering {
        self.output_buffering.get()
    }

    pub fn set_output_buffering(&self, mode: OutputBuffering) -> &Self {
        self.output_buffering.set(mode);
        self
    }

    /// Set the buffering mode from its textual name.
    pub fn set_output_buffering_str(&self, mode: &str) -> Result<&Self> {
        Ok(self.set_output_buffering(mode.parse()?))
    }

    /// Container used to resolve named handlers, middleware and the
    /// invocation strategy.
    pub fn set_services(&self, services: Rc<Container>) {
        *self.services.borrow_mut() = Some(services);
    }

    /// Add route middleware. Before the route is finalized the middleware is
    /// queued; afterwards it goes straight onto the stack.
    pub fn add(&self, middleware: impl Middleware + 'static) -> Result<&Self> {
        self.push_middleware(Rc::new(middleware))?;
        Ok(self)
    }

    /// Add middleware registered in the container under `name`.
    pub fn add_service(&self, name: impl Into<String>) -> Result<&Self> {
        let services = self.services.borrow().clone();
        self.push_middleware(Rc::new(DeferredMiddleware::new(name, services)))?;
        Ok(self)
    }

    fn push_middleware(&self, middleware: Rc<dyn Middleware>) -> Result<()> {
        if self.finalized.get() {
            self.stack.add(middleware)
        } else {
            self.middleware.borrow_mut().push(middleware);
            Ok(())
        }
    }

    /// Merge group and route middleware into the stack. Runs once.
    pub fn finalize(&self) -> Result<()> {
        if self.finalized.get() {
            return Ok(());
        }

        let mut group_middleware: Vec<Rc<dyn Middleware>> = Vec::new();
        for group in &self.groups {
            let mut merged = group.middleware();
            merged.append(&mut group_middleware);
            group_middleware = merged;
        }

        let mut middleware = self.middleware.borrow_mut();
        middleware.append(&mut group_middleware);
        for layer in middleware.iter() {
            self.stack.add(Rc::clone(layer))?;
        }
        drop(middleware);

        self.stack.seed()?;
        self.finalized.set(true);
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }

    /// Merge arguments captured from the request path.
    pub fn prepare(&self, arguments: &RouteArguments) {
        self.arguments.borrow_mut().merge(arguments);
    }

    /// Finalize, then run the route middleware with the handler at the
    /// bottom.
    pub fn run(&self, request: Request, response: Response) -> Result<Response> {
        self.finalize()?;
        let _span = create_route_span(&self.identifier, &self.pattern()).entered();
        self.stack.call(request, response, self)
    }

    /// Call the handler.
    pub fn invoke(&self, request: Request, mut response: Response) -> Result<Response> {
        let handler = self.resolve_handler()?;
        let services = self.services.borrow().clone();
        let strategy: Rc<dyn InvocationStrategy> = match &services {
            Some(services) => services.found_handler(),
            None => Rc::new(RequestResponse),
        };
        let arguments = self.arguments();
        let mode = self.output_buffering.get();

        let (outcome, output) = match mode {
            OutputBuffering::None => {
                let outcome = strategy.invoke(handler.as_ref(), &request, &mut response, &arguments)?;
                (outcome, String::new())
            }
            OutputBuffering::Prepend | OutputBuffering::Append => {
                let capture = OutputCapture::start();
                let outcome = strategy.invoke(handler.as_ref(), &request, &mut response, &arguments)?;
                (outcome, capture.finish())
            }
        };

        match outcome {
            Outcome::Response(replacement) => response = replacement,
            Outcome::Text(text) => {
                if response.body().is_writable() {
                    response.write(text);
                }
            }
            Outcome::Nothing => {}
        }

        if !output.is_empty() && response.body().is_writable() {
            match mode {
                OutputBuffering::Prepend => {
                    let mut body = Body::new();
                    body.write(output);
                    body.write(response.body().as_bytes());
                    response = response.with_body(body);
                }
                OutputBuffering::Append => {
                    response.write(output);
                }
                OutputBuffering::None => {}
            }
        }

        Ok(response)
    }

    fn resolve_handler(&self) -> Result<Rc<dyn RouteHandler>> {
        match &*self.callable.borrow() {
            Callable::Handler(handler) => Ok(Rc::clone(handler)),
            Callable::Service(name) => self
                .services
                .borrow()
                .as_ref()
                .and_then(|services| services.route_handler(name))
                .ok_or_else(|| Error::UnresolvableCallable(name.clone())),
        }
    }
}

impl Kernel for Route {
    fn call(&self, request: Request, response: Response) -> Result<Response> {
        self.invoke(request, response)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("identifier", &self.identifier)
            .field("methods", &self.methods)
            .field("pattern", &*self.pattern.borrow())
            .field("name", &*self.name.borrow())
            .field("arguments", &*self.arguments.borrow())
            .field("output_buffering", &self.output_buffering.get())
            .field("finalized", &self.finalized.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::middleware::from_fn,
        http::Environment,
        output::echo,
        routing::handler_fn,
    };

    fn request() -> Request {
        Request::from_environment(&Environment::mock([("REQUEST_URI", "/")]))
    }

    fn route(callable: Callable<dyn RouteHandler>) -> Route {
        Route::new(vec!["GET".to_string()], "/", callable, Vec::new(), 0)
    }

    fn wrap(label: &'static str) -> impl Middleware {
        from_fn(move |req, mut res: Response, next| {
            res.write(format!("In{label}"));
            let mut res = next.run(req, res)?;
            res.write(format!("Out{label}"));
            Ok(res)
        })
    }

    #[test]
    fn test_identifier_and_methods() {
        let route = Route::new(
            vec!["GET".to_string(), "POST".to_string()],
            "/hello",
            "handler".into(),
            Vec::new(),
            7,
        );
        assert_eq!(route.identifier(), "route7");
        assert_eq!(route.methods(), ["GET", "POST"]);
    }

    #[test]
    fn test_middleware_order() {
        let route = route(handler_fn(|_req, res, _args| {
            res.write("Center");
            Ok(())
        }).into());
        route.add(wrap("1")).unwrap().add(wrap("2")).unwrap();

        let response = route.run(request(), Response::new()).unwrap();
        assert_eq!(response.body().contents(), "In2In1CenterOut1Out2");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let route = route(handler_fn(|_req, _res, _args| Ok("x")).into());
        route.add(wrap("1")).unwrap();
        route.finalize().unwrap();
        route.finalize().unwrap();

        let response = route.run(request(), Response::new()).unwrap();
        assert_eq!(response.body().contents(), "In1xOut1");
    }

    #[test]
    fn test_add_after_finalize_goes_to_stack() {
        let route = route(handler_fn(|_req, _res, _args| Ok("x")).into());
        route.finalize().unwrap();
        route.add(wrap("late")).unwrap();

        let response = route.run(request(), Response::new()).unwrap();
        assert_eq!(response.body().contents(), "InlatexOutlate");
    }

    #[test]
    fn test_output_buffering_modes() {
        let cases = [
            (OutputBuffering::Append, "barfoo"),
            (OutputBuffering::Prepend, "foobar"),
        ];
        for (mode, expected) in cases {
            let route = route(handler_fn(|_req, res, _args| {
                echo("foo");
                res.write("bar");
                Ok(())
            }).into());
            route.set_output_buffering(mode);

            let response = route.invoke(request(), Response::new()).unwrap();
            assert_eq!(response.body().contents(), expected, "{mode}");
        }
    }

    #[test]
    fn test_failed_handler_discards_capture() {
        let route = route(handler_fn(|_req, _res, _args| -> Result<()> {
            echo("partial");
            Err(Error::application("handler failed"))
        }).into());

        let err = route.invoke(request(), Response::new()).unwrap_err();
        assert_eq!(err.to_string(), "handler failed");
        assert_eq!(crate::output::depth(), 0);
    }

    #[test]
    fn test_returned_response_replaces_working_response() {
        let route = route(handler_fn(|_req, res, _args| {
            res.write("ignored");
            Ok(Response::new().with_status(http::StatusCode::CREATED))
        }).into());

        let response = route.invoke(request(), Response::new()).unwrap();
        assert_eq!(response.status(), http::StatusCode::CREATED);
        assert_eq!(response.body().contents(), "");
    }

    #[test]
    fn test_unresolvable_named_handler() {
        let route = route("missing".into());
        let err = route.invoke(request(), Response::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvableCallable(name) if name == "missing"));
    }

    #[test]
    fn test_named_handler_resolved_through_container() {
        let services = Rc::new(Container::empty());
        services.register_route_handler("hello", handler_fn(|_req, _res, args| {
            Ok(format!("Hello {}", args.get("name").unwrap_or("nobody")))
        }));
        let route = route("hello".into());
        route.set_services(services);
        route.set_argument("name", "world");

        let response = route.invoke(request(), Response::new()).unwrap();
        assert_eq!(response.body().contents(), "Hello world");
    }

    #[test]
    fn test_arguments() {
        let route = route("handler".into());
        route.set_arguments([("extra", "there"), ("name", "world!")]);
        route.prepare(&RouteArguments::from([("name", "test!")]));

        assert_eq!(route.argument("name", None).as_deref(), Some("test!"));
        assert_eq!(route.argument("extra", None).as_deref(), Some("there"));
        assert_eq!(route.argument("missing", Some("fallback")).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_output_buffering_from_str() {
        assert_eq!("prepend".parse::<OutputBuffering>().unwrap(), OutputBuffering::Prepend);
        assert!(matches!(
            Route::new(Vec::new(), "/", "h".into(), Vec::new(), 0).set_output_buffering_str("invalid"),
            Err(Error::InvalidOutputBuffering(mode)) if mode == "invalid"
        ));
    }
}

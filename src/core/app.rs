//! The application: route registration and the request lifecycle.
//!
//! A request passes through [`App::process`]:
//!
//! 1. the router base path is taken from the request URI;
//! 2. with `determine_route_before_app_middleware` the router is dispatched
//!    up front so middleware can see the matched route;
//! 3. the App middleware runs, with the dispatch kernel at the bottom;
//! 4. failures are turned into responses by the handlers in the
//!    [`Container`], or returned when no handler is registered;
//! 5. the response is finalized.
//!
//! The App is single threaded (`Rc`/`RefCell` inside). Hosts that serve
//! requests concurrently build one App per request.
use std::{
    any::Any,
    cell::{Ref, RefCell, RefMut},
    collections::BTreeMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use http::{HeaderMap, HeaderValue, header};
use serde_json::Value;

use crate::{
    config::Settings,
    core::{
        container::Container,
        middleware::{DeferredMiddleware, Kernel, Middleware, MiddlewareStack},
    },
    error::{Error, Result},
    http::{Body, Environment, Request, Response, Uri},
    output,
    ports::emitter::{ResponseEmitter, ResponseHead},
    routing::{Callable, Dispatch, Route, RouteArguments, RouteGroup, RouteHandler, RouteInfo, Router},
    tracing_setup::create_request_span,
};

/// Methods registered by [`App::any`].
const ANY_METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

pub struct App {
    settings: Settings,
    container: Rc<Container>,
    router: RefCell<Router>,
    stack: MiddlewareStack,
    environment: Environment,
}

impl App {
    /// App with the default handlers.
    pub fn new(settings: Settings) -> Result<Self> {
        let container = Container::new(&settings);
        Self::with_container(settings, container)
    }

    /// App using `container` for handlers and named services.
    pub fn with_container(settings: Settings, container: Container) -> Result<Self> {
        let mut router = Router::new();
        router.set_cache_file(settings.router_cache_file.clone())?;

        Ok(Self {
            settings,
            container: Rc::new(container),
            router: RefCell::new(router),
            stack: MiddlewareStack::new(),
            environment: Environment::mock(std::iter::empty::<(String, String)>()),
        })
    }

    /// Server parameters [`App::run`] and [`App::sub_request`] build requests
    /// from.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn container(&self) -> &Rc<Container> {
        &self.container
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn router(&self) -> Ref<'_, Router> {
        self.router.borrow()
    }

    pub fn router_mut(&self) -> RefMut<'_, Router> {
        self.router.borrow_mut()
    }

    /********************************************************************************
     * Router proxy methods
     *******************************************************************************/

    pub fn get(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["GET"], pattern, handler)
    }

    pub fn post(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["POST"], pattern, handler)
    }

    pub fn put(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["PUT"], pattern, handler)
    }

    pub fn patch(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["PATCH"], pattern, handler)
    }

    pub fn delete(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["DELETE"], pattern, handler)
    }

    pub fn options(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&["OPTIONS"], pattern, handler)
    }

    pub fn any(&self, pattern: &str, handler: impl Into<Callable<dyn RouteHandler>>) -> Rc<Route> {
        self.map(&ANY_METHODS, pattern, handler)
    }

    pub fn map(
        &self,
        methods: &[&str],
        pattern: &str,
        handler: impl Into<Callable<dyn RouteHandler>>,
    ) -> Rc<Route> {
        let route = self
            .router
            .borrow_mut()
            .map(methods, pattern, handler.into());
        route.set_services(Rc::clone(&self.container));
        route.set_output_buffering(self.settings.output_buffering);
        route
    }

    /// Register a group. `body` runs immediately with the group open, so the
    /// routes it maps inherit the group pattern and middleware. The group is
    /// closed again however `body` exits.
    pub fn group<F>(&self, pattern: &str, body: F) -> Result<Rc<RouteGroup>>
    where
        F: Fn(&App) -> Result<()> + 'static,
    {
        let group = self.router.borrow_mut().push_group(
            pattern,
            Rc::new(body),
            Some(Rc::clone(&self.container)),
        );
        let _scope = GroupScope {
            router: &self.router,
        };
        group.invoke(self)?;
        Ok(group)
    }

    /********************************************************************************
     * Middleware
     *******************************************************************************/

    /// Add App middleware. The last added runs first.
    pub fn add(&self, middleware: impl Middleware + 'static) -> Result<&Self> {
        self.stack.add(Rc::new(middleware))?;
        Ok(self)
    }

    /// Add App middleware registered in the container under `name`.
    pub fn add_service(&self, name: impl Into<String>) -> Result<&Self> {
        self.stack.add(Rc::new(DeferredMiddleware::new(
            name,
            Some(Rc::clone(&self.container)),
        )))?;
        Ok(self)
    }

    /********************************************************************************
     * Extensions
     *******************************************************************************/

    pub fn register_extension<F>(&self, name: impl Into<String>, extension: F)
    where
        F: Fn(&App, &[Value]) -> Result<Value> + 'static,
    {
        self.container.register_extension(name, extension);
    }

    /// Call a named extension with `args`.
    pub fn invoke_extension(&self, name: &str, args: &[Value]) -> Result<Value> {
        let extension = self
            .container
            .extension(name)
            .ok_or_else(|| Error::UnknownExtension(name.to_string()))?;
        extension.invoke(self, args)
    }

    /********************************************************************************
     * Runner
     *******************************************************************************/

    /// Process the request described by the environment and, when an emitter
    /// is given, send the response through it.
    pub fn run(&self, emitter: Option<&mut dyn ResponseEmitter>) -> Result<Response> {
        let request = Request::from_environment(&self.environment);
        let mut response = self.process(request, self.response_template())?;
        if let Some(emitter) = emitter {
            self.respond(&mut response, emitter)?;
        }
        Ok(response)
    }

    /// Empty response carrying the default content type and the configured
    /// protocol version.
    pub fn response_template(&self) -> Response {
        Response::new()
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=UTF-8"),
            )
            .with_protocol_version(self.settings.http_version.clone())
    }

    /// Run `request` through the App middleware and the router, translating
    /// failures into responses, then finalize.
    pub fn process(&self, request: Request, response: Response) -> Result<Response> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = create_request_span(request.method(), request.uri().path(), &request_id);
        let _entered = span.enter();

        self.router
            .borrow_mut()
            .set_base_path(request.uri().base_path());

        if !request.has_valid_method() {
            return self.process_invalid_method(request, response);
        }

        let request = if self.settings.determine_route_before_app_middleware {
            self.dispatch_router_and_prepare_route(request)?
        } else {
            request
        };

        let fallback_request = request.clone();
        let fallback_response = response.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.stack.call(request, response, self)
        }));

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.handle_error(error, &fallback_request, fallback_response)?,
            Err(payload) => {
                let fault = Error::RuntimeFault(panic_message(payload.as_ref()));
                self.handle_error(fault, &fallback_request, fallback_response)?
            }
        };

        let response = self.finalize(response)?;
        span.record("http.status_code", response.status().as_u16());
        Ok(response)
    }

    /// Requests whose method is not a valid token skip the middleware and
    /// only find out whether the path exists.
    fn process_invalid_method(&self, request: Request, response: Response) -> Result<Response> {
        tracing::warn!(method = %request.method(), "Request with invalid method token");
        let method = request.method().to_string();
        let request = self.dispatch_router_and_prepare_route(request)?;

        let response = match request.route_info().map(RouteInfo::dispatch) {
            Some(Dispatch::MethodNotAllowed { allowed }) => {
                let error = Error::MethodNotAllowed {
                    allowed: allowed.clone(),
                };
                self.handle_error(error, &request, response)?
            }
            _ => match self.container.not_found_handler() {
                Some(handler) => handler.handle(&request, response)?,
                None => return Err(Error::InvalidMethod(method)),
            },
        };
        self.finalize(response)
    }

    /// Route an error to its handler, or return it when none is registered.
    fn handle_error(&self, error: Error, request: &Request, response: Response) -> Result<Response> {
        match error {
            Error::Halt(response) => Ok(*response),
            Error::NotFound => match self.container.not_found_handler() {
                Some(handler) => handler.handle(request, response),
                None => Err(Error::NotFound),
            },
            Error::MethodNotAllowed { allowed } => match self.container.not_allowed_handler() {
                Some(handler) => handler.handle(request, response, &allowed),
                None => Err(Error::MethodNotAllowed { allowed }),
            },
            error @ Error::RuntimeFault(_) => match self.container.runtime_fault_handler() {
                Some(handler) => handler.handle(request, response, &error),
                None => Err(error),
            },
            error if error.is_usage_error() => Err(error),
            error => match self.container.error_handler() {
                Some(handler) => handler.handle(request, response, &error),
                None => Err(error),
            },
        }
    }

    /// The dispatch kernel beneath the App middleware.
    ///
    /// Re-dispatches unless the request carries route info computed for the
    /// same method and URI.
    pub fn handle(&self, request: Request, response: Response) -> Result<Response> {
        let fingerprint = request.fingerprint();
        let request = match request.route_info() {
            Some(info) if info.matches(&fingerprint) => request,
            _ => self.dispatch_router_and_prepare_route(request)?,
        };

        let dispatch = request
            .route_info()
            .map(|info| info.dispatch().clone())
            .unwrap_or(Dispatch::NotFound);

        match dispatch {
            Dispatch::Found { identifier, .. } => {
                let route = self.router.borrow().lookup_route(&identifier)?;
                route.run(request, response)
            }
            Dispatch::MethodNotAllowed { allowed } => match self.container.not_allowed_handler() {
                Some(handler) => handler.handle(&request, response, &allowed),
                None => Err(Error::MethodNotAllowed { allowed }),
            },
            Dispatch::NotFound => match self.container.not_found_handler() {
                Some(handler) => handler.handle(&request, response),
                None => Err(Error::NotFound),
            },
        }
    }

    /// Dispatch the router and attach the result to the request. On a match
    /// the url-decoded arguments are merged into the route and the route is
    /// attached too.
    fn dispatch_router_and_prepare_route(&self, request: Request) -> Result<Request> {
        let dispatch = self.router.borrow_mut().dispatch(&request)?;

        let mut request = request;
        if let Dispatch::Found {
            identifier,
            arguments,
        } = &dispatch
        {
            let decoded: RouteArguments = arguments
                .iter()
                .map(|(name, value)| (name, url_decode(value)))
                .collect();
            let route = self.router.borrow().lookup_route(identifier)?;
            route.prepare(&decoded);
            request = request.with_route(route);
        }

        let (method, uri) = request.fingerprint();
        Ok(request.with_route_info(RouteInfo::new(dispatch, method, uri)))
    }

    /// Adjust headers before the response leaves the App.
    ///
    /// Bodiless statuses lose `Content-Type` and `Content-Length`. Otherwise,
    /// with `add_content_length_header`, `Content-Length` is set from the
    /// body size unless present; stray captured output at this point is an
    /// error.
    pub fn finalize(&self, response: Response) -> Result<Response> {
        if response.is_empty() {
            return Ok(response
                .without_header(header::CONTENT_TYPE)
                .without_header(header::CONTENT_LENGTH));
        }

        if !self.settings.add_content_length_header {
            return Ok(response);
        }
        if output::buffered_len() > 0 {
            return Err(Error::OutputBufferConflict);
        }
        match response.body().size() {
            Some(size) if !response.has_header(header::CONTENT_LENGTH) => {
                Ok(response.with_header(header::CONTENT_LENGTH, HeaderValue::from(size)))
            }
            _ => Ok(response),
        }
    }

    /// Send `response` through `emitter` in `response_chunk_size` chunks.
    ///
    /// The head is skipped when already sent and the body for bodiless
    /// statuses. A known `Content-Length` (or body size) caps the bytes sent.
    /// Emission stops as soon as the emitter reports the peer gone.
    pub fn respond(&self, response: &mut Response, emitter: &mut dyn ResponseEmitter) -> Result<()> {
        if !emitter.headers_sent() {
            emitter.send_head(&ResponseHead::from_response(response))?;
        }
        if response.is_empty() {
            return Ok(());
        }

        let chunk_size = self.settings.response_chunk_size.max(1);
        let content_length = response
            .header_line(header::CONTENT_LENGTH)
            .parse::<usize>()
            .ok()
            .filter(|length| *length > 0)
            .or_else(|| response.body().size());

        let body = response.body_mut();
        if body.is_seekable() {
            body.rewind();
        }

        match content_length {
            Some(mut remaining) => {
                while remaining > 0 && !body.eof() {
                    let data = body.read(chunk_size.min(remaining));
                    if data.is_empty() {
                        break;
                    }
                    emitter.write_chunk(&data)?;
                    remaining -= data.len();
                    if !emitter.is_connected() {
                        tracing::debug!("Client disconnected, {} bytes not sent", remaining);
                        break;
                    }
                }
            }
            None => {
                while !body.eof() {
                    let data = body.read(chunk_size);
                    if data.is_empty() {
                        break;
                    }
                    emitter.write_chunk(&data)?;
                    if !emitter.is_connected() {
                        tracing::debug!("Client disconnected before end of stream");
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Run an internal request through the router, bypassing the App
    /// middleware and the transport.
    #[allow(clippy::too_many_arguments)]
    pub fn sub_request(
        &self,
        method: &str,
        path: &str,
        query: &str,
        headers: HeaderMap,
        cookies: BTreeMap<String, String>,
        body: &str,
        response: Option<Response>,
    ) -> Result<Response> {
        let uri = Uri::from_environment(&self.environment)
            .with_path(path)
            .with_query(query);
        let request = Request::new(method, uri, headers, Body::from(body))
            .with_cookies(cookies)
            .with_server_params(self.environment.all().clone());
        let response = response.unwrap_or_else(|| self.response_template());
        self.handle(request, response)
    }
}

impl Kernel for App {
    fn call(&self, request: Request, response: Response) -> Result<Response> {
        self.handle(request, response)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("router", &self.router)
            .field("middleware", &self.stack)
            .finish_non_exhaustive()
    }
}

/// Closes the innermost group when dropped.
struct GroupScope<'a> {
    router: &'a RefCell<Router>,
}

impl Drop for GroupScope<'_> {
    fn drop(&mut self) {
        match self.router.try_borrow_mut() {
            Ok(mut router) => {
                router.pop_group();
            }
            Err(_) => tracing::error!("Router busy while closing a route group"),
        }
    }
}

/// Decode `%XX` escapes and `+`. Invalid UTF-8 leaves the value as is.
fn url_decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

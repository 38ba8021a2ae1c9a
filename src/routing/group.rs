use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    core::{
        app::App,
        container::Container,
        middleware::{DeferredMiddleware, Middleware},
    },
    error::Result,
};

/// Registration body of a group, run with the live App while the group is
/// open.
pub trait GroupBody {
    fn register(&self, app: &App) -> Result<()>;
}

impl<F> GroupBody for F
where
    F: Fn(&App) -> Result<()>,
{
    fn register(&self, app: &App) -> Result<()> {
        self(app)
    }
}

/// A pattern prefix and middleware shared by every route registered inside
/// it. Routes hold on to their groups, so middleware added to a group after
/// its body ran still applies when those routes finalize.
pub struct RouteGroup {
    pattern: String,
    body: Rc<dyn GroupBody>,
    middleware: RefCell<Vec<Rc<dyn Middleware>>>,
    services: Option<Rc<Container>>,
}

impl RouteGroup {
    pub fn new(pattern: impl Into<String>, body: Rc<dyn GroupBody>, services: Option<Rc<Container>>) -> Self {
        Self {
            pattern: pattern.into(),
            body,
            middleware: RefCell::new(Vec::new()),
            services,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Group middleware in registration order.
    pub fn middleware(&self) -> Vec<Rc<dyn Middleware>> {
        self.middleware.borrow().clone()
    }

    pub fn add(&self, middleware: impl Middleware + 'static) -> &Self {
        self.middleware.borrow_mut().push(Rc::new(middleware));
        self
    }

    /// Add middleware registered in the container under `name`.
    pub fn add_service(&self, name: impl Into<String>) -> &Self {
        self.middleware
            .borrow_mut()
            .push(Rc::new(DeferredMiddleware::new(name, self.services.clone())));
        self
    }

    /// Run the registration body against `app`.
    pub fn invoke(&self, app: &App) -> Result<()> {
        self.body.register(app)
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup")
            .field("pattern", &self.pattern)
            .field("middleware", &self.middleware.borrow().len())
            .finish_non_exhaustive()
    }
}

//! Route registry, request resolution and reverse routing.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    core::container::Container,
    error::{Error, Result},
    http::Request,
    routing::{
        Callable, Dispatch, DispatchData, Dispatcher, GroupBody, Route, RouteGroup, RouteHandler,
        dispatcher::cache_dir,
        pattern::{self, Segment},
    },
};

#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<String, Rc<Route>>,
    order: Vec<String>,
    groups: Vec<Rc<RouteGroup>>,
    counter: usize,
    base_path: String,
    cache_file: Option<PathBuf>,
    dispatcher: Option<Dispatcher>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route for `methods`, prefixed by every open group pattern.
    ///
    /// Patterns are concatenated verbatim: a group `/` around a route `/bar`
    /// yields `//bar`. A pattern that cannot compile is logged here and
    /// surfaces as an error on the first dispatch.
    pub fn map(
        &mut self,
        methods: &[&str],
        pattern: &str,
        handler: Callable<dyn RouteHandler>,
    ) -> Rc<Route> {
        let mut full_pattern: String = self.groups.iter().map(|g| g.pattern()).collect();
        full_pattern.push_str(pattern);
        if let Err(e) = pattern::validate(&full_pattern) {
            tracing::error!(pattern = %full_pattern, error = %e, "Route pattern will fail at dispatch");
        }
        let methods = methods.iter().map(|m| m.to_uppercase()).collect();

        let route = Rc::new(Route::new(
            methods,
            full_pattern,
            handler,
            self.groups.clone(),
            self.counter,
        ));
        self.counter += 1;

        let identifier = route.identifier().to_string();
        tracing::debug!(identifier = %identifier, pattern = %route.pattern(), "Mapped route");
        self.order.push(identifier.clone());
        self.routes.insert(identifier, Rc::clone(&route));
        route
    }

    /// Open a group. Routes mapped until the matching [`Router::pop_group`]
    /// are prefixed with its pattern and carry its middleware.
    pub fn push_group(
        &mut self,
        pattern: impl Into<String>,
        body: Rc<dyn GroupBody>,
        services: Option<Rc<Container>>,
    ) -> Rc<RouteGroup> {
        let group = Rc::new(RouteGroup::new(pattern, body, services));
        self.groups.push(Rc::clone(&group));
        group
    }

    /// Close the innermost group. `None` when no group is open.
    pub fn pop_group(&mut self) -> Option<Rc<RouteGroup>> {
        self.groups.pop()
    }

    pub fn open_groups(&self) -> &[Rc<RouteGroup>] {
        &self.groups
    }

    /// Match `request` against the route table.
    pub fn dispatch(&mut self, request: &Request) -> Result<Dispatch> {
        let path = format!("/{}", request.uri().path().trim_start_matches('/'));
        let method = request.method().to_string();
        let dispatch = self.create_dispatcher()?.dispatch(&method, &path);
        tracing::debug!(method = %method, path = %path, result = ?dispatch, "Dispatched request");
        Ok(dispatch)
    }

    /// The compiled matcher. Built from the routes registered at the time of
    /// the first call and reused afterwards, so later routes are not seen.
    pub fn create_dispatcher(&mut self) -> Result<&Dispatcher> {
        let dispatcher = match self.dispatcher.take() {
            Some(dispatcher) => dispatcher,
            None => self.build_dispatcher()?,
        };
        let dispatcher: &Dispatcher = self.dispatcher.insert(dispatcher);
        Ok(dispatcher)
    }

    fn build_dispatcher(&self) -> Result<Dispatcher> {
        if let Some(path) = &self.cache_file {
            if let Some(data) = DispatchData::read_from(path)? {
                tracing::debug!("Loaded route table from {}", path.display());
                return Dispatcher::new(data);
            }
        }

        let mut data = DispatchData::default();
        for route in self.routes() {
            data.add_route(route.methods(), &route.pattern(), route.identifier())?;
        }

        if let Some(path) = &self.cache_file {
            data.write_to(path)?;
            tracing::debug!("Wrote route table to {}", path.display());
        }
        Dispatcher::new(data)
    }

    /// Replace the matcher.
    pub fn set_dispatcher(&mut self, dispatcher: Dispatcher) {
        self.dispatcher = Some(dispatcher);
    }

    /// Persist the compiled route table at `path`. The directory must be
    /// writable by this process.
    pub fn set_cache_file(&mut self, path: Option<PathBuf>) -> Result<()> {
        if let Some(path) = &path {
            if !dir_is_writable(path) {
                return Err(Error::CacheFileNotWritable(path.clone()));
            }
        }
        self.cache_file = path;
        Ok(())
    }

    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.as_deref()
    }

    pub fn set_base_path(&mut self, base_path: impl Into<String>) {
        self.base_path = base_path.into();
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Routes in registration order.
    pub fn routes(&self) -> Vec<Rc<Route>> {
        self.order
            .iter()
            .filter_map(|identifier| self.routes.get(identifier).cloned())
            .collect()
    }

    pub fn lookup_route(&self, identifier: &str) -> Result<Rc<Route>> {
        self.routes
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::RouteNotFound(identifier.to_string()))
    }

    pub fn named_route(&self, name: &str) -> Result<Rc<Route>> {
        self.routes()
            .into_iter()
            .find(|route| route.name().as_deref() == Some(name))
            .ok_or_else(|| Error::NamedRouteNotFound(name.to_string()))
    }

    pub fn remove_named_route(&mut self, name: &str) -> Result<()> {
        let route = self.named_route(name)?;
        self.routes.remove(route.identifier());
        self.order.retain(|identifier| identifier != route.identifier());
        Ok(())
    }

    /// Build the path of a named route from placeholder values.
    ///
    /// The most specific alternative of the pattern whose placeholders all
    /// have data wins. Values are inserted verbatim.
    pub fn relative_path_for(
        &self,
        name: &str,
        data: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<String> {
        let route = self.named_route(name)?;
        let alternatives = pattern::parse(&route.pattern())?;

        let mut missing = String::new();
        let mut url = None;
        for alternative in alternatives.iter().rev() {
            match fill(alternative, data) {
                Ok(path) => {
                    url = Some(path);
                    break;
                }
                Err(placeholder) => missing = placeholder.to_string(),
            }
        }
        let mut url = url.ok_or(Error::MissingSegmentData(missing))?;

        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }

    /// [`Router::relative_path_for`] prefixed with the base path.
    pub fn path_for(&self, name: &str, data: &[(&str, &str)], query: &[(&str, &str)]) -> Result<String> {
        let path = self.relative_path_for(name, data, query)?;
        Ok(format!("{}{}", self.base_path, path))
    }
}

/// Substitute placeholders, or name the first one without data.
fn fill<'a>(alternative: &'a [Segment], data: &[(&str, &str)]) -> std::result::Result<String, &'a str> {
    if let Some(missing) =
        pattern::placeholder_names(alternative).find(|name| value_for(data, name).is_none())
    {
        return Err(missing);
    }

    let mut path = String::new();
    for segment in alternative {
        match segment {
            Segment::Static(text) => path.push_str(text),
            Segment::Placeholder { name, .. } => {
                path.push_str(value_for(data, name).unwrap_or_default());
            }
        }
    }
    Ok(path)
}

fn value_for<'d>(data: &[(&str, &'d str)], name: &str) -> Option<&'d str> {
    data.iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// Writable means this process can create a file in the cache directory.
fn dir_is_writable(path: &Path) -> bool {
    let dir = cache_dir(path);
    dir.is_dir() && tempfile::NamedTempFile::new_in(dir).is_ok()
}

use crate::PathParams;
use crate::handler::RequestHandler;
use crate::middleware::Link;
use crate::router::pattern::{RoutePattern, split_path};
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered route: its pattern, handler and the middleware captured at registration.
pub struct CompiledRoute {
    method: Method,
    pattern: RoutePattern,
    before: Vec<Link>,
    handler: Arc<dyn RequestHandler>,
    after: Vec<Link>,
    index: usize,
}

impl CompiledRoute {
    pub(crate) fn new(
        method: Method,
        pattern: RoutePattern,
        before: Vec<Link>,
        handler: Arc<dyn RequestHandler>,
        after: Vec<Link>,
    ) -> Self {
        Self { method, pattern, before, handler, after, index: 0 }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Position of the route in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn before_len(&self) -> usize {
        self.before.len()
    }

    pub fn after_len(&self) -> usize {
        self.after.len()
    }

    pub(crate) fn before(&self) -> &[Link] {
        &self.before
    }

    pub(crate) fn after(&self) -> &[Link] {
        &self.after
    }

    pub(crate) fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("index", &self.index)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

/// Routes in registration order, indexed per method. Append-only.
#[derive(Default)]
pub(crate) struct Registry {
    routes: Vec<CompiledRoute>,
    by_method: HashMap<Method, Vec<usize>>,
}

impl Registry {
    pub(crate) fn push(&mut self, mut route: CompiledRoute) {
        let index = self.routes.len();
        route.index = index;
        self.by_method.entry(route.method.clone()).or_default().push(index);
        self.routes.push(route);
    }

    /// The first route registered for `method` whose pattern matches `path`.
    pub(crate) fn find(&self, method: &Method, path: &str) -> Option<(&CompiledRoute, PathParams)> {
        let candidates = self.by_method.get(method)?;
        let segments = split_path(path).collect::<Vec<_>>();

        candidates.iter().map(|&index| &self.routes[index]).find_map(|route| {
            route.pattern.match_segments(&segments).map(|params| (route, params))
        })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}

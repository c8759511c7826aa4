//! Route registration and lookup.
//!
//! Routes are registered on a [`RouterBuilder`], either at the root or inside nested groups.
//! A group contributes a path prefix and middleware to every route registered inside it,
//! captured at registration time:
//!
//! ```
//! use micro_router::router::{get, post};
//! use micro_router::middleware::middleware_fn;
//! use micro_router::{handler_fn, Router, Signal};
//!
//! let log = middleware_fn(|ctx, next| Box::pin(async move { next.run(ctx).await }));
//!
//! let router = Router::builder()
//!     .route("/", get(handler_fn(|_ctx, _params| Box::pin(async { Ok::<_, Signal>("index") }))))
//!     .group("/api", |api| {
//!         api.before(log);
//!         api.route("/users/:id", get(handler_fn(|_ctx, params| {
//!             let id = params.get("id").unwrap_or_default().to_owned();
//!             Box::pin(async move { Ok::<_, Signal>(id) })
//!         })));
//!         api.route("/users", post(handler_fn(|_ctx, _params| Box::pin(async { Ok::<_, Signal>("created") }))));
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(router.at(&http::Method::GET, "/api/users/42").is_some());
//! ```
//!
//! Lookup walks the routes of the request method in registration order and picks the first
//! whose pattern matches; there is no ranking by specificity.

mod group;
mod registry;

pub mod pattern;

use crate::body::ResponseBody;
use crate::error::{BoxError, RouterBuildError};
use crate::handler::RequestHandler;
use crate::middleware::{Link, Middleware, Phase};
use crate::{Context, PathParams};
use group::{GroupArena, GroupId};
use http::{Method, Response};
use pattern::RoutePattern;
use registry::Registry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

pub use registry::CompiledRoute;

/// Builds the response for a request whose handler or middleware faulted.
pub type ErrorHandler = dyn Fn(&BoxError, &Context) -> Response<ResponseBody> + Send + Sync;

/// Routing options fixed when the router is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Treat `/foo/` and `/foo` as different paths.
    pub strict_routing: bool,
}

/// Immutable route table plus the collaborators used when dispatching.
pub struct Router {
    config: RouterConfig,
    registry: Registry,
    default_handler: Option<Box<dyn RequestHandler>>,
    error_handler: Option<Box<ErrorHandler>>,
}

/// Result of matching a request, the route and the parameters it bound.
#[derive(Debug)]
pub struct RouteMatch<'router> {
    route: &'router CompiledRoute,
    params: PathParams,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new(RouterConfig::default())
    }

    /// A builder whose configuration is fixed before any route gets registered.
    pub fn with_config(config: RouterConfig) -> RouterBuilder {
        RouterBuilder::new(config)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Matches a method and path against the registered routes.
    ///
    /// The path is normalized the same way [`dispatch`](Self::dispatch) does it.
    pub fn at(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let path = normalize_path(path, self.config.strict_routing);
        self.registry.find(method, path).map(|(route, params)| RouteMatch { route, params })
    }

    /// Every route, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.registry.iter()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    pub(crate) fn find(&self, method: &Method, path: &str) -> Option<(&CompiledRoute, PathParams)> {
        self.registry.find(method, path)
    }

    pub(crate) fn default_handler(&self) -> Option<&dyn RequestHandler> {
        self.default_handler.as_deref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_deref()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.registry)
            .field("has_default_handler", &self.default_handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl<'router> RouteMatch<'router> {
    pub fn route(&self) -> &'router CompiledRoute {
        self.route
    }

    /// Gets the path parameters from the matched route
    pub fn params(&self) -> &PathParams {
        &self.params
    }
}

/// Folds a trailing slash away unless routing is strict; `/` is left as is.
pub(crate) fn normalize_path(path: &str, strict_routing: bool) -> &str {
    if strict_routing || path.len() <= 1 {
        return path;
    }

    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

pub struct RouterBuilder {
    config: RouterConfig,
    groups: GroupArena,
    registry: Registry,
    default_handler: Option<Box<dyn RequestHandler>>,
    error_handler: Option<Box<ErrorHandler>>,
    error: Option<RouterBuildError>,
    attempted: usize,
}

impl RouterBuilder {
    fn new(config: RouterConfig) -> Self {
        Self {
            config,
            groups: GroupArena::new(),
            registry: Registry::default(),
            default_handler: None,
            error_handler: None,
            error: None,
            attempted: 0,
        }
    }

    /// Replaces the whole configuration.
    ///
    /// Route paths are compiled under the configuration in place when they are registered, so
    /// changing it once a route exists fails the build.
    pub fn config(mut self, config: RouterConfig) -> Self {
        let routes = self.attempted;
        if routes > 0 && config != self.config {
            error!(routes, "router configuration changed after routes were registered");
            if self.error.is_none() {
                self.error = Some(RouterBuildError::config_after_routes(routes));
            }
        }
        self.config = config;
        self
    }

    /// See [`config`](Self::config), this must be set before the first route.
    pub fn strict_routing(self, strict_routing: bool) -> Self {
        self.config(RouterConfig { strict_routing })
    }

    /// The handler run, without any route middleware, when no route matches.
    pub fn default_handler(mut self, request_handler: impl RequestHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(request_handler));
        self
    }

    /// The global fault handler; faults answer a plain `500 Internal Server Error` without one.
    pub fn error_handler<F>(mut self, error_handler: F) -> Self
    where
        F: Fn(&BoxError, &Context) -> Response<ResponseBody> + Send + Sync + 'static,
    {
        self.error_handler = Some(Box::new(error_handler));
        self
    }

    pub fn route(mut self, path: &str, route_builder: RouteBuilder) -> Self {
        self.register(GroupId::ROOT, path, route_builder);
        self
    }

    /// Adds application-wide middleware to the routes registered after this call.
    pub fn middleware<M: Middleware + 'static>(mut self, phase: Phase, middleware: M) -> Self {
        self.groups.add_middleware(GroupId::ROOT, phase, Arc::new(middleware));
        self
    }

    pub fn before<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.middleware(Phase::Before, middleware)
    }

    pub fn after<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.middleware(Phase::After, middleware)
    }

    /// Registers routes under `prefix`, see [`Group`].
    pub fn group<F>(mut self, prefix: &str, f: F) -> Self
    where
        F: FnOnce(&mut Group<'_>),
    {
        let id = self.groups.add_child(GroupId::ROOT, prefix);
        f(&mut Group { builder: &mut self, id });
        self
    }

    /// Builds the router, reporting the first route that failed to compile.
    pub fn build(self) -> Result<Router, RouterBuildError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        debug!(routes = self.registry.len(), strict_routing = self.config.strict_routing, "router built");
        Ok(Router {
            config: self.config,
            registry: self.registry,
            default_handler: self.default_handler,
            error_handler: self.error_handler,
        })
    }

    fn register(&mut self, group: GroupId, path: &str, route_builder: RouteBuilder) {
        self.attempted += 1;
        let RouteBuilder { method, handler, middleware } = route_builder;
        let mut full_path = self.groups.full_path(group, path);
        if !self.config.strict_routing {
            full_path = normalize_path(&full_path, false).to_owned();
        }

        let pattern = match RoutePattern::parse(&full_path) {
            Ok(pattern) => pattern,
            Err(e) => {
                error!(%method, path = %full_path, cause = %e, "invalid route");
                if self.error.is_none() {
                    self.error = Some(RouterBuildError::invalid_route(method, full_path, e));
                }
                return;
            }
        };

        let depth = self.groups.depth(group);
        let mut before = self.groups.effective_before(group);
        before.extend(middleware.into_iter().map(|middleware| Link::new(depth, middleware)));
        let after = self.groups.effective_after(group);

        debug!(%method, pattern = %full_path, before = before.len(), after = after.len(), "route registered");
        self.registry.push(CompiledRoute::new(method, pattern, before, handler, after));
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("config", &self.config)
            .field("routes", &self.registry)
            .finish_non_exhaustive()
    }
}

/// A prefix and middleware shared by the routes registered through it.
///
/// Nested groups inherit the prefix and middleware of their ancestors, root first. Middleware
/// only reaches the routes registered after it was added.
pub struct Group<'a> {
    builder: &'a mut RouterBuilder,
    id: GroupId,
}

impl Group<'_> {
    pub fn route(&mut self, path: &str, route_builder: RouteBuilder) -> &mut Self {
        self.builder.register(self.id, path, route_builder);
        self
    }

    pub fn middleware<M: Middleware + 'static>(&mut self, phase: Phase, middleware: M) -> &mut Self {
        self.builder.groups.add_middleware(self.id, phase, Arc::new(middleware));
        self
    }

    pub fn before<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware(Phase::Before, middleware)
    }

    pub fn after<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware(Phase::After, middleware)
    }

    pub fn group<F>(&mut self, prefix: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut Group<'_>),
    {
        let id = self.builder.groups.add_child(self.id, prefix);
        f(&mut Group { builder: &mut *self.builder, id });
        self
    }
}

impl fmt::Debug for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A handler waiting for its path, plus route-level middleware.
pub struct RouteBuilder {
    method: Method,
    handler: Arc<dyn RequestHandler>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl RouteBuilder {
    pub fn new<H: RequestHandler + 'static>(method: Method, handler: H) -> Self {
        Self { method, handler: Arc::new(handler), middleware: vec![] }
    }

    /// Adds before-middleware for this route only, run after the group middleware.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("method", &self.method)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($method:ident, $upper_case_method:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouteBuilder {
            RouteBuilder::new(Method::$upper_case_method, handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

#[cfg(test)]
mod tests {
    use super::{delete, get, normalize_path, post, Router, RouterBuilder, RouterConfig};
    use crate::error::{PatternError, RouterBuildError};
    use crate::handler::{handler_fn, RequestHandler};
    use crate::middleware::middleware_fn;
    use crate::Signal;
    use http::Method;

    fn ok(body: &'static str) -> impl RequestHandler + use<> {
        handler_fn(move |_ctx, _params| Box::pin(async move { Ok::<_, Signal>(body) }))
    }

    fn pass() -> impl crate::middleware::Middleware + use<> {
        middleware_fn(|ctx, next| Box::pin(async move { next.run(ctx).await }))
    }

    fn pattern_of(router: &Router, method: Method, path: &str) -> Option<String> {
        router.at(&method, path).map(|matched| matched.route().pattern().as_str().to_owned())
    }

    fn router() -> Router {
        Router::builder()
            .route("/", get(ok("index")))
            .route("/about", get(ok("about")))
            .route("/about", post(ok("post about")))
            .route("/user/:name/books/:title", get(ok("book")))
            .route("/admin/*all", get(ok("admin")))
            .build()
            .unwrap()
    }

    #[test]
    fn test_static_routes() {
        let router = router();

        assert_eq!(pattern_of(&router, Method::GET, "/"), Some("/".into()));
        assert_eq!(pattern_of(&router, Method::GET, "/about"), Some("/about".into()));
        assert_eq!(router.at(&Method::POST, "/about").unwrap().route().method(), Method::POST);
        assert!(router.at(&Method::DELETE, "/about").is_none());
        assert!(router.at(&Method::GET, "/missing").is_none());
    }

    #[test]
    fn test_disjoint_static_order_does_not_matter() {
        let forward = Router::builder().route("/a", get(ok("a"))).route("/b", get(ok("b"))).build().unwrap();
        let backward = Router::builder().route("/b", get(ok("b"))).route("/a", get(ok("a"))).build().unwrap();

        for router in [forward, backward] {
            assert_eq!(pattern_of(&router, Method::GET, "/a"), Some("/a".into()));
            assert_eq!(pattern_of(&router, Method::GET, "/b"), Some("/b".into()));
        }
    }

    #[test]
    fn test_params_extracted() {
        let router = router();

        let matched = router.at(&Method::GET, "/user/a/books/b").unwrap();
        assert_eq!(matched.params().get("name"), Some("a"));
        assert_eq!(matched.params().get("title"), Some("b"));
        assert!(router.at(&Method::GET, "/user/a").is_none());

        let matched = router.at(&Method::GET, "/admin/x/y/z").unwrap();
        assert_eq!(matched.params().get("all"), Some("x/y/z"));
    }

    #[test]
    fn test_registration_order_wins() {
        let router = Router::builder().route("/a/*rest", get(ok("wild"))).route("/a/b", get(ok("b"))).build().unwrap();

        let matched = router.at(&Method::GET, "/a/b").unwrap();
        assert_eq!(matched.route().pattern().as_str(), "/a/*rest");
        assert_eq!(matched.route().index(), 0);
        assert_eq!(matched.params().get("rest"), Some("b"));
    }

    #[test]
    fn test_matching_is_idempotent() {
        let router = router();

        let first = router.at(&Method::GET, "/user/a/books/b").unwrap();
        let second = router.at(&Method::GET, "/user/a/books/b").unwrap();
        assert_eq!(first.route().index(), second.route().index());
        assert_eq!(first.params(), second.params());
    }

    #[test]
    fn test_trailing_slash_folded() {
        let router = router();
        assert_eq!(pattern_of(&router, Method::GET, "/about/"), Some("/about".into()));

        let strict = Router::builder()
            .strict_routing(true)
            .route("/foo", get(ok("foo")))
            .route("/foo/", get(ok("foo slash")))
            .build()
            .unwrap();
        assert_eq!(pattern_of(&strict, Method::GET, "/foo"), Some("/foo".into()));
        assert_eq!(pattern_of(&strict, Method::GET, "/foo/"), Some("/foo/".into()));
    }

    #[test]
    fn test_registered_trailing_slash_folded_unless_strict() {
        let router = Router::builder().route("/docs/", get(ok("docs"))).build().unwrap();
        assert_eq!(pattern_of(&router, Method::GET, "/docs"), Some("/docs".into()));
        assert_eq!(pattern_of(&router, Method::GET, "/docs/"), Some("/docs".into()));

        let strict = Router::builder().strict_routing(true).route("/docs/", get(ok("docs"))).build().unwrap();
        assert_eq!(pattern_of(&strict, Method::GET, "/docs/"), Some("/docs/".into()));
        assert!(strict.at(&Method::GET, "/docs").is_none());
    }

    #[test]
    fn test_config_changed_after_routes_fails_build() {
        let result = Router::builder().route("/docs/", get(ok("docs"))).strict_routing(true).build();
        let Err(RouterBuildError::ConfigAfterRoutes { routes }) = result else {
            panic!("expected a configuration error");
        };
        assert_eq!(routes, 1);

        let result = Router::builder()
            .group("/api", |api| {
                api.route("/docs/", get(ok("docs")));
            })
            .config(RouterConfig { strict_routing: true })
            .build();
        assert!(matches!(result, Err(RouterBuildError::ConfigAfterRoutes { routes: 1 })));

        // restating the same configuration is harmless
        let router = Router::builder().route("/docs/", get(ok("docs"))).strict_routing(false).build().unwrap();
        assert_eq!(pattern_of(&router, Method::GET, "/docs/"), Some("/docs".into()));
    }

    #[test]
    fn test_with_config_applies_before_first_route() {
        let strict = Router::with_config(RouterConfig { strict_routing: true })
            .route("/docs/", get(ok("docs")))
            .build()
            .unwrap();
        assert!(strict.config().strict_routing);
        assert_eq!(pattern_of(&strict, Method::GET, "/docs/"), Some("/docs/".into()));
        assert!(strict.at(&Method::GET, "/docs").is_none());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/", false), "/");
        assert_eq!(normalize_path("/foo/", false), "/foo");
        assert_eq!(normalize_path("/foo//", false), "/foo");
        assert_eq!(normalize_path("//", false), "/");
        assert_eq!(normalize_path("/foo/", true), "/foo/");
    }

    #[test]
    fn test_groups_prefix_and_capture_middleware() {
        let router = Router::builder()
            .before(pass())
            .group("/api", |api| {
                api.before(pass());
                api.route("/early", get(ok("early")));
                api.after(pass());
                api.group("/v1", |v1| {
                    v1.before(pass());
                    v1.route("/users/:id", get(ok("user")).with(pass()));
                });
                api.route("/late", delete(ok("late")));
            })
            .route("/outside", get(ok("outside")))
            .build()
            .unwrap();

        let early = router.at(&Method::GET, "/api/early").unwrap();
        assert_eq!(early.route().before_len(), 2);
        assert_eq!(early.route().after_len(), 0);

        let user = router.at(&Method::GET, "/api/v1/users/7").unwrap();
        assert_eq!(user.params().get("id"), Some("7"));
        assert_eq!(user.route().before_len(), 4);
        assert_eq!(user.route().after_len(), 1);

        let late = router.at(&Method::DELETE, "/api/late").unwrap();
        assert_eq!(late.route().after_len(), 1);

        let outside = router.at(&Method::GET, "/outside").unwrap();
        assert_eq!(outside.route().before_len(), 1);

        let patterns = router.routes().map(|route| route.pattern().as_str()).collect::<Vec<_>>();
        assert_eq!(patterns, vec!["/api/early", "/api/v1/users/:id", "/api/late", "/outside"]);
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        let result = Router::builder()
            .route("/ok", get(ok("ok")))
            .group("/files", |files| {
                files.route("/:name?/raw", get(ok("raw")));
            })
            .route("/dup/:id/:id", get(ok("dup")))
            .build();

        let Err(RouterBuildError::InvalidRoute { method, path, source }) = result else {
            panic!("expected the build to fail");
        };
        assert_eq!(method, Method::GET);
        assert_eq!(path, "/files/:name?/raw");
        assert_eq!(source, PatternError::optional_not_last("/files/:name?/raw", "name"));
    }

    #[test]
    fn test_builder_debug() {
        let builder: RouterBuilder = Router::builder().route("/", get(ok("index")));
        assert!(format!("{builder:?}").contains("RouterBuilder"));

        let router = builder.build().unwrap();
        assert_eq!(router.len(), 1);
        assert!(!router.is_empty());
        assert!(!router.config().strict_routing);
    }
}

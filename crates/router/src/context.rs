//! Per-request state threaded through the middleware chain.
//!
//! This module contains:
//! - `Context`: request facts, the response in progress, locals, matched parameters and
//!   the halt/after-middleware bookkeeping of one request
//! - `PathParams`: the parameters a route pattern bound for the request path
//! - `DispatchState`: where the dispatcher currently is for the request

use crate::body::{RequestBody, ResponseBody};
use crate::error::BoxError;
use crate::flow::Halted;
use crate::middleware::Middleware;
use http::header::AsHeaderName;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Response, StatusCode, Uri, Version};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The dispatcher's progress through a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Matching,
    RunningBefore,
    RunningHandler,
    RunningAfter,
    Resolved,
}

struct HaltPayload {
    status: StatusCode,
    body: ResponseBody,
}

/// The state of one request, created by the dispatcher and dropped once the response is out.
///
/// Request facts are read-only. Everything a handler or middleware may change (status,
/// response headers and body, error slot, locals) is reachable through `&mut Context`.
pub struct Context {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    path: String,
    body: Option<RequestBody>,
    started_at: Instant,

    params: PathParams,
    locals: Extensions,

    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Option<ResponseBody>,
    error: Option<BoxError>,

    halted: bool,
    halt: Option<HaltPayload>,
    after_queue: Vec<Arc<dyn Middleware>>,
    state: DispatchState,
    entered_depth: Option<usize>,
    handler_reached: bool,
    decided: Option<Response<ResponseBody>>,
}

impl Context {
    pub(crate) fn new(parts: Parts, path: String, body: RequestBody) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            path,
            body: Some(body),
            started_at: Instant::now(),
            params: PathParams::empty(),
            locals: Extensions::new(),
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: None,
            error: None,
            halted: false,
            halt: None,
            after_queue: Vec::new(),
            state: DispatchState::Matching,
            entered_depth: None,
            handler_reached: false,
            decided: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path used for matching, without a trailing slash unless routing is strict.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The `Host` header, or the authority of an absolute request URI.
    pub fn host(&self) -> Option<&str> {
        self.header(http::header::HOST).or_else(|| self.uri.host())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A request header as text, `None` when absent or not visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The first value of a query parameter, percent-decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        self.query_pairs().into_iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// All query parameters in request order, percent-decoded.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
            .unwrap_or_default()
    }

    /// Takes the request body stream, `None` once it has been taken.
    pub fn take_body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn locals(&self) -> &Extensions {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Extensions {
        &mut self.locals
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Headers for the outgoing response, whichever way it gets decided.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Sets the body used when the chain finishes without returning a response.
    pub fn set_body(&mut self, body: impl Into<ResponseBody>) {
        self.response_body = Some(body.into());
    }

    pub fn error(&self) -> Option<&BoxError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: impl Into<BoxError>) {
        self.error = Some(error.into());
    }

    pub fn take_error(&mut self) -> Option<BoxError> {
        self.error.take()
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Stops the request and answers with `status` and `body`.
    ///
    /// Links that have not started yet are skipped, including the handler. The response
    /// headers set so far are kept. Middleware queued with [`after`](Self::after) still runs.
    ///
    /// Return the token from the calling link:
    ///
    /// ```ignore
    /// return ctx.halt(StatusCode::UNAUTHORIZED, "missing token").into();
    /// ```
    pub fn halt(&mut self, status: StatusCode, body: impl Into<ResponseBody>) -> Halted {
        match self.state {
            DispatchState::RunningAfter | DispatchState::Resolved => {
                warn!(%status, path = %self.path, "halt after the response was decided is ignored");
            }
            _ if self.halted => {
                debug!(%status, path = %self.path, "request already halted, keeping the first halt");
            }
            _ => {
                debug!(%status, path = %self.path, "request halted");
                self.halted = true;
                self.halt = Some(HaltPayload { status, body: body.into() });
            }
        }
        Halted::new()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Queues `middleware` to run after the response is decided, for this request only.
    ///
    /// Queued middleware runs once the response is decided, halted or not, and never
    /// when a handler or middleware faulted.
    pub fn after<M: Middleware + 'static>(&mut self, middleware: M) {
        match self.state {
            DispatchState::RunningAfter | DispatchState::Resolved => {
                warn!(path = %self.path, "after-middleware queued once the after phase started is dropped");
            }
            _ => self.after_queue.push(Arc::new(middleware)),
        }
    }

    /// The decided response, visible to after-middleware.
    pub fn decided_response(&self) -> Option<&Response<ResponseBody>> {
        self.decided.as_ref()
    }

    pub(crate) fn enter(&mut self, state: DispatchState) {
        tracing::trace!(from = ?self.state, to = ?state, path = %self.path, "dispatch state");
        if state == DispatchState::RunningHandler {
            self.handler_reached = true;
        }
        self.state = state;
    }

    pub(crate) fn enter_depth(&mut self, depth: usize) {
        self.entered_depth = Some(self.entered_depth.map_or(depth, |entered| entered.max(depth)));
    }

    /// Whether after-middleware declared by a group at `depth` should observe this request.
    pub(crate) fn observed_by_group(&self, depth: usize) -> bool {
        self.handler_reached || (self.halted && self.entered_depth.is_some_and(|entered| entered >= depth))
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub(crate) fn take_halt(&mut self) -> Option<(StatusCode, ResponseBody)> {
        self.halt.take().map(|payload| (payload.status, payload.body))
    }

    pub(crate) fn take_response_body(&mut self) -> ResponseBody {
        self.response_body.take().unwrap_or_else(ResponseBody::empty)
    }

    pub(crate) fn take_response_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.response_headers)
    }

    pub(crate) fn take_after_queue(&mut self) -> Vec<Arc<dyn Middleware>> {
        std::mem::take(&mut self.after_queue)
    }

    pub(crate) fn set_decided(&mut self, response: Response<ResponseBody>) {
        self.decided = Some(response);
    }

    pub(crate) fn take_decided(&mut self) -> Option<Response<ResponseBody>> {
        self.decided.take()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("status", &self.status)
            .field("state", &self.state)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

/// The parameters a route pattern bound for a request path.
///
/// Keys are always names declared by the matched pattern; an optional parameter that
/// matched nothing is absent. Wildcard values keep their `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(Arc<str>, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.entries.iter().find(|(name, _)| name.as_ref() == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_ref(), value.as_str()))
    }
}

impl From<Vec<(Arc<str>, String)>> for PathParams {
    fn from(entries: Vec<(Arc<str>, String)>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::body::RequestBody;
    use crate::context::{Context, DispatchState};
    use http::{Method, Request, StatusCode};

    pub(crate) fn context_for(method: Method, uri: &str) -> Context {
        let (parts, ()) = Request::builder().method(method).uri(uri).body(()).unwrap().into_parts();
        let path = parts.uri.path().to_owned();
        Context::new(parts, path, RequestBody::empty())
    }

    #[test]
    fn test_request_accessors() {
        let (parts, ()) = Request::builder()
            .method(Method::POST)
            .uri("/search?q=rust%20lang&page=2&q=again")
            .header(http::header::HOST, "example.com")
            .header("x-request-id", "abc")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = Context::new(parts, "/search".into(), RequestBody::empty());

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.host(), Some("example.com"));
        assert_eq!(ctx.header("x-request-id"), Some("abc"));
        assert_eq!(ctx.header("x-missing"), None);
        assert_eq!(ctx.query("q"), Some("rust lang".to_owned()));
        assert_eq!(ctx.query("page"), Some("2".to_owned()));
        assert_eq!(ctx.query("missing"), None);
        assert_eq!(ctx.query_pairs().len(), 3);
    }

    #[test]
    fn test_host_falls_back_to_uri() {
        let ctx = context_for(Method::GET, "http://api.example.com/users");
        assert_eq!(ctx.host(), Some("api.example.com"));
    }

    #[test]
    fn test_locals_and_error_slot() {
        #[derive(Debug, Clone, PartialEq)]
        struct UserId(u64);

        let mut ctx = context_for(Method::GET, "/");
        ctx.locals_mut().insert(UserId(7));
        assert_eq!(ctx.locals().get::<UserId>(), Some(&UserId(7)));

        assert!(ctx.error().is_none());
        ctx.set_error("broken");
        assert_eq!(ctx.error().unwrap().to_string(), "broken");
        assert!(ctx.take_error().is_some());
        assert!(ctx.error().is_none());
    }

    #[test]
    fn test_body_is_taken_once() {
        let mut ctx = context_for(Method::POST, "/");
        assert!(ctx.take_body().is_some());
        assert!(ctx.take_body().is_none());
    }

    #[test]
    fn test_first_halt_wins() {
        let mut ctx = context_for(Method::GET, "/");
        ctx.enter(DispatchState::RunningBefore);

        let _ = ctx.halt(StatusCode::UNAUTHORIZED, "first");
        let _ = ctx.halt(StatusCode::FORBIDDEN, "second");

        assert!(ctx.is_halted());
        let (status, _) = ctx.take_halt().unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_halt_ignored_after_decision() {
        let mut ctx = context_for(Method::GET, "/");
        ctx.enter(DispatchState::RunningAfter);

        let _ = ctx.halt(StatusCode::UNAUTHORIZED, ());
        assert!(!ctx.is_halted());
        assert!(ctx.take_halt().is_none());
    }

    #[test]
    fn test_group_observation() {
        let mut ctx = context_for(Method::GET, "/");
        ctx.enter(DispatchState::RunningBefore);
        ctx.enter_depth(0);
        ctx.enter_depth(1);
        assert!(!ctx.observed_by_group(0));

        let _ = ctx.halt(StatusCode::OK, ());
        assert!(ctx.observed_by_group(0));
        assert!(ctx.observed_by_group(1));
        assert!(!ctx.observed_by_group(2));

        ctx.enter(DispatchState::RunningHandler);
        assert!(ctx.observed_by_group(2));
    }
}

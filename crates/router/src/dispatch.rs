//! Request dispatching: matching, the middleware chain and the after phase.
//!
//! A request moves through [`DispatchState`] in order. The before-chain and handler decide the
//! response, either by returning one, by leaving it on the [`Context`] or by halting. After
//! that the after-middleware observes the decided response; it can no longer change it.
//!
//! A fault skips the after phase entirely and is answered by the error handler.

use crate::body::{RequestBody, ResponseBody};
use crate::context::{Context, DispatchState, PathParams};
use crate::error::BoxError;
use crate::flow::Flow;
use crate::middleware::{Link, Middleware, Next};
use crate::responder::plain_text;
use crate::router::{normalize_path, CompiledRoute, Router};
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;
use tracing::{debug, error, warn};

impl Router {
    /// Routes `request` and runs the matched route's chain, always producing a response.
    ///
    /// Faults never escape: they become a `500 Internal Server Error`, or whatever the
    /// configured error handler answers.
    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let path = normalize_path(parts.uri.path(), self.config().strict_routing).to_owned();
        let mut ctx = Context::new(parts, path, RequestBody::new(body));

        let response = match self.find(ctx.method(), ctx.path()) {
            Some((route, params)) => self.run_route(&mut ctx, route, params).await,
            None => self.run_unmatched(&mut ctx).await,
        };

        ctx.enter(DispatchState::Resolved);
        debug!(
            method = %ctx.method(),
            path = ctx.path(),
            status = response.status().as_u16(),
            elapsed = ?ctx.elapsed(),
            "request resolved"
        );
        response
    }

    async fn run_route(&self, ctx: &mut Context, route: &CompiledRoute, params: PathParams) -> Response<ResponseBody> {
        debug!(method = %ctx.method(), path = ctx.path(), route = route.pattern().as_str(), "route matched");
        ctx.set_params(params);
        ctx.enter(DispatchState::RunningBefore);

        let flow = Next::new(route.before(), route.handler()).run(ctx).await;
        match decide(ctx, flow) {
            Ok(response) => run_after(ctx, route.after(), response).await,
            Err(e) => self.fault(ctx, e),
        }
    }

    /// No route matched: the default handler answers, starting from `404 Not Found`.
    async fn run_unmatched(&self, ctx: &mut Context) -> Response<ResponseBody> {
        debug!(method = %ctx.method(), path = ctx.path(), "no route matched");
        ctx.set_status(StatusCode::NOT_FOUND);

        let Some(default_handler) = self.default_handler() else {
            return status_only(StatusCode::NOT_FOUND);
        };

        ctx.enter(DispatchState::RunningHandler);
        let flow = default_handler.invoke(ctx, &PathParams::empty()).await;
        match decide(ctx, flow) {
            Ok(response) => run_after(ctx, &[], response).await,
            Err(e) => self.fault(ctx, e),
        }
    }

    fn fault(&self, ctx: &mut Context, e: BoxError) -> Response<ResponseBody> {
        error!(method = %ctx.method(), path = ctx.path(), cause = %e, "request failed");
        ctx.set_error(e);

        match (self.error_handler(), ctx.error()) {
            (Some(error_handler), Some(e)) => error_handler(e, ctx),
            _ => internal_server_error(),
        }
    }
}

/// Builds the decided response, or hands back the fault.
///
/// A halt outranks whatever the chain returned: the halt payload is answered together with
/// the response headers set so far.
fn decide(ctx: &mut Context, flow: Flow) -> Result<Response<ResponseBody>, BoxError> {
    if let Some((status, body)) = ctx.take_halt() {
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = ctx.take_response_headers();
        return Ok(response);
    }

    match flow {
        Flow::Continue | Flow::Halted(_) => {
            let mut response = Response::new(ctx.take_response_body());
            *response.status_mut() = ctx.status();
            *response.headers_mut() = ctx.take_response_headers();
            Ok(response)
        }
        Flow::Respond(mut response) => {
            let headers = ctx.take_response_headers();
            for name in headers.keys() {
                if response.headers().contains_key(name) {
                    continue;
                }
                for value in headers.get_all(name) {
                    response.headers_mut().append(name.clone(), value.clone());
                }
            }
            Ok(response)
        }
        Flow::Fault(e) => Err(e),
    }
}

/// Runs the route's group after-middleware, then the middleware queued on the context.
///
/// Group after-middleware only runs for groups the request got into: always once the
/// handler was reached, and for groups at or above the halting link otherwise.
async fn run_after(ctx: &mut Context, links: &[Link], response: Response<ResponseBody>) -> Response<ResponseBody> {
    ctx.enter(DispatchState::RunningAfter);
    ctx.set_decided(response);

    for link in links {
        if !ctx.observed_by_group(link.depth()) {
            continue;
        }
        let flow = link.middleware().handle(ctx, Next::empty()).await;
        discard(ctx, flow);
    }

    for middleware in ctx.take_after_queue() {
        let flow = middleware.handle(ctx, Next::empty()).await;
        discard(ctx, flow);
    }

    ctx.take_decided().unwrap_or_else(internal_server_error)
}

fn discard(ctx: &Context, flow: Flow) {
    if let Flow::Fault(e) = flow {
        warn!(method = %ctx.method(), path = ctx.path(), cause = %e, "after-middleware failed, response kept");
    }
}

fn status_only(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    response
}

fn internal_server_error() -> Response<ResponseBody> {
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::from("Internal Server Error"))
}

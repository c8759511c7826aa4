//! Middleware and the chain that runs them.
//!
//! A middleware receives the [`Context`] and a [`Next`] standing for the rest of the chain. It
//! may pass through (`next.run(ctx).await`), post-process what `next` returned, or short-circuit
//! by returning without calling `next`, either with a value or by halting:
//!
//! ```
//! use http::StatusCode;
//! use micro_router::middleware::middleware_fn;
//!
//! let auth = middleware_fn(|ctx, next| {
//!     Box::pin(async move {
//!         if ctx.header(http::header::AUTHORIZATION).is_none() {
//!             return ctx.halt(StatusCode::UNAUTHORIZED, "missing credentials").into();
//!         }
//!         next.run(ctx).await
//!     })
//! });
//! # let _ = auth;
//! ```

use crate::Context;
use crate::context::DispatchState;
use crate::flow::{Flow, Halted};
use crate::handler::RequestHandler;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Where a middleware is spliced into the routes registered after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs ahead of the handler and may short-circuit it.
    Before,
    /// Runs once the response is decided, for side effects only.
    After,
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Flow;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Flow {
        self.as_ref().handle(ctx, next).await
    }
}

/// A middleware captured by a route, tagged with the depth of the group that declared it.
#[derive(Clone)]
pub(crate) struct Link {
    depth: usize,
    middleware: Arc<dyn Middleware>,
}

impl Link {
    pub(crate) fn new(depth: usize, middleware: Arc<dyn Middleware>) -> Self {
        Self { depth, middleware }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn middleware(&self) -> &dyn Middleware {
        self.middleware.as_ref()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("depth", &self.depth).finish_non_exhaustive()
    }
}

/// The remainder of a chain: the links not yet started, then the handler.
pub struct Next<'a> {
    links: &'a [Link],
    handler: Option<&'a dyn RequestHandler>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(links: &'a [Link], handler: &'a dyn RequestHandler) -> Self {
        Self { links, handler: Some(handler) }
    }

    /// A chain with nothing left in it, handed to after-middleware.
    pub(crate) fn empty() -> Self {
        Self { links: &[], handler: None }
    }

    /// Runs the next link, or the handler once every link has been entered.
    ///
    /// Nothing runs once the request is halted, whichever link called `next`.
    pub async fn run(self, ctx: &mut Context) -> Flow {
        if ctx.is_halted() {
            return Flow::Halted(Halted::new());
        }

        if let Some((link, rest)) = self.links.split_first() {
            ctx.enter_depth(link.depth());
            return link.middleware().handle(ctx, Next { links: rest, handler: self.handler }).await;
        }

        match self.handler {
            Some(handler) => {
                ctx.enter(DispatchState::RunningHandler);
                let params = ctx.params().clone();
                handler.invoke(ctx, &params).await
            }
            None => Flow::Continue,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_links", &self.links.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// A middleware backed by a closure.
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a middleware from a closure returning a boxed future.
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Flow> + Send + Sync,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Flow> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Flow {
        (self.f)(ctx, next).await
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

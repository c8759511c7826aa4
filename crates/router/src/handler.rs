use crate::flow::{Flow, IntoFlow, Signal};
use crate::{Context, PathParams};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::marker::PhantomData;

/// The terminal link of a route's chain.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut Context, params: &PathParams) -> Flow;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, ctx: &mut Context, params: &PathParams) -> Flow {
        self.as_ref().invoke(ctx, params).await
    }
}

/// a closure holder which represents any handler function
pub struct FnHandler<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

/// Creates a handler from a closure returning a boxed future.
///
/// The closure resolves to `Ok(value)` for anything implementing [`IntoFlow`], or to
/// `Err(signal)` when it halted or failed; `?` turns any error into a fault.
///
/// ```
/// use http::StatusCode;
/// use micro_router::{handler_fn, Signal};
///
/// let show_user = handler_fn(|ctx, params| {
///     Box::pin(async move {
///         let Some(name) = params.get("name") else {
///             return Err(ctx.halt(StatusCode::BAD_REQUEST, "missing name").into());
///         };
///         Ok::<_, Signal>(format!("hello {name}"))
///     })
/// });
/// # let _ = show_user;
/// ```
pub fn handler_fn<F, R>(f: F) -> FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Context, &'a PathParams) -> BoxFuture<'a, Result<R, Signal>> + Send + Sync,
    R: IntoFlow,
{
    FnHandler { f, _phantom: PhantomData }
}

#[async_trait]
impl<F, R> RequestHandler for FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Context, &'a PathParams) -> BoxFuture<'a, Result<R, Signal>> + Send + Sync,
    R: IntoFlow,
{
    async fn invoke(&self, ctx: &mut Context, params: &PathParams) -> Flow {
        match (self.f)(ctx, params).await {
            Ok(output) => output.into_flow(ctx),
            Err(signal) => signal.into(),
        }
    }
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

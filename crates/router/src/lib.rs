//! Route matching and middleware dispatch for the micro web framework.
//!
//! A [`Router`] is configured once through [`Router::builder`] and then dispatches any number of
//! requests concurrently:
//!
//! ```
//! use http::{Method, Request, StatusCode};
//! use micro_router::router::get;
//! use micro_router::{handler_fn, Router, Signal};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let router = Router::builder()
//!     .route("/hello/:name", get(handler_fn(|_ctx, params| {
//!         let greeting = format!("hello {}", params.get("name").unwrap_or("world"));
//!         Box::pin(async move { Ok::<_, Signal>(greeting) })
//!     })))
//!     .build()
//!     .unwrap();
//!
//! let request = Request::builder()
//!     .method(Method::GET)
//!     .uri("/hello/micro")
//!     .body(http_body_util::Empty::<bytes::Bytes>::new())
//!     .unwrap();
//! let response = router.dispatch(request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # });
//! ```
//!
//! The transport is left to the caller: the router takes an [`http::Request`] and answers an
//! [`http::Response`] whose body is a [`ResponseBody`].

mod body;
mod context;
mod dispatch;
mod error;
mod flow;
mod handler;
mod responder;

pub mod middleware;
pub mod router;

pub use body::RequestBody;
pub use body::ResponseBody;
pub use context::Context;
pub use context::DispatchState;
pub use context::PathParams;
pub use error::BoxError;
pub use error::PatternError;
pub use error::RouterBuildError;
pub use flow::Flow;
pub use flow::Halted;
pub use flow::IntoFlow;
pub use flow::Signal;
pub use handler::handler_fn;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use responder::Responder;
pub use router::Router;
pub use router::RouterBuilder;
pub use router::RouterConfig;
